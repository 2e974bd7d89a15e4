//! Song structure drafts and the lyrics tool contracts.

use serde::{Deserialize, Serialize};

use super::brief::CreativeBrief;
use super::evaluation::Evaluation;
use crate::schema::{Schema, SchemaViolation, ensure};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SectionKind {
    Intro,
    Verse,
    PreChorus,
    Chorus,
    Bridge,
    Outro,
}

impl SectionKind {
    pub fn label(&self) -> &'static str {
        match self {
            SectionKind::Intro => "Intro",
            SectionKind::Verse => "Verse",
            SectionKind::PreChorus => "Pre-Chorus",
            SectionKind::Chorus => "Chorus",
            SectionKind::Bridge => "Bridge",
            SectionKind::Outro => "Outro",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LyricSection {
    pub kind: SectionKind,
    pub lines: Vec<String>,
}

impl LyricSection {
    pub fn new(kind: SectionKind, lines: Vec<String>) -> Self {
        Self { kind, lines }
    }
}

/// A titled, ordered collection of lyric sections.
///
/// Improvements replace the whole structure and bump `revision`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongStructure {
    pub title: String,
    pub sections: Vec<LyricSection>,
    #[serde(default)]
    pub revision: u32,
    /// Suggestions and feedback folded into this revision.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub revision_notes: Vec<String>,
}

impl SongStructure {
    pub fn new(title: impl Into<String>, sections: Vec<LyricSection>) -> Self {
        Self {
            title: title.into(),
            sections,
            revision: 0,
            revision_notes: Vec::new(),
        }
    }

    pub fn line_count(&self) -> usize {
        self.sections.iter().map(|s| s.lines.len()).sum()
    }

    pub fn sections_of(&self, kind: SectionKind) -> impl Iterator<Item = &LyricSection> {
        self.sections.iter().filter(move |s| s.kind == kind)
    }
}

impl Schema for SongStructure {
    fn check(&self) -> Result<(), SchemaViolation> {
        ensure(!self.title.trim().is_empty(), || {
            "song title must not be empty".to_string()
        })?;
        ensure(!self.sections.is_empty(), || {
            "song must have at least one section".to_string()
        })?;
        for (idx, section) in self.sections.iter().enumerate() {
            ensure(
                section.lines.iter().any(|l| !l.trim().is_empty()),
                || format!("section {} ({}) has no lyrics", idx, section.kind.label()),
            )?;
        }
        Ok(())
    }
}

/// Input of `generate-song-structure`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateLyricsInput {
    pub brief: CreativeBrief,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_feedback: Option<String>,
}

impl Schema for GenerateLyricsInput {
    fn check(&self) -> Result<(), SchemaViolation> {
        self.brief.check()
    }
}

/// Input of `evaluate-lyrics`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateLyricsInput {
    pub song_structure: SongStructure,
}

impl Schema for EvaluateLyricsInput {
    fn check(&self) -> Result<(), SchemaViolation> {
        self.song_structure.check()
    }
}

/// Input of `improve-lyrics`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImproveLyricsInput {
    pub song_structure: SongStructure,
    pub evaluation: Evaluation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_feedback: Option<String>,
}

impl Schema for ImproveLyricsInput {
    fn check(&self) -> Result<(), SchemaViolation> {
        self.song_structure.check()?;
        self.evaluation.check()
    }
}
