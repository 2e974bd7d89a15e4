//! Melody drafts and the melody tool contracts.

use serde::{Deserialize, Serialize};

use super::evaluation::Evaluation;
use super::lyrics::{SectionKind, SongStructure};
use crate::schema::{Schema, SchemaViolation, ensure};

pub const MIN_TEMPO_BPM: u32 = 40;
pub const MAX_TEMPO_BPM: u32 = 240;

/// A single note; `start` and `duration` are measured in beats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub pitch: String,
    pub start: f64,
    pub duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syllable: Option<String>,
}

/// Notes setting one lyric section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MelodyTrack {
    pub section: SectionKind,
    pub notes: Vec<Note>,
}

/// A parameterized collection of note tracks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MelodyStructure {
    pub title: String,
    pub tempo: u32,
    pub key: String,
    pub time_signature: String,
    pub tracks: Vec<MelodyTrack>,
    #[serde(default)]
    pub revision: u32,
    /// Suggestions and feedback folded into this revision.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub revision_notes: Vec<String>,
}

impl MelodyStructure {
    pub fn note_count(&self) -> usize {
        self.tracks.iter().map(|t| t.notes.len()).sum()
    }
}

/// Parse a time signature such as `"3/4"` into (beats, unit).
pub fn parse_time_signature(value: &str) -> Option<(u32, u32)> {
    let (beats, unit) = value.split_once('/')?;
    let beats: u32 = beats.trim().parse().ok()?;
    let unit: u32 = unit.trim().parse().ok()?;
    (beats > 0 && unit.is_power_of_two()).then_some((beats, unit))
}

impl Schema for MelodyStructure {
    fn check(&self) -> Result<(), SchemaViolation> {
        ensure((MIN_TEMPO_BPM..=MAX_TEMPO_BPM).contains(&self.tempo), || {
            format!(
                "tempo {} is outside [{}, {}] bpm",
                self.tempo, MIN_TEMPO_BPM, MAX_TEMPO_BPM
            )
        })?;
        ensure(!self.key.trim().is_empty(), || "key must not be empty".to_string())?;
        ensure(parse_time_signature(&self.time_signature).is_some(), || {
            format!("invalid time signature '{}'", self.time_signature)
        })?;
        ensure(!self.tracks.is_empty(), || {
            "melody must have at least one track".to_string()
        })?;
        for (idx, track) in self.tracks.iter().enumerate() {
            ensure(!track.notes.is_empty(), || format!("track {idx} has no notes"))?;
            for note in &track.notes {
                ensure(note.duration > 0.0 && note.start >= 0.0, || {
                    format!(
                        "track {idx} has a note with start {} and duration {}",
                        note.start, note.duration
                    )
                })?;
            }
        }
        Ok(())
    }
}

/// Raw input of a melody run, stored under `initialInput`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MelodyRequest {
    pub song_structure: SongStructure,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tempo: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_signature: Option<String>,
}

impl MelodyRequest {
    pub fn new(song_structure: SongStructure) -> Self {
        Self {
            song_structure,
            emotion: None,
            mood: None,
            tempo: None,
            key: None,
            time_signature: None,
        }
    }

    pub fn with_emotion(mut self, emotion: impl Into<String>) -> Self {
        self.emotion = Some(emotion.into());
        self
    }

    pub fn with_mood(mut self, mood: impl Into<String>) -> Self {
        self.mood = Some(mood.into());
        self
    }

    pub fn with_tempo(mut self, bpm: u32) -> Self {
        self.tempo = Some(bpm);
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_time_signature(mut self, time_signature: impl Into<String>) -> Self {
        self.time_signature = Some(time_signature.into());
        self
    }
}

/// Input of `generate-melody`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateMelodyInput {
    pub song_structure: SongStructure,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tempo: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_feedback: Option<String>,
}

impl Schema for GenerateMelodyInput {
    fn check(&self) -> Result<(), SchemaViolation> {
        self.song_structure.check()?;
        ensure(self.emotion.is_some() || self.mood.is_some(), || {
            "melody generation needs an emotion or mood".to_string()
        })?;
        if let Some(tempo) = self.tempo {
            ensure((MIN_TEMPO_BPM..=MAX_TEMPO_BPM).contains(&tempo), || {
                format!("tempo {tempo} is outside [{MIN_TEMPO_BPM}, {MAX_TEMPO_BPM}] bpm")
            })?;
        }
        if let Some(ts) = &self.time_signature {
            ensure(parse_time_signature(ts).is_some(), || {
                format!("invalid time signature '{ts}'")
            })?;
        }
        Ok(())
    }
}

/// Input of `evaluate-melody`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateMelodyInput {
    pub melody_structure: MelodyStructure,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub song_structure: Option<SongStructure>,
}

impl Schema for EvaluateMelodyInput {
    fn check(&self) -> Result<(), SchemaViolation> {
        self.melody_structure.check()
    }
}

/// Input of `improve-melody`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImproveMelodyInput {
    pub melody_structure: MelodyStructure,
    pub evaluation: Evaluation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_feedback: Option<String>,
}

impl Schema for ImproveMelodyInput {
    fn check(&self) -> Result<(), SchemaViolation> {
        self.melody_structure.check()?;
        self.evaluation.check()
    }
}
