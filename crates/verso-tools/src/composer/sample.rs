//! Deterministic sample backend.
//!
//! Every operation is a pure function of its input. Evaluation scores depend
//! only on the draft's `revision`, so a workflow driven by this backend walks
//! a fixed improvement path.

use async_trait::async_trait;
use verso_core::WorkError;
use verso_core::model::{
    CreativeBrief, EvaluateLyricsInput, EvaluateMelodyInput, Evaluation, GenerateLyricsInput,
    GenerateMelodyInput, ImproveLyricsInput, ImproveMelodyInput, LyricSection, MelodyStructure,
    MelodyTrack, Note, SectionKind, SongStructure, TempoClass, mood_for, tempo_for,
};
use verso_core::model::melody::{MAX_TEMPO_BPM, MIN_TEMPO_BPM};

use super::{Backend, Composer};

const LYRICS_DRAFT_SCORE: f64 = 6.0;
const LYRICS_REVISED_SCORE: f64 = 7.5;
const MELODY_SCORES: [f64; 3] = [7.0, 8.0, 8.8];
const MELODY_ACCEPTABLE: f64 = 8.5;

const SONG_FORM: [SectionKind; 6] = [
    SectionKind::Verse,
    SectionKind::Chorus,
    SectionKind::Verse,
    SectionKind::Chorus,
    SectionKind::Bridge,
    SectionKind::Chorus,
];

const CHROMATIC: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];
const MAJOR_STEPS: [usize; 7] = [0, 2, 4, 5, 7, 9, 11];
const MINOR_STEPS: [usize; 7] = [0, 2, 3, 5, 7, 8, 10];
const MAX_NOTES_PER_LINE: usize = 8;

/// Offline composer producing schema-conformant sample drafts.
#[derive(Debug, Clone, Copy, Default)]
pub struct SampleComposer;

impl SampleComposer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Composer for SampleComposer {
    fn backend(&self) -> Backend {
        Backend::Sample
    }

    async fn generate_song(&self, input: GenerateLyricsInput) -> Result<SongStructure, WorkError> {
        let feedback = input.user_feedback.as_deref();
        let lengths = SectionLengths::for_tempo(input.brief.tempo).adjusted(feedback);
        let title = title_from(&input.brief.concept, &input.brief.mood);

        let mut verse_no = 0;
        let sections = SONG_FORM
            .iter()
            .map(|kind| {
                let lines = match kind {
                    SectionKind::Verse => {
                        verse_no += 1;
                        verse_lines(&input.brief, lengths.verse, verse_no)
                    }
                    SectionKind::Bridge => bridge_lines(&input.brief),
                    _ => chorus_lines(&input.brief, &title, lengths.chorus),
                };
                LyricSection::new(*kind, lines)
            })
            .collect();

        let mut song = SongStructure::new(title, sections);
        if let Some(text) = feedback {
            song.revision_notes.push(format!("feedback: {text}"));
        }
        Ok(song)
    }

    async fn evaluate_song(&self, input: EvaluateLyricsInput) -> Result<Evaluation, WorkError> {
        let evaluation = if input.song_structure.revision == 0 {
            Evaluation::new(LYRICS_DRAFT_SCORE, true)
                .with_strength("Clear emotional direction")
                .with_weakness("Chorus hook is generic")
                .with_weakness("Verses repeat the same images")
                .with_suggestion("Sharpen the chorus hook around the title")
                .with_suggestion("Vary the imagery between verses")
        } else {
            Evaluation::new(LYRICS_REVISED_SCORE, false)
                .with_strength("Memorable chorus hook")
                .with_strength("Consistent emotional arc")
                .with_weakness("Bridge could build more tension")
        };
        Ok(evaluation)
    }

    async fn improve_song(&self, input: ImproveLyricsInput) -> Result<SongStructure, WorkError> {
        let ImproveLyricsInput {
            mut song_structure,
            evaluation,
            user_feedback,
        } = input;
        let shorter = wants(user_feedback.as_deref(), "shorter");
        let hook = format!("Oh, {}, this time I mean it", song_structure.title.to_lowercase());

        for section in &mut song_structure.sections {
            if section.kind != SectionKind::Chorus {
                continue;
            }
            if let Some(first) = section.lines.first_mut() {
                *first = hook.clone();
            }
            if shorter {
                section.lines.truncate(2);
            }
        }

        song_structure.revision = song_structure.revision.saturating_add(1);
        song_structure.revision_notes.extend(evaluation.suggestions);
        if let Some(text) = user_feedback {
            song_structure.revision_notes.push(format!("feedback: {text}"));
        }
        Ok(song_structure)
    }

    async fn generate_melody(
        &self,
        input: GenerateMelodyInput,
    ) -> Result<MelodyStructure, WorkError> {
        let mood = input
            .mood
            .clone()
            .or_else(|| input.emotion.as_deref().map(|e| mood_for(e).to_string()))
            .unwrap_or_default();
        let tempo = input.tempo.unwrap_or_else(|| match input.emotion.as_deref() {
            Some(emotion) => tempo_for(None, emotion).bpm(),
            None => TempoClass::Moderate.bpm(),
        });
        let key = input.key.clone().unwrap_or_else(|| default_key(&mood).to_string());
        let time_signature = input
            .time_signature
            .clone()
            .unwrap_or_else(|| "4/4".to_string());

        let scale = scale_for(&key);
        let beat = if tempo > 115 { 0.5 } else { 1.0 };
        let tracks = input
            .song_structure
            .sections
            .iter()
            .map(|section| set_section(section, &scale, beat))
            .collect();

        let mut melody = MelodyStructure {
            title: input.song_structure.title.clone(),
            tempo,
            key,
            time_signature,
            tracks,
            revision: 0,
            revision_notes: Vec::new(),
        };
        if let Some(text) = input.user_feedback {
            melody.revision_notes.push(format!("feedback: {text}"));
        }
        Ok(melody)
    }

    async fn evaluate_melody(&self, input: EvaluateMelodyInput) -> Result<Evaluation, WorkError> {
        let melody = &input.melody_structure;
        let idx = (melody.revision as usize).min(MELODY_SCORES.len() - 1);
        let score = MELODY_SCORES[idx];

        let mut evaluation = Evaluation::new(score, score < MELODY_ACCEPTABLE)
            .with_strength("Melody follows the lyric phrasing");
        let uncovered = input
            .song_structure
            .as_ref()
            .is_some_and(|song| song.sections.len() != melody.tracks.len());
        if uncovered {
            evaluation = evaluation.with_weakness("Some lyric sections have no melody");
        }
        if score < MELODY_ACCEPTABLE {
            evaluation = evaluation
                .with_weakness("Phrase endings do not resolve")
                .with_suggestion("Hold the final note of each phrase longer");
        }
        Ok(evaluation)
    }

    async fn improve_melody(
        &self,
        input: ImproveMelodyInput,
    ) -> Result<MelodyStructure, WorkError> {
        let ImproveMelodyInput {
            mut melody_structure,
            evaluation,
            user_feedback,
        } = input;

        for track in &mut melody_structure.tracks {
            if let Some(last) = track.notes.last_mut() {
                last.duration += 1.0;
            }
        }
        let feedback = user_feedback.as_deref();
        if wants(feedback, "faster") {
            melody_structure.tempo = (melody_structure.tempo + 8).min(MAX_TEMPO_BPM);
        } else if wants(feedback, "slower") {
            melody_structure.tempo = melody_structure.tempo.saturating_sub(8).max(MIN_TEMPO_BPM);
        }

        melody_structure.revision = melody_structure.revision.saturating_add(1);
        melody_structure.revision_notes.extend(evaluation.suggestions);
        if let Some(text) = user_feedback {
            melody_structure.revision_notes.push(format!("feedback: {text}"));
        }
        Ok(melody_structure)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SectionLengths {
    verse: usize,
    chorus: usize,
}

impl SectionLengths {
    fn for_tempo(tempo: TempoClass) -> Self {
        let verse = match tempo {
            TempoClass::Slow => 3,
            TempoClass::Moderate => 4,
            TempoClass::Fast => 5,
        };
        Self { verse, chorus: 4 }
    }

    fn adjusted(self, feedback: Option<&str>) -> Self {
        if wants(feedback, "shorter") {
            Self {
                verse: self.verse.saturating_sub(1).max(2),
                chorus: 2,
            }
        } else if wants(feedback, "longer") {
            Self {
                verse: self.verse + 1,
                chorus: self.chorus + 2,
            }
        } else {
            self
        }
    }
}

fn wants(feedback: Option<&str>, word: &str) -> bool {
    feedback.is_some_and(|text| text.to_lowercase().contains(word))
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn title_from(concept: &str, mood: &str) -> String {
    let words: Vec<String> = concept.split_whitespace().take(4).map(capitalize).collect();
    if words.is_empty() {
        format!("{} Song", capitalize(mood))
    } else {
        words.join(" ")
    }
}

fn theme(brief: &CreativeBrief, idx: usize) -> &str {
    if brief.themes.is_empty() {
        return &brief.concept;
    }
    &brief.themes[idx % brief.themes.len()]
}

fn verse_lines(brief: &CreativeBrief, count: usize, verse_no: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            let theme = theme(brief, i + verse_no);
            match i % 4 {
                0 => format!("I keep finding {theme} in {}", brief.concept),
                1 => format!("Every {} hour pulls me back to {theme}", brief.mood),
                2 => format!("The streets still whisper about {theme}"),
                _ => format!("And I carry {theme} where the quiet goes"),
            }
        })
        .collect()
}

fn chorus_lines(brief: &CreativeBrief, title: &str, count: usize) -> Vec<String> {
    let hook = title.to_lowercase();
    (0..count)
        .map(|i| match i % 4 {
            0 => format!("Oh, {hook}"),
            1 => format!("We were {} and it was ours", brief.mood),
            2 => format!("Sing it for {}", theme(brief, 0)),
            _ => format!("Oh, {hook}, don't let go"),
        })
        .collect()
}

fn bridge_lines(brief: &CreativeBrief) -> Vec<String> {
    vec![
        format!("If {} is all that's left", theme(brief, brief.themes.len().saturating_sub(1))),
        format!("Then let the {} light come in", brief.mood),
    ]
}

fn default_key(mood: &str) -> &'static str {
    match mood {
        "melancholic" | "bittersweet" | "restless" | "intense" => "A minor",
        _ => "C major",
    }
}

fn pitch_class(tonic: &str) -> Option<usize> {
    let mut chars = tonic.chars();
    let base: i32 = match chars.next()?.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };
    let offset = match chars.next() {
        Some('#') => 1,
        Some('b') => -1,
        _ => 0,
    };
    usize::try_from((base + offset).rem_euclid(12)).ok()
}

/// Seven scale degrees of `key` starting at octave 4, e.g. `"A minor"`.
fn scale_for(key: &str) -> Vec<String> {
    let tonic = key
        .split_whitespace()
        .next()
        .and_then(pitch_class)
        .unwrap_or(0);
    let steps = if key.to_lowercase().contains("minor") {
        MINOR_STEPS
    } else {
        MAJOR_STEPS
    };
    steps
        .iter()
        .map(|step| {
            let absolute = tonic + step;
            format!("{}{}", CHROMATIC[absolute % 12], 4 + absolute / 12)
        })
        .collect()
}

fn set_section(section: &LyricSection, scale: &[String], beat: f64) -> MelodyTrack {
    let mut notes = Vec::new();
    let mut cursor = 0.0;

    for (line_idx, line) in section.lines.iter().enumerate() {
        let words: Vec<&str> = line
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '\''))
            .filter(|w| !w.is_empty())
            .take(MAX_NOTES_PER_LINE)
            .collect();

        for (word_idx, word) in words.iter().enumerate() {
            let degree = (line_idx * 2 + word_idx) % scale.len();
            let duration = if word_idx + 1 == words.len() {
                beat * 2.0
            } else {
                beat
            };
            notes.push(Note {
                pitch: scale[degree].clone(),
                start: cursor,
                duration,
                syllable: Some(word.to_lowercase()),
            });
            cursor += duration;
        }
    }

    if notes.is_empty() {
        notes.push(Note {
            pitch: scale[0].clone(),
            start: 0.0,
            duration: beat * 4.0,
            syllable: None,
        });
    }

    MelodyTrack {
        section: section.kind,
        notes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use verso_core::Schema;
    use verso_core::model::LyricsRequest;

    fn brief() -> CreativeBrief {
        CreativeBrief::derive(&LyricsRequest::new("a rainy bus stop", "sad"))
    }

    async fn draft() -> SongStructure {
        SampleComposer
            .generate_song(GenerateLyricsInput {
                brief: brief(),
                user_feedback: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_generated_song_is_deterministic_and_valid() {
        let first = draft().await;
        let second = draft().await;

        assert_eq!(first, second);
        assert!(first.check().is_ok());
        assert_eq!(first.title, "A Rainy Bus Stop");
        assert_eq!(first.sections.len(), SONG_FORM.len());
        assert_eq!(first.revision, 0);
    }

    #[tokio::test]
    async fn test_verse_length_follows_tempo() {
        let song = draft().await;
        let verse = song.sections_of(SectionKind::Verse).next().unwrap();
        assert_eq!(verse.lines.len(), 3);
    }

    #[tokio::test]
    async fn test_shorter_feedback_shrinks_chorus() {
        let song = SampleComposer
            .generate_song(GenerateLyricsInput {
                brief: brief(),
                user_feedback: Some("shorter chorus".to_string()),
            })
            .await
            .unwrap();

        assert!(song.sections_of(SectionKind::Chorus).all(|c| c.lines.len() == 2));
        assert_eq!(song.revision_notes, vec!["feedback: shorter chorus"]);
    }

    #[tokio::test]
    async fn test_lyrics_score_depends_on_revision() {
        let song = draft().await;
        let first = SampleComposer
            .evaluate_song(EvaluateLyricsInput {
                song_structure: song.clone(),
            })
            .await
            .unwrap();
        assert_eq!(first.score, 6.0);
        assert!(first.needs_improvement);

        let improved = SampleComposer
            .improve_song(ImproveLyricsInput {
                song_structure: song,
                evaluation: first.clone(),
                user_feedback: None,
            })
            .await
            .unwrap();
        assert_eq!(improved.revision, 1);
        assert_eq!(improved.revision_notes, first.suggestions);

        let second = SampleComposer
            .evaluate_song(EvaluateLyricsInput {
                song_structure: improved,
            })
            .await
            .unwrap();
        assert_eq!(second.score, 7.5);
        assert!(!second.needs_improvement);
    }

    #[tokio::test]
    async fn test_improvement_at_max_revision_saturates() {
        let mut song = draft().await;
        song.revision = u32::MAX;

        let improved = SampleComposer
            .improve_song(ImproveLyricsInput {
                song_structure: song,
                evaluation: Evaluation::new(6.0, true),
                user_feedback: None,
            })
            .await
            .unwrap();
        assert_eq!(improved.revision, u32::MAX);
    }

    #[rstest]
    #[case("C major", vec!["C4", "D4", "E4", "F4", "G4", "A4", "B4"])]
    #[case("A minor", vec!["A4", "B4", "C5", "D5", "E5", "F5", "G5"])]
    #[case("Eb major", vec!["D#4", "F4", "G4", "G#4", "A#4", "C5", "D5"])]
    #[case("unknown", vec!["C4", "D4", "E4", "F4", "G4", "A4", "B4"])]
    fn test_scale_for_key(#[case] key: &str, #[case] expected: Vec<&str>) {
        assert_eq!(scale_for(key), expected);
    }

    #[rstest]
    #[case(0, 7.0, true)]
    #[case(1, 8.0, true)]
    #[case(2, 8.8, false)]
    #[case(5, 8.8, false)]
    #[tokio::test]
    async fn test_melody_score_sequence(
        #[case] revision: u32,
        #[case] score: f64,
        #[case] needs_improvement: bool,
    ) {
        let song = draft().await;
        let mut melody = SampleComposer
            .generate_melody(GenerateMelodyInput {
                song_structure: song,
                emotion: Some("sad".to_string()),
                mood: None,
                tempo: None,
                key: None,
                time_signature: None,
                user_feedback: None,
            })
            .await
            .unwrap();
        melody.revision = revision;

        let evaluation = SampleComposer
            .evaluate_melody(EvaluateMelodyInput {
                melody_structure: melody,
                song_structure: None,
            })
            .await
            .unwrap();
        assert_eq!(evaluation.score, score);
        assert_eq!(evaluation.needs_improvement, needs_improvement);
    }

    #[tokio::test]
    async fn test_melody_defaults_from_emotion() {
        let song = draft().await;
        let melody = SampleComposer
            .generate_melody(GenerateMelodyInput {
                song_structure: song.clone(),
                emotion: Some("sad".to_string()),
                mood: None,
                tempo: None,
                key: None,
                time_signature: None,
                user_feedback: None,
            })
            .await
            .unwrap();

        assert!(melody.check().is_ok());
        assert_eq!(melody.key, "A minor");
        assert_eq!(melody.tempo, TempoClass::Slow.bpm());
        assert_eq!(melody.time_signature, "4/4");
        assert_eq!(melody.tracks.len(), song.sections.len());
    }

    #[tokio::test]
    async fn test_improve_melody_resolves_phrase_endings() {
        let song = draft().await;
        let melody = SampleComposer
            .generate_melody(GenerateMelodyInput {
                song_structure: song,
                emotion: None,
                mood: Some("uplifting".to_string()),
                tempo: Some(120),
                key: Some("G major".to_string()),
                time_signature: Some("3/4".to_string()),
                user_feedback: None,
            })
            .await
            .unwrap();
        let before = melody.tracks[0].notes.last().unwrap().duration;

        let improved = SampleComposer
            .improve_melody(ImproveMelodyInput {
                melody_structure: melody,
                evaluation: Evaluation::new(7.0, true),
                user_feedback: Some("a bit faster".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(improved.revision, 1);
        assert_eq!(improved.tempo, 128);
        assert_eq!(improved.tracks[0].notes.last().unwrap().duration, before + 1.0);
        assert!(improved.check().is_ok());
    }
}
