//! Creative brief derivation.
//!
//! The brief is computed from the raw request with fixed lookup tables and
//! no generative call, so the same request always yields the same brief.

use serde::{Deserialize, Serialize};

use crate::schema::{Schema, SchemaViolation, ensure};

/// Raw input of a lyrics run, stored under `initialInput`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LyricsRequest {
    /// Free text describing what the song is about.
    pub lyrics: String,
    pub emotion: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
}

impl LyricsRequest {
    pub fn new(lyrics: impl Into<String>, emotion: impl Into<String>) -> Self {
        Self {
            lyrics: lyrics.into(),
            emotion: emotion.into(),
            genre: None,
        }
    }

    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = Some(genre.into());
        self
    }
}

/// Coarse tempo class of a song.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TempoClass {
    Slow,
    Moderate,
    Fast,
}

impl TempoClass {
    /// Representative beats-per-minute for the class.
    pub fn bpm(&self) -> u32 {
        match self {
            TempoClass::Slow => 72,
            TempoClass::Moderate => 100,
            TempoClass::Fast => 128,
        }
    }

    /// Classify an explicit BPM value.
    pub fn from_bpm(bpm: u32) -> Self {
        match bpm {
            0..=84 => TempoClass::Slow,
            85..=115 => TempoClass::Moderate,
            _ => TempoClass::Fast,
        }
    }
}

/// Immutable creative direction for one lyrics run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreativeBrief {
    pub concept: String,
    pub emotion: String,
    pub mood: String,
    pub themes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    pub tempo: TempoClass,
}

impl CreativeBrief {
    /// Derive the brief from a request using the fixed lookup tables.
    pub fn derive(request: &LyricsRequest) -> Self {
        let emotion = normalize(&request.emotion);
        let genre = request
            .genre
            .as_deref()
            .map(normalize)
            .filter(|g| !g.is_empty());

        Self {
            concept: request.lyrics.trim().to_string(),
            mood: mood_for(&emotion).to_string(),
            themes: themes_for(&emotion).iter().map(|t| t.to_string()).collect(),
            tempo: tempo_for(genre.as_deref(), &emotion),
            genre,
            emotion,
        }
    }
}

impl Schema for CreativeBrief {
    fn check(&self) -> Result<(), SchemaViolation> {
        ensure(!self.concept.trim().is_empty(), || {
            "brief concept must not be empty".to_string()
        })?;
        ensure(!self.emotion.trim().is_empty(), || {
            "brief emotion must not be empty".to_string()
        })?;
        ensure(!self.themes.is_empty(), || {
            "brief must carry at least one theme".to_string()
        })
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Emotion → mood label.
pub fn mood_for(emotion: &str) -> &'static str {
    match emotion {
        "happy" | "joyful" => "uplifting",
        "sad" | "heartbroken" => "melancholic",
        "angry" => "intense",
        "calm" | "peaceful" => "serene",
        "nostalgic" => "bittersweet",
        "excited" => "energetic",
        "romantic" | "love" => "tender",
        "hopeful" => "optimistic",
        "anxious" => "restless",
        _ => "reflective",
    }
}

/// Emotion → theme list.
pub fn themes_for(emotion: &str) -> &'static [&'static str] {
    match emotion {
        "happy" | "joyful" => &["celebration", "friendship", "sunlight"],
        "sad" | "heartbroken" => &["loss", "memory", "longing"],
        "angry" => &["injustice", "defiance", "breaking free"],
        "calm" | "peaceful" => &["nature", "stillness", "acceptance"],
        "nostalgic" => &["childhood", "old places", "time passing"],
        "excited" => &["adventure", "night out", "new beginnings"],
        "romantic" | "love" => &["devotion", "first meeting", "promises"],
        "hopeful" => &["tomorrow", "resilience", "light after dark"],
        "anxious" => &["uncertainty", "racing thoughts", "holding on"],
        _ => &["life", "change", "self-discovery"],
    }
}

fn genre_bias(genre: &str) -> i8 {
    match genre {
        "rock" | "punk" | "metal" | "edm" | "dance" | "electronic" | "hip-hop" | "rap" => 1,
        "ballad" | "blues" | "ambient" | "folk" | "soul" | "lullaby" => -1,
        _ => 0,
    }
}

fn emotion_bias(emotion: &str) -> i8 {
    match emotion {
        "happy" | "joyful" | "excited" | "angry" => 1,
        "sad" | "heartbroken" | "calm" | "peaceful" | "nostalgic" | "romantic" | "love" => -1,
        _ => 0,
    }
}

/// Genre and emotion jointly determine the tempo class.
pub fn tempo_for(genre: Option<&str>, emotion: &str) -> TempoClass {
    let bias = genre.map(genre_bias).unwrap_or(0) + emotion_bias(emotion);
    match bias.signum() {
        -1 => TempoClass::Slow,
        1 => TempoClass::Fast,
        _ => TempoClass::Moderate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("sad", "melancholic")]
    #[case("happy", "uplifting")]
    #[case("nostalgic", "bittersweet")]
    #[case("bewildered", "reflective")]
    fn test_mood_table(#[case] emotion: &str, #[case] mood: &str) {
        assert_eq!(mood_for(emotion), mood);
    }

    #[rstest]
    #[case(None, "sad", TempoClass::Slow)]
    #[case(None, "excited", TempoClass::Fast)]
    #[case(None, "curious", TempoClass::Moderate)]
    #[case(Some("rock"), "sad", TempoClass::Moderate)]
    #[case(Some("rock"), "angry", TempoClass::Fast)]
    #[case(Some("ballad"), "curious", TempoClass::Slow)]
    #[case(Some("ballad"), "happy", TempoClass::Moderate)]
    fn test_tempo_is_joint_in_genre_and_emotion(
        #[case] genre: Option<&str>,
        #[case] emotion: &str,
        #[case] expected: TempoClass,
    ) {
        assert_eq!(tempo_for(genre, emotion), expected);
    }

    #[test]
    fn test_derive_normalizes_and_is_deterministic() {
        let request = LyricsRequest::new("  a rainy bus stop  ", " Sad ").with_genre("Ballad");
        let brief = CreativeBrief::derive(&request);

        assert_eq!(brief.concept, "a rainy bus stop");
        assert_eq!(brief.emotion, "sad");
        assert_eq!(brief.mood, "melancholic");
        assert_eq!(brief.themes, vec!["loss", "memory", "longing"]);
        assert_eq!(brief.genre.as_deref(), Some("ballad"));
        assert_eq!(brief.tempo, TempoClass::Slow);
        assert_eq!(brief, CreativeBrief::derive(&request));
    }

    #[test]
    fn test_blank_genre_is_dropped() {
        let brief = CreativeBrief::derive(&LyricsRequest::new("x", "happy").with_genre("  "));
        assert!(brief.genre.is_none());
    }

    #[test]
    fn test_brief_schema_rejects_empty_concept() {
        let brief = CreativeBrief::derive(&LyricsRequest::new("   ", "sad"));
        assert!(brief.check().is_err());
    }

    #[test]
    fn test_tempo_class_bpm_round_trip() {
        for class in [TempoClass::Slow, TempoClass::Moderate, TempoClass::Fast] {
            assert_eq!(TempoClass::from_bpm(class.bpm()), class);
        }
    }
}
