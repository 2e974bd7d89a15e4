//! Language-model backed composer.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use verso_core::WorkError;
use verso_core::model::{
    EvaluateLyricsInput, EvaluateMelodyInput, Evaluation, GenerateLyricsInput,
    GenerateMelodyInput, ImproveLyricsInput, ImproveMelodyInput, MelodyStructure, SongStructure,
};

use super::{Backend, Composer};

const SONG_SHAPE: &str = r#"{"title": string, "sections": [{"kind": "intro"|"verse"|"pre-chorus"|"chorus"|"bridge"|"outro", "lines": [string]}]}"#;
const MELODY_SHAPE: &str = r#"{"title": string, "tempo": integer bpm 40-240, "key": string, "timeSignature": "n/m", "tracks": [{"section": section kind, "notes": [{"pitch": string, "start": beats, "duration": beats, "syllable": string}]}]}"#;
const EVALUATION_SHAPE: &str = r#"{"score": number 0-10, "strengths": [string], "weaknesses": [string], "suggestions": [string], "needsImprovement": boolean}"#;

/// A single chat-style completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
}

/// Transport to a language model.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Return the model's raw text reply.
    async fn complete(&self, request: CompletionRequest) -> Result<String, WorkError>;
}

/// Composer that asks a language model for JSON drafts and critiques.
pub struct ModelComposer<C: CompletionClient> {
    client: C,
    temperature: f32,
}

impl<C: CompletionClient> ModelComposer<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            temperature: 0.7,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    async fn ask<I, O>(&self, task: &str, shape: &str, input: &I) -> Result<O, WorkError>
    where
        I: Serialize + Sync,
        O: DeserializeOwned,
    {
        let payload = serde_json::to_string_pretty(input)
            .map_err(|e| WorkError::Malformed(format!("cannot encode prompt input: {e}")))?;
        let request = CompletionRequest {
            system: format!(
                "You are a professional songwriter and music producer. {task} \
                 Reply with a single JSON object of the shape {shape} and nothing else."
            ),
            user: payload,
            temperature: self.temperature,
        };

        let reply = self.client.complete(request).await?;
        debug!(task, reply_len = reply.len(), "Model reply received");

        let object = extract_json_object(&reply)
            .ok_or_else(|| WorkError::Malformed("reply contains no JSON object".to_string()))?;
        serde_json::from_str(object).map_err(|e| WorkError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl<C: CompletionClient> Composer for ModelComposer<C> {
    fn backend(&self) -> Backend {
        Backend::Live
    }

    async fn generate_song(&self, input: GenerateLyricsInput) -> Result<SongStructure, WorkError> {
        let mut song: SongStructure = self
            .ask(
                "Write song lyrics for the creative brief below, honouring any user feedback.",
                SONG_SHAPE,
                &input,
            )
            .await?;
        song.revision = 0;
        Ok(song)
    }

    async fn evaluate_song(&self, input: EvaluateLyricsInput) -> Result<Evaluation, WorkError> {
        self.ask(
            "Critique the song lyrics below and decide whether they need another revision.",
            EVALUATION_SHAPE,
            &input,
        )
        .await
    }

    async fn improve_song(&self, input: ImproveLyricsInput) -> Result<SongStructure, WorkError> {
        let revision = input.song_structure.revision.saturating_add(1);
        let mut song: SongStructure = self
            .ask(
                "Rewrite the song lyrics below, addressing the evaluation and any user feedback.",
                SONG_SHAPE,
                &input,
            )
            .await?;
        song.revision = revision;
        Ok(song)
    }

    async fn generate_melody(
        &self,
        input: GenerateMelodyInput,
    ) -> Result<MelodyStructure, WorkError> {
        let mut melody: MelodyStructure = self
            .ask(
                "Compose a vocal melody for the lyrics below using the given musical context.",
                MELODY_SHAPE,
                &input,
            )
            .await?;
        melody.revision = 0;
        Ok(melody)
    }

    async fn evaluate_melody(&self, input: EvaluateMelodyInput) -> Result<Evaluation, WorkError> {
        self.ask(
            "Critique the melody below against its lyrics and decide whether it needs another revision.",
            EVALUATION_SHAPE,
            &input,
        )
        .await
    }

    async fn improve_melody(
        &self,
        input: ImproveMelodyInput,
    ) -> Result<MelodyStructure, WorkError> {
        let revision = input.melody_structure.revision.saturating_add(1);
        let mut melody: MelodyStructure = self
            .ask(
                "Revise the melody below, addressing the evaluation and any user feedback.",
                MELODY_SHAPE,
                &input,
            )
            .await?;
        melody.revision = revision;
        Ok(melody)
    }
}

/// Slice out the first balanced top-level JSON object in `text`.
///
/// Models often wrap JSON in prose or code fences; braces inside string
/// literals are ignored.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
