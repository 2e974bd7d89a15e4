//! # Composer backends
//!
//! A [`Composer`] does the creative work behind the six content tools. The
//! backend is fixed when the tools are constructed:
//!
//! - [`SampleComposer`]: deterministic, offline output suitable for tests and
//!   demos.
//! - [`ModelComposer`]: prompts a language model through a
//!   [`CompletionClient`] and parses its JSON reply.

use async_trait::async_trait;
use std::str::FromStr;
use thiserror::Error;
use verso_core::WorkError;
use verso_core::model::{
    EvaluateLyricsInput, EvaluateMelodyInput, Evaluation, GenerateLyricsInput,
    GenerateMelodyInput, ImproveLyricsInput, ImproveMelodyInput, MelodyStructure, SongStructure,
};

#[cfg(feature = "live")]
pub mod http;
pub mod model;
pub mod sample;

#[cfg(feature = "live")]
pub use http::{HttpCompletionClient, HttpCompletionConfig};
pub use model::{CompletionClient, CompletionRequest, ModelComposer, extract_json_object};
pub use sample::SampleComposer;

/// Creative operations behind the lyrics and melody tools.
#[async_trait]
pub trait Composer: Send + Sync {
    /// Short backend label used in logs.
    fn backend(&self) -> Backend;

    async fn generate_song(&self, input: GenerateLyricsInput) -> Result<SongStructure, WorkError>;

    async fn evaluate_song(&self, input: EvaluateLyricsInput) -> Result<Evaluation, WorkError>;

    async fn improve_song(&self, input: ImproveLyricsInput) -> Result<SongStructure, WorkError>;

    async fn generate_melody(
        &self,
        input: GenerateMelodyInput,
    ) -> Result<MelodyStructure, WorkError>;

    async fn evaluate_melody(&self, input: EvaluateMelodyInput) -> Result<Evaluation, WorkError>;

    async fn improve_melody(&self, input: ImproveMelodyInput)
    -> Result<MelodyStructure, WorkError>;
}

/// Backend mode selected at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    Sample,
    Live,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Sample => "sample",
            Backend::Live => "live",
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown backend '{0}', expected 'sample' or 'live'")]
pub struct UnknownBackend(pub String);

impl FromStr for Backend {
    type Err = UnknownBackend;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sample" => Ok(Backend::Sample),
            "live" => Ok(Backend::Live),
            _ => Err(UnknownBackend(s.to_string())),
        }
    }
}
