//! # Verso Tools
//!
//! The six content tools used by the lyrics and melody workflows, each a
//! [`ToolWork`](verso_core::ToolWork) wrapped in
//! [`ValidatedTool`](verso_core::ValidatedTool), plus the [`Composer`]
//! backends that do the creative work.
//!
//! ## Features
//!
//! - **live** (default): [`HttpCompletionClient`] for OpenAI-compatible
//!   chat completion endpoints.

pub mod composer;
pub mod lyrics;
pub mod melody;

use std::sync::Arc;
use verso_core::{ToolSet, ValidatedTool};

pub use composer::{
    Backend, CompletionClient, CompletionRequest, Composer, ModelComposer, SampleComposer,
    UnknownBackend, extract_json_object,
};
#[cfg(feature = "live")]
pub use composer::{HttpCompletionClient, HttpCompletionConfig};
pub use lyrics::{LyricsEvaluator, LyricsImprover, SongGenerator};
pub use melody::{MelodyEvaluator, MelodyGenerator, MelodyImprover};

/// `generate-song-structure`, `evaluate-lyrics` and `improve-lyrics`.
pub fn lyrics_tools(composer: Arc<dyn Composer>) -> ToolSet {
    ToolSet::new()
        .with_tool(Arc::new(ValidatedTool::new(SongGenerator::new(
            composer.clone(),
        ))))
        .with_tool(Arc::new(ValidatedTool::new(LyricsEvaluator::new(
            composer.clone(),
        ))))
        .with_tool(Arc::new(ValidatedTool::new(LyricsImprover::new(composer))))
}

/// `generate-melody`, `evaluate-melody` and `improve-melody`.
pub fn melody_tools(composer: Arc<dyn Composer>) -> ToolSet {
    ToolSet::new()
        .with_tool(Arc::new(ValidatedTool::new(MelodyGenerator::new(
            composer.clone(),
        ))))
        .with_tool(Arc::new(ValidatedTool::new(MelodyEvaluator::new(
            composer.clone(),
        ))))
        .with_tool(Arc::new(ValidatedTool::new(MelodyImprover::new(composer))))
}
