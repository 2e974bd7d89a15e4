//! Lyrics tools: generate, evaluate and improve a song structure.

use async_trait::async_trait;
use std::sync::Arc;
use verso_core::model::{
    EvaluateLyricsInput, Evaluation, GenerateLyricsInput, ImproveLyricsInput, SongStructure,
};
use verso_core::{ToolKind, ToolWork, WorkError};

use crate::composer::Composer;

/// `generate-song-structure`: first draft from a creative brief.
pub struct SongGenerator {
    composer: Arc<dyn Composer>,
}

impl SongGenerator {
    pub fn new(composer: Arc<dyn Composer>) -> Self {
        Self { composer }
    }
}

#[async_trait]
impl ToolWork for SongGenerator {
    type Input = GenerateLyricsInput;
    type Output = SongStructure;

    fn kind(&self) -> ToolKind {
        ToolKind::GenerateSongStructure
    }

    fn description(&self) -> &str {
        "Draft a song structure from a creative brief"
    }

    async fn run(&self, input: GenerateLyricsInput) -> Result<SongStructure, WorkError> {
        self.composer.generate_song(input).await
    }
}

/// `evaluate-lyrics`: score and critique the current draft.
pub struct LyricsEvaluator {
    composer: Arc<dyn Composer>,
}

impl LyricsEvaluator {
    pub fn new(composer: Arc<dyn Composer>) -> Self {
        Self { composer }
    }
}

#[async_trait]
impl ToolWork for LyricsEvaluator {
    type Input = EvaluateLyricsInput;
    type Output = Evaluation;

    fn kind(&self) -> ToolKind {
        ToolKind::EvaluateLyrics
    }

    fn description(&self) -> &str {
        "Score the song structure and list strengths, weaknesses and suggestions"
    }

    async fn run(&self, input: EvaluateLyricsInput) -> Result<Evaluation, WorkError> {
        self.composer.evaluate_song(input).await
    }
}

/// `improve-lyrics`: replace the draft with a revision.
pub struct LyricsImprover {
    composer: Arc<dyn Composer>,
}

impl LyricsImprover {
    pub fn new(composer: Arc<dyn Composer>) -> Self {
        Self { composer }
    }
}

#[async_trait]
impl ToolWork for LyricsImprover {
    type Input = ImproveLyricsInput;
    type Output = SongStructure;

    fn kind(&self) -> ToolKind {
        ToolKind::ImproveLyrics
    }

    fn description(&self) -> &str {
        "Revise the song structure using its evaluation and user feedback"
    }

    async fn run(&self, input: ImproveLyricsInput) -> Result<SongStructure, WorkError> {
        self.composer.improve_song(input).await
    }
}
