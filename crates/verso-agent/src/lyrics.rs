//! Lyrics workflow: brief, song structure, lyrics evaluation.

use serde_json::{Map, Value, json};
use verso_core::model::{CreativeBrief, LyricsRequest};
use verso_core::{StateKey, StateStore, ToolCall, ToolKind, ToolSet};

use crate::error::PolicyError;
use crate::policy::{QualityThreshold, Workflow, WorkflowPolicy};

/// Expects a [`LyricsRequest`] under `initialInput` and refines
/// `songStructure`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LyricsWorkflow;

pub type LyricsPolicy = WorkflowPolicy<LyricsWorkflow>;

impl WorkflowPolicy<LyricsWorkflow> {
    /// Lyrics policy with the lyrics quality threshold.
    pub fn lyrics(tools: ToolSet, max_iterations: u32) -> Self {
        WorkflowPolicy::new(LyricsWorkflow, tools, QualityThreshold::LYRICS, max_iterations)
    }
}

impl LyricsWorkflow {
    /// The run's brief, derived and stored on first use.
    fn brief(&self, state: &mut StateStore) -> Result<Option<CreativeBrief>, PolicyError> {
        if let Some(brief) = state.get_as::<CreativeBrief>(StateKey::CreativeBrief)? {
            return Ok(Some(brief));
        }

        let Some(request) = state.get_as::<LyricsRequest>(StateKey::InitialInput)? else {
            return Ok(None);
        };
        if request.lyrics.trim().is_empty() {
            return Ok(None);
        }
        if request.emotion.trim().is_empty() {
            return Err(PolicyError::MissingContext(
                "lyrics generation needs an emotion".to_string(),
            ));
        }

        let brief = CreativeBrief::derive(&request);
        state.set(StateKey::CreativeBrief, serde_json::to_value(&brief)?);
        Ok(Some(brief))
    }
}

impl Workflow for LyricsWorkflow {
    fn name(&self) -> &'static str {
        "lyrics"
    }

    fn draft_key(&self) -> StateKey {
        StateKey::SongStructure
    }

    fn generate(&self, state: &mut StateStore) -> Result<Option<ToolCall>, PolicyError> {
        let Some(brief) = self.brief(state)? else {
            return Ok(None);
        };
        let input = json!({ "brief": serde_json::to_value(&brief)? });
        Ok(Some(ToolCall::new(ToolKind::GenerateSongStructure, input)))
    }

    fn evaluate(&self, _state: &StateStore, draft: &Value) -> ToolCall {
        ToolCall::new(
            ToolKind::EvaluateLyrics,
            json!({ "songStructure": draft }),
        )
    }

    fn improve(&self, draft: &Value, evaluation: &Value, feedback: Option<&str>) -> ToolCall {
        let mut input = Map::new();
        input.insert("songStructure".to_string(), draft.clone());
        input.insert("evaluation".to_string(), evaluation.clone());
        if let Some(feedback) = feedback {
            input.insert(
                ToolKind::FEEDBACK_FIELD.to_string(),
                Value::String(feedback.to_string()),
            );
        }
        ToolCall::new(ToolKind::ImproveLyrics, Value::Object(input))
    }
}
