//! Melody workflow: song structure in, melody structure refined.

use serde_json::{Map, Value, json};
use verso_core::model::MelodyRequest;
use verso_core::{StateKey, StateStore, ToolCall, ToolKind, ToolSet};

use crate::error::PolicyError;
use crate::policy::{QualityThreshold, Workflow, WorkflowPolicy};

/// Optional musical context forwarded to `generate-melody`.
const CONTEXT_KEYS: [(StateKey, &str); 5] = [
    (StateKey::Emotion, "emotion"),
    (StateKey::Mood, "mood"),
    (StateKey::Tempo, "tempo"),
    (StateKey::Key, "key"),
    (StateKey::TimeSignature, "timeSignature"),
];

/// Expects a [`MelodyRequest`] under `initialInput` (or the individual keys
/// already in state) and refines `melodyStructure`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MelodyWorkflow;

pub type MelodyPolicy = WorkflowPolicy<MelodyWorkflow>;

impl WorkflowPolicy<MelodyWorkflow> {
    /// Melody policy with the melody quality threshold.
    pub fn melody(tools: ToolSet, max_iterations: u32) -> Self {
        WorkflowPolicy::new(MelodyWorkflow, tools, QualityThreshold::MELODY, max_iterations)
    }
}

fn set_if_absent(state: &mut StateStore, key: StateKey, value: Option<Value>) {
    if let Some(value) = value
        && !state.contains(key)
    {
        state.set(key, value);
    }
}

fn non_blank(value: Option<String>) -> Option<Value> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(Value::String)
}

impl MelodyWorkflow {
    /// Copy the request's fields into their state keys without overwriting.
    fn seed(&self, state: &mut StateStore) -> Result<(), PolicyError> {
        let Some(request) = state.get_as::<MelodyRequest>(StateKey::InitialInput)? else {
            return Ok(());
        };
        let song = serde_json::to_value(&request.song_structure)?;

        set_if_absent(state, StateKey::SongStructure, Some(song));
        set_if_absent(state, StateKey::Emotion, non_blank(request.emotion));
        set_if_absent(state, StateKey::Mood, non_blank(request.mood));
        set_if_absent(state, StateKey::Tempo, request.tempo.map(Value::from));
        set_if_absent(state, StateKey::Key, non_blank(request.key));
        set_if_absent(
            state,
            StateKey::TimeSignature,
            non_blank(request.time_signature),
        );
        Ok(())
    }
}

impl Workflow for MelodyWorkflow {
    fn name(&self) -> &'static str {
        "melody"
    }

    fn draft_key(&self) -> StateKey {
        StateKey::MelodyStructure
    }

    fn generate(&self, state: &mut StateStore) -> Result<Option<ToolCall>, PolicyError> {
        self.seed(state)?;

        let Some(song) = state.get(StateKey::SongStructure).cloned() else {
            return Ok(None);
        };
        if !state.contains(StateKey::Emotion) && !state.contains(StateKey::Mood) {
            return Err(PolicyError::MissingContext(
                "melody generation needs an emotion or mood".to_string(),
            ));
        }

        let mut input = Map::new();
        input.insert("songStructure".to_string(), song);
        for (key, field) in CONTEXT_KEYS {
            if let Some(value) = state.get(key) {
                input.insert(field.to_string(), value.clone());
            }
        }
        Ok(Some(ToolCall::new(
            ToolKind::GenerateMelody,
            Value::Object(input),
        )))
    }

    fn evaluate(&self, state: &StateStore, draft: &Value) -> ToolCall {
        let mut input = json!({ "melodyStructure": draft });
        if let (Some(song), Value::Object(map)) = (state.get(StateKey::SongStructure), &mut input) {
            map.insert("songStructure".to_string(), song.clone());
        }
        ToolCall::new(ToolKind::EvaluateMelody, input)
    }

    fn improve(&self, draft: &Value, evaluation: &Value, feedback: Option<&str>) -> ToolCall {
        let mut input = Map::new();
        input.insert("melodyStructure".to_string(), draft.clone());
        input.insert("evaluation".to_string(), evaluation.clone());
        if let Some(feedback) = feedback {
            input.insert(
                ToolKind::FEEDBACK_FIELD.to_string(),
                Value::String(feedback.to_string()),
            );
        }
        ToolCall::new(ToolKind::ImproveMelody, Value::Object(input))
    }
}
