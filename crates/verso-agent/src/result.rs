//! Structured outcome of one run.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use verso_core::{StateSnapshot, TraceEvent, TraceEventType};

use crate::error::RunError;
use crate::policy::TerminationReason;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    pub steps_taken: u32,
    pub tool_calls_made: u32,
    pub iteration_count: u32,
}

/// Success or failure of a run, with everything accumulated up to the end.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub run_id: Uuid,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub termination: Option<TerminationReason>,
    pub state: StateSnapshot,
    pub trace: Vec<TraceEvent>,
    pub stats: RunStats,
    #[serde(skip)]
    failure: Option<RunError>,
}

impl RunResult {
    pub(crate) fn succeeded(
        run_id: Uuid,
        termination: Option<TerminationReason>,
        state: StateSnapshot,
        trace: Vec<TraceEvent>,
        stats: RunStats,
    ) -> Self {
        Self {
            run_id,
            success: true,
            error: None,
            error_code: None,
            termination,
            state,
            trace,
            stats,
            failure: None,
        }
    }

    pub(crate) fn failed(
        run_id: Uuid,
        error: RunError,
        state: StateSnapshot,
        trace: Vec<TraceEvent>,
        stats: RunStats,
    ) -> Self {
        Self {
            run_id,
            success: false,
            error: Some(error.to_string()),
            error_code: Some(error.error_code().to_string()),
            termination: None,
            state,
            trace,
            stats,
            failure: Some(error),
        }
    }

    /// The typed failure. Not carried through serialization.
    pub fn failure(&self) -> Option<&RunError> {
        self.failure.as_ref()
    }

    pub fn final_event(&self) -> Option<&TraceEvent> {
        self.trace.last()
    }

    pub fn events_of(&self, event_type: TraceEventType) -> impl Iterator<Item = &TraceEvent> {
        self.trace
            .iter()
            .filter(move |event| event.event_type == event_type)
    }
}
