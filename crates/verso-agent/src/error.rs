//! Error types for policies, approval and runs.

use std::time::Duration;
use thiserror::Error;
use verso_core::{StateError, ToolKind};

use crate::approval::ApprovalId;

/// Errors raised by a decision policy while reading state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolicyError {
    /// The workflow cannot proceed without context the caller must supply.
    #[error("Missing workflow context: {0}")]
    MissingContext(String),

    /// A state value did not have the shape the workflow expects.
    #[error(transparent)]
    State(#[from] StateError),

    /// An action input could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for PolicyError {
    fn from(err: serde_json::Error) -> Self {
        PolicyError::Serialization(err.to_string())
    }
}

/// Errors from the approval registry and gate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApprovalError {
    /// No decision arrived within the gate's window.
    #[error("Approval request {id} timed out after {timeout:?}")]
    TimedOut { id: ApprovalId, timeout: Duration },

    /// The pending slot was dropped without a decision.
    #[error("Approval request {0} was abandoned before a decision")]
    Abandoned(ApprovalId),

    /// The request was already resolved, expired, or never existed.
    #[error("Approval request {0} is not pending")]
    NotPending(ApprovalId),
}

/// Failures that end a run.
///
/// Per-tool failures never appear here; they are absorbed into the trace as
/// failed observations.
#[derive(Debug, Clone, Error)]
pub enum RunError {
    #[error("max steps exceeded (limit {limit})")]
    MaxStepsExceeded { limit: u32 },

    #[error("max tool calls exceeded (limit {limit})")]
    MaxToolCallsExceeded { limit: u32 },

    #[error("output of '{tool}' rejected by approval gate")]
    ApprovalRejected {
        tool: ToolKind,
        feedback: Option<String>,
    },

    #[error("approval of '{tool}' timed out and was treated as a rejection")]
    ApprovalTimedOut { tool: ToolKind },

    #[error("approval of '{tool}' failed: {source}")]
    ApprovalFailed {
        tool: ToolKind,
        #[source]
        source: ApprovalError,
    },

    #[error("Tool '{0}' is not registered with the decision policy")]
    ToolNotFound(ToolKind),

    #[error("Decision policy failed: {0}")]
    Policy(#[from] PolicyError),
}

impl RunError {
    /// Whether this is a hard numeric limit breach.
    pub fn is_guardrail(&self) -> bool {
        matches!(
            self,
            RunError::MaxStepsExceeded { .. } | RunError::MaxToolCallsExceeded { .. }
        )
    }

    /// Whether the approval gate ended the run.
    pub fn is_approval(&self) -> bool {
        matches!(
            self,
            RunError::ApprovalRejected { .. }
                | RunError::ApprovalTimedOut { .. }
                | RunError::ApprovalFailed { .. }
        )
    }

    /// Get the error code suitable for logging or reporting.
    pub fn error_code(&self) -> &'static str {
        match self {
            RunError::MaxStepsExceeded { .. } => "MAX_STEPS_EXCEEDED",
            RunError::MaxToolCallsExceeded { .. } => "MAX_TOOL_CALLS_EXCEEDED",
            RunError::ApprovalRejected { .. } => "APPROVAL_REJECTED",
            RunError::ApprovalTimedOut { .. } => "APPROVAL_TIMED_OUT",
            RunError::ApprovalFailed { .. } => "APPROVAL_FAILED",
            RunError::ToolNotFound(_) => "TOOL_NOT_FOUND",
            RunError::Policy(_) => "POLICY_ERROR",
        }
    }
}
