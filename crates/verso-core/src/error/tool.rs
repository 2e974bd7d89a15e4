//! Tool validation and execution errors.
//!
//! A tool call can fail in exactly two ways: the input or output did not
//! conform to the tool's schema, or the tool's own work failed. Both carry
//! the `ToolKind` so the failure can be attributed in the trace.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tool::ToolKind;

/// Which side of a tool call failed schema validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStage {
    Input,
    Output,
}

impl std::fmt::Display for ValidationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationStage::Input => write!(f, "input"),
            ValidationStage::Output => write!(f, "output"),
        }
    }
}

/// Failure raised by a tool's internal work, e.g. an upstream model call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkError {
    /// An upstream dependency (model endpoint, network) failed.
    #[error("upstream failure: {0}")]
    Upstream(String),

    /// The upstream answered but the reply could not be interpreted.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The backend is not configured or cannot serve this operation.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Errors that can occur while executing a validated tool.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    /// Input or output did not conform to the tool's schema.
    #[error("Tool '{tool}' rejected {stage}: {message}")]
    Validation {
        tool: ToolKind,
        stage: ValidationStage,
        message: String,
    },

    /// The tool's internal work failed.
    #[error("Tool '{tool}' execution failed: {source}")]
    Work {
        tool: ToolKind,
        #[source]
        source: WorkError,
    },
}

impl ToolError {
    /// Create a validation error for the given tool and stage.
    pub fn validation(tool: ToolKind, stage: ValidationStage, message: impl Into<String>) -> Self {
        ToolError::Validation {
            tool,
            stage,
            message: message.into(),
        }
    }

    /// Wrap a work failure raised by the given tool.
    pub fn work(tool: ToolKind, source: WorkError) -> Self {
        ToolError::Work { tool, source }
    }

    /// The tool the failure is attributed to.
    pub fn tool(&self) -> ToolKind {
        match self {
            ToolError::Validation { tool, .. } | ToolError::Work { tool, .. } => *tool,
        }
    }

    /// Whether this is a schema violation rather than a work failure.
    pub fn is_validation(&self) -> bool {
        matches!(self, ToolError::Validation { .. })
    }
}

/// Result type alias for tool operations.
pub type ToolResult<T> = Result<T, ToolError>;
