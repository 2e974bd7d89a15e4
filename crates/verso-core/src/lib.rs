//! # Verso Core
//!
//! Core traits and types for the Verso orchestration loop: the validated
//! tool contract, the closed set of tool kinds, the run-scoped state store,
//! the execution trace and the lyrics/melody domain model.

pub mod config;
pub mod error;
pub mod model;
pub mod registry;
pub mod schema;
pub mod state;
pub mod tool;
pub mod trace;

pub use config::GuardrailConfig;
pub use error::{ConfigError, ToolError, ToolResult, ValidationStage, WorkError};
pub use registry::ToolSet;
pub use schema::{Schema, SchemaViolation};
pub use state::{StateError, StateKey, StateSnapshot, StateStore};
pub use tool::{Tool, ToolCall, ToolKind, ToolWork, UnknownToolId, ValidatedTool};
pub use trace::{ExecutionTrace, TraceEvent, TraceEventType};
