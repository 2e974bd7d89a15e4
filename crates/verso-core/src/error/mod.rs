//! Error Types
//!
//! Domain-specific failures shared across the Verso crates. The errors are
//! organized into focused submodules:
//! - `tool`: tool validation and work failures
//! - `config`: guardrail and environment configuration failures

mod config;
mod tool;

pub use config::ConfigError;
pub use tool::{ToolError, ToolResult, ValidationStage, WorkError};
