//! # Verso
//!
//! Guarded generate / evaluate / improve orchestration for song lyrics and
//! melodies.
//!
//! A run is driven by an [`Orchestrator`]: a [`DecisionPolicy`] picks one
//! tool call per step from the run's [`StateStore`], the orchestrator
//! executes it under step and tool-call budgets, optionally pauses on an
//! [`ApprovalGate`] before committing content, and returns a [`RunResult`]
//! with the final state and the full [`ExecutionTrace`] events.
//!
//! ## Crates
//!
//! - [`core`]: tool contract, tool kinds, state store, trace, domain model
//! - [`tools`]: the six lyrics and melody tools and their composer backends
//! - [`agent`]: decision policies, approval gate, progress hooks, control loop
//! - `testing` (feature `testing`): scripted tools and gates
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use serde_json::json;
//! use verso::{GuardrailConfig, LyricsPolicy, Orchestrator, SampleComposer, ToolKind, lyrics_tools};
//!
//! # tokio_test::block_on(async {
//! let tools = lyrics_tools(Arc::new(SampleComposer::new()));
//! let orchestrator = Orchestrator::new(
//!     LyricsPolicy::lyrics(tools, 3),
//!     GuardrailConfig::new(12, 12, 3).unwrap(),
//!     [ToolKind::GenerateSongStructure, ToolKind::EvaluateLyrics, ToolKind::ImproveLyrics],
//! );
//!
//! let result = orchestrator
//!     .run(json!({ "lyrics": "a rainy bus stop", "emotion": "sad" }))
//!     .await;
//! assert!(result.success);
//! assert_eq!(result.stats.iteration_count, 1);
//! # });
//! ```

// ============================================================================
// Module aliases for namespaced access
// ============================================================================

pub use verso_agent as agent;
pub use verso_core as core;
pub use verso_tools as tools;

#[cfg(feature = "testing")]
pub use verso_testing as testing;

// ============================================================================
// Core types - tools, state, trace, configuration
// ============================================================================

pub use verso_core::{
    ConfigError, ExecutionTrace, GuardrailConfig, Schema, SchemaViolation, StateError, StateKey,
    StateSnapshot, StateStore, Tool, ToolCall, ToolError, ToolKind, ToolResult, ToolSet, ToolWork,
    TraceEvent, TraceEventType, ValidatedTool, ValidationStage, WorkError,
};

// Domain model
pub use verso_core::model::{
    CreativeBrief, Evaluation, LyricsRequest, MelodyRequest, MelodyStructure, SongStructure,
};

// ============================================================================
// Tools - composers and tool sets
// ============================================================================

pub use verso_tools::{Backend, Composer, ModelComposer, SampleComposer, lyrics_tools, melody_tools};

#[cfg(feature = "live")]
pub use verso_tools::{HttpCompletionClient, HttpCompletionConfig};

// ============================================================================
// Agent - policies, approval, orchestration
// ============================================================================

pub use verso_agent::{
    ApprovalDecision, ApprovalGate, ApprovalRegistry, ApprovalResponse, DecisionPolicy,
    LyricsPolicy, MelodyPolicy, Orchestrator, ProgressEvent, ProgressHook, QualityThreshold,
    RegistryApprovalGate, RunError, RunResult, TerminationReason,
};
