//! # Verso Agent
//!
//! Decision policies and the guarded control loop that drives them.
//!
//! - [`WorkflowPolicy`] is the shared generate / evaluate / improve decision
//!   tree, instantiated as [`LyricsPolicy`] and [`MelodyPolicy`].
//! - [`Orchestrator`] runs a policy under step and tool-call budgets,
//!   optionally pausing on an [`ApprovalGate`] before committing content.
//! - [`ApprovalRegistry`] holds pending approvals shared across runs.
//!
//! ```rust,no_run
//! use serde_json::json;
//! use verso_agent::{LyricsPolicy, Orchestrator};
//! use verso_core::{GuardrailConfig, ToolKind, ToolSet};
//!
//! # async fn example(tools: ToolSet) -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = Orchestrator::new(
//!     LyricsPolicy::lyrics(tools, 3),
//!     GuardrailConfig::new(12, 12, 3)?,
//!     [ToolKind::GenerateSongStructure, ToolKind::EvaluateLyrics, ToolKind::ImproveLyrics],
//! );
//! let result = orchestrator.run(json!({"lyrics": "a rainy bus stop", "emotion": "sad"})).await;
//! println!("{}", serde_json::to_string_pretty(&result)?);
//! # Ok(())
//! # }
//! ```

pub mod approval;
pub mod error;
pub mod lyrics;
pub mod melody;
pub mod orchestrator;
pub mod policy;
pub mod progress;
pub mod result;

pub use approval::{
    ApprovalDecision, ApprovalGate, ApprovalId, ApprovalRegistry, ApprovalRequest,
    ApprovalResponse, DEFAULT_APPROVAL_TIMEOUT, RegistryApprovalGate,
};
pub use error::{ApprovalError, PolicyError, RunError};
pub use lyrics::{LyricsPolicy, LyricsWorkflow};
pub use melody::{MelodyPolicy, MelodyWorkflow};
pub use orchestrator::Orchestrator;
pub use policy::{
    AgentOutput, DecisionPolicy, Observation, Plan, QualityThreshold, Reflection,
    TerminationReason, Workflow, WorkflowPolicy,
};
pub use progress::{
    ChannelProgressHook, ProgressError, ProgressEvent, ProgressHook, ProgressPhase,
    TracingProgressHook,
};
pub use result::{RunResult, RunStats};
