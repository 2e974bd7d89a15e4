//! # Verso Testing
//!
//! Test doubles for Verso runs.
//!
//! - **Mock tools**: [`MockTool`] with scripted responses, and
//!   [`ToolRecorder`] to instrument a real tool set
//! - **Approval gates**: [`ScriptedApprovalGate`] (approve, reject,
//!   regenerate once, time out)
//! - **Progress**: [`ProgressRecorder`]
//! - **Trace checks**: [`check_tool_call_pairs`] and friends
//!
//! ```rust
//! use verso_core::ToolKind;
//! use verso_testing::MockTool;
//!
//! let evaluator = MockTool::evaluator(ToolKind::EvaluateLyrics, [(6.0, true), (7.5, false)]);
//! assert_eq!(evaluator.call_count(), 0);
//! ```

/// Scripted approval gates
pub mod gates;
/// Mock and recording tools
pub mod mock_tools;
/// Progress event recorder
pub mod progress;
/// Trace structure assertions
pub mod trace;

pub use gates::{ReviewRecord, ScriptedApprovalGate};
pub use mock_tools::{MockTool, RecordingTool, ToolRecorder, evaluation};
pub use progress::ProgressRecorder;
pub use trace::{check_tool_call_pairs, event_types, tools_called};
