//! Progress notifications for run observers.
//!
//! Hooks are purely observational: the orchestrator logs and ignores any
//! error they return.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::info;
use verso_core::ToolKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressPhase {
    Planning,
    Acting,
    ToolCall,
    AwaitingApproval,
    Observing,
    Reflecting,
    Complete,
    Error,
}

impl ProgressPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressPhase::Planning => "planning",
            ProgressPhase::Acting => "acting",
            ProgressPhase::ToolCall => "tool_call",
            ProgressPhase::AwaitingApproval => "awaiting_approval",
            ProgressPhase::Observing => "observing",
            ProgressPhase::Reflecting => "reflecting",
            ProgressPhase::Complete => "complete",
            ProgressPhase::Error => "error",
        }
    }
}

impl std::fmt::Display for ProgressPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub phase: ProgressPhase,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<ToolKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iteration: Option<u32>,
}

impl ProgressEvent {
    pub fn new(phase: ProgressPhase, message: impl Into<String>) -> Self {
        Self {
            phase,
            message: message.into(),
            tool: None,
            iteration: None,
        }
    }

    pub fn with_tool(mut self, tool: ToolKind) -> Self {
        self.tool = Some(tool);
        self
    }

    pub fn with_iteration(mut self, iteration: u32) -> Self {
        self.iteration = Some(iteration);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Progress hook failed: {0}")]
pub struct ProgressError(pub String);

pub trait ProgressHook: Send + Sync {
    fn notify(&self, event: &ProgressEvent) -> Result<(), ProgressError>;
}

impl<F> ProgressHook for F
where
    F: Fn(&ProgressEvent) -> Result<(), ProgressError> + Send + Sync,
{
    fn notify(&self, event: &ProgressEvent) -> Result<(), ProgressError> {
        self(event)
    }
}

/// Forwards events to a bounded channel, e.g. for a push-stream transport.
///
/// A full or closed channel is reported as an error rather than waiting.
#[derive(Debug, Clone)]
pub struct ChannelProgressHook {
    sender: mpsc::Sender<ProgressEvent>,
}

impl ChannelProgressHook {
    pub fn new(sender: mpsc::Sender<ProgressEvent>) -> Self {
        Self { sender }
    }

    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self::new(sender), receiver)
    }
}

impl ProgressHook for ChannelProgressHook {
    fn notify(&self, event: &ProgressEvent) -> Result<(), ProgressError> {
        self.sender
            .try_send(event.clone())
            .map_err(|e| ProgressError(e.to_string()))
    }
}

/// Logs each event at `info`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgressHook;

impl ProgressHook for TracingProgressHook {
    fn notify(&self, event: &ProgressEvent) -> Result<(), ProgressError> {
        info!(
            phase = %event.phase,
            tool = ?event.tool.map(|t| t.id()),
            iteration = ?event.iteration,
            "{}",
            event.message
        );
        Ok(())
    }
}
