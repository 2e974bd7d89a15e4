//! Scripted approval gates.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use verso_agent::{ApprovalError, ApprovalGate, ApprovalId, ApprovalResponse};
use verso_core::ToolKind;

use crate::mock_tools::lock;

/// One review the gate has seen.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewRecord {
    pub tool: ToolKind,
    pub output: Value,
}

/// Gate answering from a queue, then with a fallback decision.
#[derive(Debug)]
pub struct ScriptedApprovalGate {
    script: Mutex<VecDeque<Result<ApprovalResponse, ApprovalError>>>,
    fallback: Result<ApprovalResponse, ApprovalError>,
    reviews: Mutex<Vec<ReviewRecord>>,
}

impl ScriptedApprovalGate {
    pub fn new(fallback: ApprovalResponse) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Ok(fallback),
            reviews: Mutex::new(Vec::new()),
        }
    }

    pub fn always_approve() -> Self {
        Self::new(ApprovalResponse::approve())
    }

    pub fn always_reject() -> Self {
        Self::new(ApprovalResponse::reject())
    }

    /// Ask for one regeneration with `feedback`, then approve everything.
    pub fn regenerate_once(feedback: impl Into<String>) -> Self {
        Self::always_approve().then(ApprovalResponse::regenerate(feedback))
    }

    /// Every review times out.
    pub fn timing_out() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Err(ApprovalError::TimedOut {
                id: ApprovalId::new(),
                timeout: Duration::ZERO,
            }),
            reviews: Mutex::new(Vec::new()),
        }
    }

    /// Queue a response ahead of the fallback.
    pub fn then(self, response: ApprovalResponse) -> Self {
        lock(&self.script).push_back(Ok(response));
        self
    }

    /// Number of approval round-trips.
    pub fn rounds(&self) -> usize {
        lock(&self.reviews).len()
    }

    pub fn reviews(&self) -> Vec<ReviewRecord> {
        lock(&self.reviews).clone()
    }
}

#[async_trait]
impl ApprovalGate for ScriptedApprovalGate {
    async fn review(
        &self,
        tool: ToolKind,
        output: &Value,
    ) -> Result<ApprovalResponse, ApprovalError> {
        lock(&self.reviews).push(ReviewRecord {
            tool,
            output: output.clone(),
        });
        let scripted = lock(&self.script).pop_front();
        scripted.unwrap_or_else(|| self.fallback.clone())
    }
}
