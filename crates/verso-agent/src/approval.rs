//! # Approval Gate
//!
//! Human review of content-producing tool output before it is committed.
//!
//! The [`ApprovalRegistry`] is the shared table of pending requests. It is
//! cheap to clone and is passed explicitly to whichever component presents
//! requests to a reviewer (a CLI prompt, an HTTP handler) and to the
//! [`RegistryApprovalGate`] that suspends runs on it. Resolution removes the
//! entry before sending the decision, so each request is answered at most
//! once even when two reviewers race.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;
use verso_core::ToolKind;

use crate::error::ApprovalError;

/// How long a [`RegistryApprovalGate`] waits before treating silence as a
/// rejection.
pub const DEFAULT_APPROVAL_TIMEOUT: Duration = Duration::from_secs(300);

/// Unique id of one approval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApprovalId(Uuid);

impl ApprovalId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ApprovalId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ApprovalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ApprovalId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalDecision {
    Approve,
    Reject,
    Regenerate,
}

impl ApprovalDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalDecision::Approve => "approve",
            ApprovalDecision::Reject => "reject",
            ApprovalDecision::Regenerate => "regenerate",
        }
    }
}

impl std::fmt::Display for ApprovalDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reviewer's answer. Feedback is only acted on for
/// [`ApprovalDecision::Regenerate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalResponse {
    pub decision: ApprovalDecision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

impl ApprovalResponse {
    pub fn approve() -> Self {
        Self {
            decision: ApprovalDecision::Approve,
            feedback: None,
        }
    }

    pub fn reject() -> Self {
        Self {
            decision: ApprovalDecision::Reject,
            feedback: None,
        }
    }

    pub fn regenerate(feedback: impl Into<String>) -> Self {
        Self {
            decision: ApprovalDecision::Regenerate,
            feedback: Some(feedback.into()),
        }
    }

    pub fn with_feedback(mut self, feedback: impl Into<String>) -> Self {
        self.feedback = Some(feedback.into());
        self
    }

    /// Feedback text, ignoring blank strings.
    pub fn feedback(&self) -> Option<&str> {
        self.feedback
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
    }
}

/// What a reviewer is shown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    pub id: ApprovalId,
    pub tool_id: ToolKind,
    pub output: Value,
    pub created_at: DateTime<Utc>,
}

/// Reviews a tool's output before it is committed.
#[async_trait]
pub trait ApprovalGate: Send + Sync {
    async fn review(&self, tool: ToolKind, output: &Value)
    -> Result<ApprovalResponse, ApprovalError>;
}

struct PendingApproval {
    request: ApprovalRequest,
    responder: oneshot::Sender<ApprovalResponse>,
}

struct RegistryInner {
    pending: DashMap<ApprovalId, PendingApproval>,
    notifier: Option<mpsc::UnboundedSender<ApprovalRequest>>,
}

/// Concurrency-safe table of pending approval requests, shared across runs.
#[derive(Clone)]
pub struct ApprovalRegistry {
    inner: Arc<RegistryInner>,
}

impl ApprovalRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                pending: DashMap::new(),
                notifier: None,
            }),
        }
    }

    /// Registry that publishes every new request on `notifier`.
    pub fn with_notifier(notifier: mpsc::UnboundedSender<ApprovalRequest>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                pending: DashMap::new(),
                notifier: Some(notifier),
            }),
        }
    }

    /// Register a request and return the receiver its decision arrives on.
    pub fn submit(
        &self,
        tool: ToolKind,
        output: Value,
    ) -> (ApprovalRequest, oneshot::Receiver<ApprovalResponse>) {
        let request = ApprovalRequest {
            id: ApprovalId::new(),
            tool_id: tool,
            output,
            created_at: Utc::now(),
        };
        let (responder, receiver) = oneshot::channel();
        self.inner.pending.insert(
            request.id,
            PendingApproval {
                request: request.clone(),
                responder,
            },
        );
        info!(approval_id = %request.id, tool = %tool, "Approval requested");

        if let Some(notifier) = &self.inner.notifier
            && notifier.send(request.clone()).is_err()
        {
            debug!(approval_id = %request.id, "Approval notifier has no listener");
        }

        (request, receiver)
    }

    pub fn get(&self, id: ApprovalId) -> Option<ApprovalRequest> {
        self.inner.pending.get(&id).map(|entry| entry.request.clone())
    }

    /// Pending requests, oldest first.
    pub fn pending(&self) -> Vec<ApprovalRequest> {
        let mut requests: Vec<ApprovalRequest> = self
            .inner
            .pending
            .iter()
            .map(|entry| entry.request.clone())
            .collect();
        requests.sort_by_key(|r| r.created_at);
        requests
    }

    /// Deliver a decision. Fails with [`ApprovalError::NotPending`] when the
    /// request was already resolved or expired.
    pub fn resolve(&self, id: ApprovalId, response: ApprovalResponse) -> Result<(), ApprovalError> {
        let (_, pending) = self
            .inner
            .pending
            .remove(&id)
            .ok_or(ApprovalError::NotPending(id))?;

        let decision = response.decision;
        pending
            .responder
            .send(response)
            .map_err(|_| ApprovalError::Abandoned(id))?;
        info!(approval_id = %id, decision = %decision, "Approval resolved");
        Ok(())
    }

    /// Drop a pending request without a decision. Returns whether it existed.
    pub fn expire(&self, id: ApprovalId) -> bool {
        let removed = self.inner.pending.remove(&id).is_some();
        if removed {
            debug!(approval_id = %id, "Approval request expired");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.inner.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.pending.is_empty()
    }
}

impl Default for ApprovalRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ApprovalRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalRegistry")
            .field("pending", &self.len())
            .field("notifier", &self.inner.notifier.is_some())
            .finish()
    }
}

/// Gate that parks each review in an [`ApprovalRegistry`] until a decision
/// arrives or the timeout elapses.
#[derive(Debug, Clone)]
pub struct RegistryApprovalGate {
    registry: ApprovalRegistry,
    timeout: Duration,
}

impl RegistryApprovalGate {
    pub fn new(registry: ApprovalRegistry) -> Self {
        Self {
            registry,
            timeout: DEFAULT_APPROVAL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn registry(&self) -> &ApprovalRegistry {
        &self.registry
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl ApprovalGate for RegistryApprovalGate {
    async fn review(
        &self,
        tool: ToolKind,
        output: &Value,
    ) -> Result<ApprovalResponse, ApprovalError> {
        let (request, receiver) = self.registry.submit(tool, output.clone());

        match tokio::time::timeout(self.timeout, receiver).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(ApprovalError::Abandoned(request.id)),
            Err(_) => {
                self.registry.expire(request.id);
                warn!(
                    approval_id = %request.id,
                    tool = %tool,
                    timeout = ?self.timeout,
                    "Approval timed out"
                );
                Err(ApprovalError::TimedOut {
                    id: request.id,
                    timeout: self.timeout,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_is_at_most_once() {
        let registry = ApprovalRegistry::new();
        let (request, mut receiver) = registry.submit(ToolKind::ImproveLyrics, json!({"a": 1}));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(request.id).unwrap().tool_id, ToolKind::ImproveLyrics);

        registry.resolve(request.id, ApprovalResponse::approve()).unwrap();
        assert!(registry.is_empty());
        assert_eq!(receiver.try_recv().unwrap(), ApprovalResponse::approve());

        let err = registry
            .resolve(request.id, ApprovalResponse::reject())
            .unwrap_err();
        assert_eq!(err, ApprovalError::NotPending(request.id));
    }

    #[test]
    fn test_resolve_with_dropped_receiver_is_abandoned() {
        let registry = ApprovalRegistry::new();
        let (request, receiver) = registry.submit(ToolKind::GenerateMelody, json!({}));
        drop(receiver);

        let err = registry
            .resolve(request.id, ApprovalResponse::approve())
            .unwrap_err();
        assert_eq!(err, ApprovalError::Abandoned(request.id));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_pending_lists_oldest_first_and_expire_frees_slot() {
        let registry = ApprovalRegistry::new();
        let (first, _rx1) = registry.submit(ToolKind::GenerateSongStructure, json!(1));
        let (second, _rx2) = registry.submit(ToolKind::ImproveLyrics, json!(2));

        let pending: Vec<ApprovalId> = registry.pending().iter().map(|r| r.id).collect();
        assert_eq!(pending.len(), 2);
        assert!(pending.contains(&first.id) && pending.contains(&second.id));

        assert!(registry.expire(first.id));
        assert!(!registry.expire(first.id));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_response_feedback_ignores_blank() {
        assert_eq!(ApprovalResponse::regenerate("  ").feedback(), None);
        assert_eq!(
            ApprovalResponse::regenerate(" shorter chorus ").feedback(),
            Some("shorter chorus")
        );
        let parsed: ApprovalResponse =
            serde_json::from_value(json!({"decision": "regenerate", "feedback": "x"})).unwrap();
        assert_eq!(parsed.decision, ApprovalDecision::Regenerate);
    }

    #[tokio::test]
    async fn test_notifier_publishes_requests() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let registry = ApprovalRegistry::with_notifier(tx);
        let (request, _receiver) = registry.submit(ToolKind::ImproveMelody, json!({"x": 1}));

        let published = rx.recv().await.unwrap();
        assert_eq!(published.id, request.id);
        assert_eq!(published.output, json!({"x": 1}));
    }

    #[tokio::test]
    async fn test_gate_returns_reviewer_decision() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let registry = ApprovalRegistry::with_notifier(tx);
        let gate = RegistryApprovalGate::new(registry.clone());

        let reviewer = tokio::spawn(async move {
            let request = rx.recv().await.unwrap();
            registry
                .resolve(request.id, ApprovalResponse::regenerate("more rain"))
                .unwrap();
        });

        let response = gate
            .review(ToolKind::GenerateSongStructure, &json!({"title": "T"}))
            .await
            .unwrap();
        reviewer.await.unwrap();
        assert_eq!(response.decision, ApprovalDecision::Regenerate);
        assert_eq!(response.feedback(), Some("more rain"));
    }

    #[tokio::test]
    async fn test_gate_times_out_and_frees_slot() {
        let registry = ApprovalRegistry::new();
        let gate = RegistryApprovalGate::new(registry.clone())
            .with_timeout(Duration::from_millis(20));

        let err = gate
            .review(ToolKind::ImproveLyrics, &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ApprovalError::TimedOut { .. }));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_resolutions_honor_one() {
        let registry = ApprovalRegistry::new();
        let (request, receiver) = registry.submit(ToolKind::ImproveLyrics, json!({}));

        let handles: Vec<_> = [ApprovalResponse::approve(), ApprovalResponse::reject()]
            .into_iter()
            .map(|response| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.resolve(request.id, response) })
            })
            .collect();

        let mut ok = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                ok += 1;
            }
        }
        assert_eq!(ok, 1);
        assert!(receiver.await.is_ok());
    }
}
