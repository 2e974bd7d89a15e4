//! # Tools
//!
//! Tools are the only units of work the control loop invokes. Each tool is
//! identified by a variant of the closed [`ToolKind`] set, which carries the
//! static metadata the loop needs (committed state key, approval
//! eligibility, evaluation key invalidated on commit) so nothing downstream
//! dispatches on raw strings.
//!
//! [`ValidatedTool`] wraps a [`ToolWork`] implementation with the input and
//! output schema checks: non-conforming input never reaches the work, and
//! non-conforming output never reaches the caller.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

use crate::error::{ToolError, ToolResult, ValidationStage, WorkError};
use crate::schema::Schema;
use crate::state::StateKey;

/// The closed set of tools known to the lyrics and melody workflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolKind {
    GenerateSongStructure,
    EvaluateLyrics,
    ImproveLyrics,
    GenerateMelody,
    EvaluateMelody,
    ImproveMelody,
}

impl ToolKind {
    /// Field name used when approval feedback is merged into a tool input.
    pub const FEEDBACK_FIELD: &'static str = "userFeedback";

    /// The tool id string.
    pub fn id(&self) -> &'static str {
        match self {
            ToolKind::GenerateSongStructure => "generate-song-structure",
            ToolKind::EvaluateLyrics => "evaluate-lyrics",
            ToolKind::ImproveLyrics => "improve-lyrics",
            ToolKind::GenerateMelody => "generate-melody",
            ToolKind::EvaluateMelody => "evaluate-melody",
            ToolKind::ImproveMelody => "improve-melody",
        }
    }

    /// Parse a tool id string.
    pub fn from_id(id: &str) -> Option<Self> {
        Self::all().iter().copied().find(|kind| kind.id() == id)
    }

    pub fn all() -> &'static [ToolKind] {
        &[
            ToolKind::GenerateSongStructure,
            ToolKind::EvaluateLyrics,
            ToolKind::ImproveLyrics,
            ToolKind::GenerateMelody,
            ToolKind::EvaluateMelody,
            ToolKind::ImproveMelody,
        ]
    }

    /// State key a successful output is committed under.
    pub fn state_key(&self) -> StateKey {
        match self {
            ToolKind::GenerateSongStructure | ToolKind::ImproveLyrics => StateKey::SongStructure,
            ToolKind::GenerateMelody | ToolKind::ImproveMelody => StateKey::MelodyStructure,
            ToolKind::EvaluateLyrics | ToolKind::EvaluateMelody => StateKey::Evaluation,
        }
    }

    /// Content-producing tools are the ones an approval gate reviews.
    pub fn requires_approval(&self) -> bool {
        !matches!(self, ToolKind::EvaluateLyrics | ToolKind::EvaluateMelody)
    }

    /// Key invalidated when this tool's output is committed.
    ///
    /// Improvements replace the draft wholesale, so the evaluation of the
    /// previous draft no longer applies.
    pub fn clears_on_commit(&self) -> Option<StateKey> {
        match self {
            ToolKind::ImproveLyrics | ToolKind::ImproveMelody => Some(StateKey::Evaluation),
            _ => None,
        }
    }

    /// Merge free-text approval feedback into a tool input.
    ///
    /// Object inputs gain a `userFeedback` field; any other value is returned
    /// unchanged and left for input validation to reject.
    pub fn merge_feedback(&self, input: &Value, feedback: &str) -> Value {
        let mut merged = input.clone();
        if let Value::Object(map) = &mut merged {
            map.insert(
                Self::FEEDBACK_FIELD.to_string(),
                Value::String(feedback.to_string()),
            );
        }
        merged
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// A tool id string outside the known set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown tool id '{0}'")]
pub struct UnknownToolId(pub String);

impl FromStr for ToolKind {
    type Err = UnknownToolId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolKind::from_id(s).ok_or_else(|| UnknownToolId(s.to_string()))
    }
}

/// A request to invoke a specific tool with input data.
///
/// `ToolCall` represents a policy's intent to use a tool. The orchestrator is
/// the only component that turns it into an actual invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    pub tool_id: ToolKind,
    pub input: Value,
}

impl ToolCall {
    pub fn new(tool_id: ToolKind, input: Value) -> Self {
        Self { tool_id, input }
    }
}

/// An invocable tool as seen by the orchestrator.
///
/// Tools are stateless across calls apart from configuration fixed at
/// construction (for example which backend mode they use).
#[async_trait]
pub trait Tool: Send + Sync {
    fn kind(&self) -> ToolKind;

    fn description(&self) -> &str {
        ""
    }

    /// Validate `input`, run the work and validate its result.
    async fn execute(&self, input: Value) -> ToolResult<Value>;
}

/// The typed unit of work behind a tool.
#[async_trait]
pub trait ToolWork: Send + Sync {
    type Input: Schema;
    type Output: Schema;

    fn kind(&self) -> ToolKind;

    fn description(&self) -> &str {
        ""
    }

    async fn run(&self, input: Self::Input) -> Result<Self::Output, WorkError>;
}

/// Schema-enforcing wrapper turning a [`ToolWork`] into a [`Tool`].
pub struct ValidatedTool<W: ToolWork> {
    work: W,
}

impl<W: ToolWork> ValidatedTool<W> {
    pub fn new(work: W) -> Self {
        Self { work }
    }

    pub fn inner(&self) -> &W {
        &self.work
    }
}

#[async_trait]
impl<W: ToolWork> Tool for ValidatedTool<W> {
    fn kind(&self) -> ToolKind {
        self.work.kind()
    }

    fn description(&self) -> &str {
        self.work.description()
    }

    async fn execute(&self, input: Value) -> ToolResult<Value> {
        let kind = self.work.kind();

        let parsed: W::Input = serde_json::from_value(input)
            .map_err(|e| ToolError::validation(kind, ValidationStage::Input, e.to_string()))?;
        parsed
            .check()
            .map_err(|e| ToolError::validation(kind, ValidationStage::Input, e.to_string()))?;

        let output = self
            .work
            .run(parsed)
            .await
            .map_err(|e| ToolError::work(kind, e))?;

        output
            .check()
            .map_err(|e| ToolError::validation(kind, ValidationStage::Output, e.to_string()))?;
        let value = serde_json::to_value(&output)
            .map_err(|e| ToolError::validation(kind, ValidationStage::Output, e.to_string()))?;

        debug!(tool = %kind, "Tool output validated");
        Ok(value)
    }
}
