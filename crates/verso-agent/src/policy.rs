//! # Decision Policies
//!
//! A decision policy is a deterministic function of the current state that
//! picks the next tool call, or none to terminate. It never invokes tools
//! itself. The decision tree is evaluated in fixed priority order on every
//! call:
//!
//! 1. no draft and input present: generate
//! 2. draft present, no evaluation: evaluate
//! 3. evaluation says improvement is needed and the iteration budget allows
//!    it: increment `iterationCount`, improve, clear `userFeedback`
//! 4. otherwise terminate, stating whether quality was acceptable or the
//!    iteration budget ran out
//!
//! The lyrics and melody policies share this tree through
//! [`WorkflowPolicy`], parameterized over a small [`Workflow`] interface.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use verso_core::model::Evaluation;
use verso_core::{
    ConfigError, ExecutionTrace, StateKey, StateStore, Tool, ToolCall, ToolKind, ToolSet,
};

use crate::error::PolicyError;

/// Score at or above which a draft counts as acceptable.
///
/// The evaluation's `needsImprovement` flag drives the decision tree; the
/// threshold only selects the reasoning text when terminating.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QualityThreshold(f64);

impl QualityThreshold {
    pub const LYRICS: QualityThreshold = QualityThreshold(7.0);
    pub const MELODY: QualityThreshold = QualityThreshold(8.5);

    /// Build a custom threshold within `[0, 10]`.
    pub fn new(value: f64) -> Result<Self, ConfigError> {
        if !value.is_finite() || !(Evaluation::MIN_SCORE..=Evaluation::MAX_SCORE).contains(&value) {
            return Err(ConfigError::ValidationError(format!(
                "quality threshold must be within [0, 10], got {value}"
            )));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// Inclusive comparison.
    pub fn accepts(&self, score: f64) -> bool {
        score >= self.0
    }
}

/// Why a policy chose to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TerminationReason {
    QualityAcceptable,
    MaxIterationsReached,
    NoInput,
}

impl TerminationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminationReason::QualityAcceptable => "qualityAcceptable",
            TerminationReason::MaxIterationsReached => "maxIterationsReached",
            TerminationReason::NoInput => "noInput",
        }
    }
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub steps: Vec<String>,
    pub reasoning: String,
}

/// Result of acting on one intended tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub tool_id: ToolKind,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Observation {
    pub fn succeeded(tool_id: ToolKind, output: Value) -> Self {
        Self {
            tool_id,
            success: true,
            output: Some(output),
            error: None,
        }
    }

    pub fn failed(tool_id: ToolKind, error: impl Into<String>) -> Self {
        Self {
            tool_id,
            success: false,
            output: None,
            error: Some(error.into()),
        }
    }
}

/// One policy decision: exactly one action, or none with a termination
/// reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentOutput {
    pub plan: Plan,
    pub actions: Vec<ToolCall>,
    pub observations: Vec<Observation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub termination: Option<TerminationReason>,
}

impl AgentOutput {
    pub fn act(step: impl Into<String>, reasoning: impl Into<String>, call: ToolCall) -> Self {
        Self {
            plan: Plan {
                steps: vec![step.into()],
                reasoning: reasoning.into(),
            },
            actions: vec![call],
            observations: Vec::new(),
            termination: None,
        }
    }

    pub fn terminate(reason: TerminationReason, reasoning: impl Into<String>) -> Self {
        Self {
            plan: Plan {
                steps: Vec::new(),
                reasoning: reasoning.into(),
            },
            actions: Vec::new(),
            observations: Vec::new(),
            termination: Some(reason),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Coarse continuation check made after each step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reflection {
    pub should_continue: bool,
    pub reasoning: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub termination: Option<TerminationReason>,
}

impl Reflection {
    fn keep_going(reasoning: impl Into<String>) -> Self {
        Self {
            should_continue: true,
            reasoning: reasoning.into(),
            termination: None,
        }
    }
}

/// Decides the next step of a run from its current state.
pub trait DecisionPolicy: Send + Sync {
    /// Agent id recorded on trace events.
    fn id(&self) -> &str;

    /// Pick the next action. May write bookkeeping keys (brief, iteration
    /// counter, cleared feedback) but never invokes a tool.
    fn execute(
        &self,
        state: &mut StateStore,
        trace: &ExecutionTrace,
    ) -> Result<AgentOutput, PolicyError>;

    /// Decide whether the loop should keep going.
    fn reflect(&self, state: &StateStore) -> Reflection;

    /// Improvement budget consulted by `execute` and `reflect`.
    fn max_iterations(&self) -> u32;

    /// Replace the improvement budget. The orchestrator binds its
    /// guardrail's `max_iterations` here so the two can never disagree.
    fn set_max_iterations(&mut self, max_iterations: u32);

    /// Tool instance bound to this policy for `kind`.
    fn tool(&self, kind: ToolKind) -> Option<Arc<dyn Tool>>;

    /// Kinds of all bound tools.
    fn tool_kinds(&self) -> Vec<ToolKind>;
}

/// The workflow-specific steps plugged into [`WorkflowPolicy`].
pub trait Workflow: Send + Sync {
    fn name(&self) -> &'static str;

    /// Key holding the draft under refinement.
    fn draft_key(&self) -> StateKey;

    /// Build the generation call, or `None` when there is no input to
    /// generate from.
    fn generate(&self, state: &mut StateStore) -> Result<Option<ToolCall>, PolicyError>;

    fn evaluate(&self, state: &StateStore, draft: &Value) -> ToolCall;

    fn improve(&self, draft: &Value, evaluation: &Value, feedback: Option<&str>) -> ToolCall;
}

/// The shared generate / evaluate / improve decision tree.
pub struct WorkflowPolicy<W: Workflow> {
    id: String,
    workflow: W,
    tools: ToolSet,
    threshold: QualityThreshold,
    max_iterations: u32,
}

impl<W: Workflow> WorkflowPolicy<W> {
    pub fn new(workflow: W, tools: ToolSet, threshold: QualityThreshold, max_iterations: u32) -> Self {
        Self {
            id: format!("{}-agent", workflow.name()),
            workflow,
            tools,
            threshold,
            max_iterations,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn workflow(&self) -> &W {
        &self.workflow
    }

    pub fn threshold(&self) -> QualityThreshold {
        self.threshold
    }

    fn acceptance_reasoning(&self, score: f64) -> String {
        if self.threshold.accepts(score) {
            format!(
                "quality acceptable (score {score} >= threshold {})",
                self.threshold.value()
            )
        } else {
            format!(
                "quality acceptable per evaluator (score {score} below threshold {})",
                self.threshold.value()
            )
        }
    }

    fn exhausted_reasoning(&self, score: f64, iteration: u32) -> String {
        format!(
            "max iterations reached ({iteration}/{}) with score {score}",
            self.max_iterations
        )
    }

    /// Terminal decision for an evaluation the policy will not act on.
    fn settle(&self, evaluation: &Evaluation, iteration: u32) -> (TerminationReason, String) {
        if evaluation.needs_improvement {
            (
                TerminationReason::MaxIterationsReached,
                self.exhausted_reasoning(evaluation.score, iteration),
            )
        } else {
            (
                TerminationReason::QualityAcceptable,
                self.acceptance_reasoning(evaluation.score),
            )
        }
    }

    fn wants_improvement(&self, evaluation: &Evaluation, iteration: u32) -> bool {
        evaluation.needs_improvement && iteration < self.max_iterations
    }
}

impl<W: Workflow> DecisionPolicy for WorkflowPolicy<W> {
    fn id(&self) -> &str {
        &self.id
    }

    fn execute(
        &self,
        state: &mut StateStore,
        _trace: &ExecutionTrace,
    ) -> Result<AgentOutput, PolicyError> {
        let draft_key = self.workflow.draft_key();

        let Some(draft) = state.get(draft_key).cloned() else {
            return Ok(match self.workflow.generate(state)? {
                Some(call) => AgentOutput::act(
                    format!("generate {}", draft_key),
                    "initial generation needed",
                    call,
                ),
                None => AgentOutput::terminate(
                    TerminationReason::NoInput,
                    "no input to generate from",
                ),
            });
        };

        let Some(evaluation) = state.get_as::<Evaluation>(StateKey::Evaluation)? else {
            return Ok(AgentOutput::act(
                format!("evaluate {}", draft_key),
                "evaluation needed",
                self.workflow.evaluate(state, &draft),
            ));
        };

        let iteration = state.iteration_count()?;
        if self.wants_improvement(&evaluation, iteration) {
            let raw_evaluation = serde_json::to_value(&evaluation)?;
            let iteration = state.increment_iteration()?;
            let feedback = state
                .get(StateKey::UserFeedback)
                .and_then(Value::as_str)
                .map(str::to_string);
            let call = self
                .workflow
                .improve(&draft, &raw_evaluation, feedback.as_deref());
            state.clear_key(StateKey::UserFeedback);

            return Ok(AgentOutput::act(
                format!(
                    "improve {} (iteration {}/{})",
                    draft_key, iteration, self.max_iterations
                ),
                format!("score {} needs improvement", evaluation.score),
                call,
            ));
        }

        let (reason, reasoning) = self.settle(&evaluation, iteration);
        Ok(AgentOutput::terminate(reason, reasoning))
    }

    fn reflect(&self, state: &StateStore) -> Reflection {
        if !state.contains(self.workflow.draft_key()) {
            return Reflection::keep_going("initial generation needed");
        }
        let evaluation = match state.get_as::<Evaluation>(StateKey::Evaluation) {
            Ok(Some(evaluation)) => evaluation,
            Ok(None) => return Reflection::keep_going("evaluation needed"),
            Err(_) => return Reflection::keep_going("evaluation unreadable"),
        };
        // the next plan phase surfaces the error
        let Ok(iteration) = state.iteration_count() else {
            return Reflection::keep_going("iteration count unreadable");
        };
        if self.wants_improvement(&evaluation, iteration) {
            return Reflection::keep_going(format!(
                "improvement needed (iteration {}/{})",
                iteration, self.max_iterations
            ));
        }
        let (reason, reasoning) = self.settle(&evaluation, iteration);
        Reflection {
            should_continue: false,
            reasoning,
            termination: Some(reason),
        }
    }

    fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    fn set_max_iterations(&mut self, max_iterations: u32) {
        self.max_iterations = max_iterations;
    }

    fn tool(&self, kind: ToolKind) -> Option<Arc<dyn Tool>> {
        self.tools.get(kind)
    }

    fn tool_kinds(&self) -> Vec<ToolKind> {
        self.tools.kinds()
    }
}
