//! # Orchestrator
//!
//! The guarded plan / act / observe / reflect loop. One call to
//! [`Orchestrator::run`] is one run: it owns a fresh state store and trace,
//! executes strictly sequentially and always returns a [`RunResult`].
//!
//! Work is bounded by [`GuardrailConfig`]: at most `max_steps` plan phases
//! and at most `max_tool_calls` tool invocations (regenerations included).
//! Tool failures are absorbed as failed observations; only guardrail,
//! approval and configuration failures end a run early.

use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use verso_core::{
    ExecutionTrace, GuardrailConfig, StateKey, StateStore, Tool, ToolCall, ToolKind, ToolResult,
    TraceEvent, TraceEventType,
};

use crate::approval::{ApprovalDecision, ApprovalGate};
use crate::error::{ApprovalError, RunError};
use crate::policy::{DecisionPolicy, Observation, TerminationReason};
use crate::progress::{ProgressEvent, ProgressHook, ProgressPhase};
use crate::result::{RunResult, RunStats};

/// Counters and per-run state threaded through the loop.
struct RunContext {
    run_id: Uuid,
    steps_taken: u32,
    tool_calls_made: u32,
    state: StateStore,
    trace: ExecutionTrace,
}

impl RunContext {
    fn new(state: StateStore) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            steps_taken: 0,
            tool_calls_made: 0,
            state,
            trace: ExecutionTrace::new(),
        }
    }

    /// Counter for reporting. An unreadable counter fails the run in the
    /// policy, so it is reported as zero here.
    fn iteration(&self) -> u32 {
        self.state.iteration_count().unwrap_or_default()
    }

    fn stats(&self) -> RunStats {
        RunStats {
            steps_taken: self.steps_taken,
            tool_calls_made: self.tool_calls_made,
            iteration_count: self.iteration(),
        }
    }
}

/// Drives a [`DecisionPolicy`] until it terminates or a guardrail fires.
pub struct Orchestrator<P: DecisionPolicy> {
    policy: P,
    config: GuardrailConfig,
    allowed: HashSet<ToolKind>,
    gate: Option<Arc<dyn ApprovalGate>>,
    hook: Option<Arc<dyn ProgressHook>>,
}

impl<P: DecisionPolicy> Orchestrator<P> {
    /// Build an orchestrator. Calls to tools outside `allowed` never reach
    /// the tool. The policy's improvement budget is replaced by
    /// `config.max_iterations`.
    pub fn new(
        mut policy: P,
        config: GuardrailConfig,
        allowed: impl IntoIterator<Item = ToolKind>,
    ) -> Self {
        policy.set_max_iterations(config.max_iterations);
        Self {
            policy,
            config,
            allowed: allowed.into_iter().collect(),
            gate: None,
            hook: None,
        }
    }

    /// Review content-producing tool output before it is committed.
    pub fn with_approval_gate(mut self, gate: Arc<dyn ApprovalGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn with_progress_hook(mut self, hook: Arc<dyn ProgressHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn config(&self) -> &GuardrailConfig {
        &self.config
    }

    pub fn is_allowed(&self, tool: ToolKind) -> bool {
        self.allowed.contains(&tool)
    }

    /// Run once against a fresh state store.
    pub async fn run(&self, initial_input: Value) -> RunResult {
        self.run_with_state(initial_input, StateStore::new()).await
    }

    /// Run once against a caller-supplied store, e.g. to resume from an
    /// existing draft.
    pub async fn run_with_state(&self, initial_input: Value, state: StateStore) -> RunResult {
        let mut ctx = RunContext::new(state);
        ctx.state.set(StateKey::InitialInput, initial_input);

        info!(
            run_id = %ctx.run_id,
            agent = self.policy.id(),
            max_steps = self.config.max_steps,
            max_tool_calls = self.config.max_tool_calls,
            max_iterations = self.config.max_iterations,
            gated = self.gate.is_some(),
            "Run started"
        );

        match self.drive(&mut ctx).await {
            Ok(termination) => {
                let stats = ctx.stats();
                info!(
                    run_id = %ctx.run_id,
                    termination = ?termination,
                    steps = stats.steps_taken,
                    tool_calls = stats.tool_calls_made,
                    iterations = stats.iteration_count,
                    "Run completed"
                );
                self.notify(ProgressEvent::new(
                    ProgressPhase::Complete,
                    match termination {
                        Some(reason) => format!("run complete: {reason}"),
                        None => "run complete".to_string(),
                    },
                ));
                RunResult::succeeded(
                    ctx.run_id,
                    termination,
                    ctx.state.get_all(),
                    ctx.trace.into_events(),
                    stats,
                )
            }
            Err(error) => {
                ctx.trace.add(
                    TraceEvent::new(TraceEventType::AgentStep)
                        .with_agent(self.policy.id())
                        .with_error(error.to_string())
                        .with_metadata(json!({
                            "status": "failed",
                            "errorCode": error.error_code(),
                            "step": ctx.steps_taken,
                        })),
                );
                let stats = ctx.stats();
                warn!(
                    run_id = %ctx.run_id,
                    error = %error,
                    error_code = error.error_code(),
                    steps = stats.steps_taken,
                    tool_calls = stats.tool_calls_made,
                    "Run failed"
                );
                self.notify(ProgressEvent::new(ProgressPhase::Error, error.to_string()));
                RunResult::failed(
                    ctx.run_id,
                    error,
                    ctx.state.get_all(),
                    ctx.trace.into_events(),
                    stats,
                )
            }
        }
    }

    async fn drive(&self, ctx: &mut RunContext) -> Result<Option<TerminationReason>, RunError> {
        let agent = self.policy.id();

        while ctx.steps_taken < self.config.max_steps {
            ctx.steps_taken += 1;
            let step = ctx.steps_taken;

            self.notify(
                ProgressEvent::new(ProgressPhase::Planning, format!("planning step {step}"))
                    .with_iteration(ctx.iteration()),
            );
            let output = self.policy.execute(&mut ctx.state, &ctx.trace)?;
            ctx.trace.add(
                TraceEvent::new(TraceEventType::Plan)
                    .with_agent(agent)
                    .with_output(json!({
                        "steps": output.plan.steps,
                        "reasoning": output.plan.reasoning,
                    }))
                    .with_metadata(json!({ "step": step, "actions": output.actions.len() })),
            );
            debug!(
                run_id = %ctx.run_id,
                step,
                actions = output.actions.len(),
                reasoning = %output.plan.reasoning,
                "Policy decision"
            );

            if output.is_terminal() {
                ctx.trace.add(
                    TraceEvent::new(TraceEventType::AgentStep)
                        .with_agent(agent)
                        .with_output(json!({
                            "reasoning": output.plan.reasoning,
                            "termination": output.termination,
                        }))
                        .with_metadata(json!({ "status": "terminated", "step": step })),
                );
                return Ok(output.termination);
            }

            let mut observations = Vec::with_capacity(output.actions.len());
            for action in output.actions {
                observations.push(self.act(ctx, action).await?);
            }

            self.notify(ProgressEvent::new(
                ProgressPhase::Observing,
                format!("observing {} action(s)", observations.len()),
            ));
            for observation in observations {
                self.observe(ctx, observation);
            }

            self.notify(
                ProgressEvent::new(ProgressPhase::Reflecting, "reflecting")
                    .with_iteration(ctx.iteration()),
            );
            let reflection = self.policy.reflect(&ctx.state);
            ctx.trace.add(
                TraceEvent::new(TraceEventType::Reflect)
                    .with_agent(agent)
                    .with_output(json!({
                        "shouldContinue": reflection.should_continue,
                        "reasoning": reflection.reasoning,
                    }))
                    .with_metadata(json!({ "step": step })),
            );
            debug!(
                run_id = %ctx.run_id,
                step,
                should_continue = reflection.should_continue,
                reasoning = %reflection.reasoning,
                "Reflection"
            );

            if !reflection.should_continue {
                return Ok(reflection.termination);
            }
        }

        Err(RunError::MaxStepsExceeded {
            limit: self.config.max_steps,
        })
    }

    /// Execute one intended tool call and commit its output.
    async fn act(&self, ctx: &mut RunContext, action: ToolCall) -> Result<Observation, RunError> {
        let kind = action.tool_id;
        self.check_tool_budget(ctx)?;

        if !self.is_allowed(kind) {
            warn!(run_id = %ctx.run_id, tool = %kind, "Tool is not in the allow-list");
            let message = format!("tool '{kind}' is not allowed");
            ctx.trace.add(
                TraceEvent::new(TraceEventType::Act)
                    .with_agent(self.policy.id())
                    .with_tool(kind)
                    .with_error(message.clone()),
            );
            return Ok(Observation::failed(kind, message));
        }

        let tool = self
            .policy
            .tool(kind)
            .ok_or(RunError::ToolNotFound(kind))?;

        self.notify(ProgressEvent::new(ProgressPhase::Acting, format!("acting: {kind}")).with_tool(kind));
        ctx.trace.add(
            TraceEvent::new(TraceEventType::Act)
                .with_agent(self.policy.id())
                .with_tool(kind)
                .with_input(action.input.clone()),
        );

        let output = match self.invoke(ctx, &tool, action.input.clone()).await {
            Ok(output) => output,
            Err(error) => return Ok(Observation::failed(kind, error.to_string())),
        };

        let output = match self.review(ctx, &tool, &action.input, output).await? {
            Ok(output) => output,
            Err(error) => return Ok(Observation::failed(kind, error.to_string())),
        };

        ctx.state.set(kind.state_key(), output.clone());
        if let Some(stale) = kind.clears_on_commit() {
            ctx.state.clear_key(stale);
        }
        Ok(Observation::succeeded(kind, output))
    }

    /// One tool invocation, bracketed by start and completion trace events.
    async fn invoke(
        &self,
        ctx: &mut RunContext,
        tool: &Arc<dyn Tool>,
        input: Value,
    ) -> ToolResult<Value> {
        let kind = tool.kind();
        ctx.tool_calls_made += 1;
        let call = ctx.tool_calls_made;

        self.notify(
            ProgressEvent::new(ProgressPhase::ToolCall, format!("calling {kind} (call {call})"))
                .with_tool(kind),
        );
        ctx.trace.add(
            TraceEvent::new(TraceEventType::ToolCall)
                .with_agent(self.policy.id())
                .with_tool(kind)
                .with_input(input.clone())
                .with_metadata(json!({ "status": "start", "call": call })),
        );
        debug!(run_id = %ctx.run_id, tool = %kind, call, "Tool call started");

        let result = tool.execute(input).await;

        let event = TraceEvent::new(TraceEventType::ToolCall)
            .with_agent(self.policy.id())
            .with_tool(kind);
        match &result {
            Ok(output) => {
                debug!(run_id = %ctx.run_id, tool = %kind, call, "Tool call succeeded");
                ctx.trace.add(
                    event
                        .with_output(output.clone())
                        .with_metadata(json!({ "status": "success", "call": call })),
                );
            }
            Err(error) => {
                warn!(run_id = %ctx.run_id, tool = %kind, call, error = %error, "Tool call failed");
                ctx.trace.add(
                    event
                        .with_error(error.to_string())
                        .with_metadata(json!({ "status": "failure", "call": call })),
                );
            }
        }
        result
    }

    /// Apply the approval gate to a successful content-producing call.
    ///
    /// The outer error ends the run; the inner one is a failed
    /// regeneration, absorbed like any other tool failure.
    async fn review(
        &self,
        ctx: &mut RunContext,
        tool: &Arc<dyn Tool>,
        input: &Value,
        output: Value,
    ) -> Result<ToolResult<Value>, RunError> {
        let kind = tool.kind();
        let Some(gate) = self.gate.as_ref().filter(|_| kind.requires_approval()) else {
            return Ok(Ok(output));
        };

        self.notify(
            ProgressEvent::new(
                ProgressPhase::AwaitingApproval,
                format!("awaiting approval for {kind}"),
            )
            .with_tool(kind),
        );
        let event = TraceEvent::new(TraceEventType::Act)
            .with_agent(self.policy.id())
            .with_tool(kind);

        let response = match gate.review(kind, &output).await {
            Ok(response) => response,
            Err(error) => {
                ctx.trace.add(
                    event
                        .with_error(error.to_string())
                        .with_metadata(json!({ "phase": "approval" })),
                );
                return Err(match error {
                    ApprovalError::TimedOut { .. } => RunError::ApprovalTimedOut { tool: kind },
                    source => RunError::ApprovalFailed { tool: kind, source },
                });
            }
        };

        let feedback = response.feedback().map(str::to_string);
        ctx.trace.add(event.with_metadata(json!({
            "phase": "approval",
            "decision": response.decision,
            "feedback": feedback,
        })));
        info!(run_id = %ctx.run_id, tool = %kind, decision = %response.decision, "Approval decision");

        match response.decision {
            ApprovalDecision::Approve => Ok(Ok(output)),
            ApprovalDecision::Reject => Err(RunError::ApprovalRejected {
                tool: kind,
                feedback,
            }),
            ApprovalDecision::Regenerate => {
                self.check_tool_budget(ctx)?;
                let input = match &feedback {
                    Some(feedback) => {
                        ctx.state.set(StateKey::UserFeedback, feedback.as_str());
                        kind.merge_feedback(input, feedback)
                    }
                    None => input.clone(),
                };
                Ok(self.invoke(ctx, tool, input).await)
            }
        }
    }

    /// Record the observation, re-derived from the committed state.
    fn observe(&self, ctx: &mut RunContext, observation: Observation) {
        let kind = observation.tool_id;
        let committed = ctx.state.get(kind.state_key()).cloned();
        let success = observation.success && committed.is_some();

        let mut event = TraceEvent::new(TraceEventType::Observe)
            .with_agent(self.policy.id())
            .with_tool(kind)
            .with_metadata(json!({ "success": success }));
        if let Some(value) = committed.filter(|_| success) {
            event = event.with_output(value);
        }
        if let Some(error) = observation.error {
            event = event.with_error(error);
        }
        ctx.trace.add(event);
    }

    fn check_tool_budget(&self, ctx: &RunContext) -> Result<(), RunError> {
        if ctx.tool_calls_made >= self.config.max_tool_calls {
            return Err(RunError::MaxToolCallsExceeded {
                limit: self.config.max_tool_calls,
            });
        }
        Ok(())
    }

    fn notify(&self, event: ProgressEvent) {
        if let Some(hook) = &self.hook
            && let Err(error) = hook.notify(&event)
        {
            warn!(phase = %event.phase, error = %error, "Progress hook failed, continuing");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::ApprovalResponse;
    use crate::lyrics::LyricsPolicy;
    use crate::progress::ProgressError;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use verso_core::{ToolError, ToolSet, WorkError};

    type Script = Box<dyn Fn(u32, &Value) -> ToolResult<Value> + Send + Sync>;

    /// Tool whose output is a function of its call number and input.
    struct FakeTool {
        kind: ToolKind,
        calls: AtomicU32,
        inputs: Mutex<Vec<Value>>,
        script: Script,
    }

    impl FakeTool {
        fn new(
            kind: ToolKind,
            script: impl Fn(u32, &Value) -> ToolResult<Value> + Send + Sync + 'static,
        ) -> Arc<Self> {
            Arc::new(Self {
                kind,
                calls: AtomicU32::new(0),
                inputs: Mutex::new(Vec::new()),
                script: Box::new(script),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Tool for FakeTool {
        fn kind(&self) -> ToolKind {
            self.kind
        }

        async fn execute(&self, input: Value) -> ToolResult<Value> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.inputs.lock().unwrap().push(input.clone());
            (self.script)(call, &input)
        }
    }

    struct Lyrics {
        generate: Arc<FakeTool>,
        evaluate: Arc<FakeTool>,
        improve: Arc<FakeTool>,
    }

    impl Lyrics {
        fn new() -> Self {
            Self {
                generate: FakeTool::new(ToolKind::GenerateSongStructure, |call, _| {
                    Ok(json!({ "title": format!("draft {call}"), "revision": 0 }))
                }),
                evaluate: FakeTool::new(ToolKind::EvaluateLyrics, |call, _| {
                    let (score, needs) = if call == 1 { (6.0, true) } else { (7.5, false) };
                    Ok(json!({
                        "score": score,
                        "strengths": [],
                        "weaknesses": [],
                        "suggestions": [],
                        "needsImprovement": needs,
                    }))
                }),
                improve: FakeTool::new(ToolKind::ImproveLyrics, |_, _| {
                    Ok(json!({ "title": "improved", "revision": 1 }))
                }),
            }
        }

        fn policy(&self, max_iterations: u32) -> LyricsPolicy {
            let tools = ToolSet::new()
                .with_tool(self.generate.clone())
                .with_tool(self.evaluate.clone())
                .with_tool(self.improve.clone());
            LyricsPolicy::lyrics(tools, max_iterations)
        }

        fn orchestrator(&self, max_steps: u32, max_tool_calls: u32) -> Orchestrator<LyricsPolicy> {
            Orchestrator::new(
                self.policy(3),
                GuardrailConfig::new(max_steps, max_tool_calls, 3).unwrap(),
                [
                    ToolKind::GenerateSongStructure,
                    ToolKind::EvaluateLyrics,
                    ToolKind::ImproveLyrics,
                ],
            )
        }
    }

    fn input() -> Value {
        json!({ "lyrics": "text", "emotion": "sad" })
    }

    struct ScriptedGate {
        responses: Mutex<Vec<Result<ApprovalResponse, ApprovalError>>>,
        rounds: AtomicU32,
    }

    impl ScriptedGate {
        fn new(responses: Vec<Result<ApprovalResponse, ApprovalError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses),
                rounds: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl ApprovalGate for ScriptedGate {
        async fn review(
            &self,
            _tool: ToolKind,
            _output: &Value,
        ) -> Result<ApprovalResponse, ApprovalError> {
            self.rounds.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Ok(ApprovalResponse::approve())
            } else {
                responses.remove(0)
            }
        }
    }

    #[tokio::test]
    async fn test_improvement_cycle_runs_to_acceptance() {
        let lyrics = Lyrics::new();
        let result = lyrics.orchestrator(12, 12).run(input()).await;

        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.termination, Some(TerminationReason::QualityAcceptable));
        assert_eq!(result.stats.tool_calls_made, 4);
        assert_eq!(result.stats.iteration_count, 1);
        assert_eq!(lyrics.generate.calls(), 1);
        assert_eq!(lyrics.evaluate.calls(), 2);
        assert_eq!(lyrics.improve.calls(), 1);

        assert_eq!(
            result.state.artifact(StateKey::SongStructure),
            Some(&json!({ "title": "improved", "revision": 1 }))
        );
        assert_eq!(result.state.artifact(StateKey::Evaluation).unwrap()["score"], json!(7.5));
        assert_eq!(result.events_of(TraceEventType::ToolCall).count(), 8);
    }

    #[tokio::test]
    async fn test_tool_call_budget_is_a_guardrail() {
        let lyrics = Lyrics::new();
        let result = lyrics.orchestrator(12, 1).run(input()).await;

        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("max tool calls"));
        assert_eq!(result.error_code.as_deref(), Some("MAX_TOOL_CALLS_EXCEEDED"));
        assert_eq!(lyrics.evaluate.calls(), 0);
        assert!(result.state.artifact(StateKey::SongStructure).is_some());

        let last = result.final_event().unwrap();
        assert_eq!(last.event_type, TraceEventType::AgentStep);
        assert_eq!(last.metadata_str("errorCode"), Some("MAX_TOOL_CALLS_EXCEEDED"));
    }

    #[tokio::test]
    async fn test_step_budget_is_a_guardrail() {
        let lyrics = Lyrics::new();
        let result = lyrics.orchestrator(2, 12).run(input()).await;

        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("max steps exceeded"));
        assert_eq!(result.stats.steps_taken, 2);
        assert_eq!(result.events_of(TraceEventType::Plan).count(), 2);
    }

    #[tokio::test]
    async fn test_disallowed_tool_is_never_called() {
        let lyrics = Lyrics::new();
        let orchestrator = Orchestrator::new(
            lyrics.policy(3),
            GuardrailConfig::new(3, 12, 3).unwrap(),
            [ToolKind::EvaluateLyrics],
        );
        let result = orchestrator.run(input()).await;

        assert!(!result.success);
        assert_eq!(lyrics.generate.calls(), 0);
        assert_eq!(result.stats.tool_calls_made, 0);
        let observed: Vec<_> = result.events_of(TraceEventType::Observe).collect();
        assert_eq!(observed.len(), 3);
        assert!(observed.iter().all(|e| e.error.as_deref().unwrap().contains("not allowed")));
    }

    #[tokio::test]
    async fn test_tool_failure_is_absorbed_until_budget() {
        let lyrics = Lyrics {
            generate: FakeTool::new(ToolKind::GenerateSongStructure, |_, _| {
                Err(ToolError::work(
                    ToolKind::GenerateSongStructure,
                    WorkError::Upstream("model returned 503".to_string()),
                ))
            }),
            ..Lyrics::new()
        };
        let result = lyrics.orchestrator(4, 12).run(input()).await;

        assert!(!result.success);
        assert_eq!(result.failure().map(RunError::error_code), Some("MAX_STEPS_EXCEEDED"));
        assert_eq!(lyrics.generate.calls(), 4);
        assert_eq!(result.stats.tool_calls_made, 4);
        assert!(
            result
                .events_of(TraceEventType::ToolCall)
                .any(|e| e.metadata_str("status") == Some("failure"))
        );
    }

    #[tokio::test]
    async fn test_guardrail_iteration_budget_overrides_policy() {
        let lyrics = Lyrics {
            evaluate: FakeTool::new(ToolKind::EvaluateLyrics, |_, _| {
                Ok(json!({ "score": 4.0, "needsImprovement": true }))
            }),
            ..Lyrics::new()
        };
        let orchestrator = Orchestrator::new(
            lyrics.policy(3),
            GuardrailConfig::new(20, 20, 1).unwrap(),
            [
                ToolKind::GenerateSongStructure,
                ToolKind::EvaluateLyrics,
                ToolKind::ImproveLyrics,
            ],
        );
        assert_eq!(orchestrator.policy().max_iterations(), 1);

        let result = orchestrator.run(input()).await;

        assert!(result.success);
        assert_eq!(result.termination, Some(TerminationReason::MaxIterationsReached));
        assert_eq!(result.stats.iteration_count, 1);
        assert_eq!(lyrics.improve.calls(), 1);
    }

    #[tokio::test]
    async fn test_missing_tool_ends_run() {
        let orchestrator = Orchestrator::new(
            LyricsPolicy::lyrics(ToolSet::new(), 3),
            GuardrailConfig::new(5, 5, 3).unwrap(),
            ToolKind::all().iter().copied(),
        );
        let result = orchestrator.run(input()).await;

        assert!(!result.success);
        assert!(matches!(
            result.failure(),
            Some(RunError::ToolNotFound(ToolKind::GenerateSongStructure))
        ));
    }

    #[tokio::test]
    async fn test_no_input_terminates_successfully() {
        let lyrics = Lyrics::new();
        let result = lyrics
            .orchestrator(5, 5)
            .run(json!({ "lyrics": "", "emotion": "sad" }))
            .await;

        assert!(result.success);
        assert_eq!(result.termination, Some(TerminationReason::NoInput));
        assert_eq!(result.stats.tool_calls_made, 0);
    }

    #[tokio::test]
    async fn test_rejection_never_commits_output() {
        let lyrics = Lyrics::new();
        let gate = ScriptedGate::new(vec![Ok(ApprovalResponse::reject())]);
        let result = lyrics
            .orchestrator(12, 12)
            .with_approval_gate(gate.clone())
            .run(input())
            .await;

        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("rejected"));
        assert!(result.state.artifact(StateKey::SongStructure).is_none());
        assert_eq!(gate.rounds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_regenerate_merges_feedback_and_skips_second_review() {
        let lyrics = Lyrics::new();
        let gate = ScriptedGate::new(vec![Ok(ApprovalResponse::regenerate("shorter chorus"))]);
        let result = lyrics
            .orchestrator(12, 12)
            .with_approval_gate(gate.clone())
            .run(input())
            .await;

        assert!(result.success, "{:?}", result.error);
        assert_eq!(lyrics.generate.calls(), 2);
        let inputs = lyrics.generate.inputs.lock().unwrap().clone();
        assert!(inputs[0].get("userFeedback").is_none());
        assert_eq!(inputs[1]["userFeedback"], json!("shorter chorus"));

        // the pending feedback reaches the next improvement, then is cleared
        let improve_inputs = lyrics.improve.inputs.lock().unwrap().clone();
        assert_eq!(improve_inputs[0]["userFeedback"], json!("shorter chorus"));
        assert!(result.state.artifact(StateKey::UserFeedback).is_none());

        // generate (regenerated, one round) and improve (one round)
        assert_eq!(gate.rounds.load(Ordering::SeqCst), 2);
        assert_eq!(result.stats.tool_calls_made, 5);
    }

    #[tokio::test]
    async fn test_regeneration_respects_tool_call_budget() {
        let lyrics = Lyrics::new();
        let gate = ScriptedGate::new(vec![Ok(ApprovalResponse::regenerate("again"))]);
        let result = lyrics
            .orchestrator(12, 1)
            .with_approval_gate(gate)
            .run(input())
            .await;

        assert!(!result.success);
        assert_eq!(lyrics.generate.calls(), 1);
        assert!(result.failure().is_some_and(RunError::is_guardrail));
    }

    #[tokio::test]
    async fn test_gate_timeout_is_a_rejection() {
        let lyrics = Lyrics::new();
        let id = crate::approval::ApprovalId::new();
        let gate = ScriptedGate::new(vec![Err(ApprovalError::TimedOut {
            id,
            timeout: std::time::Duration::from_millis(1),
        })]);
        let result = lyrics
            .orchestrator(12, 12)
            .with_approval_gate(gate)
            .run(input())
            .await;

        assert!(!result.success);
        assert_eq!(result.error_code.as_deref(), Some("APPROVAL_TIMED_OUT"));
        assert!(result.state.artifact(StateKey::SongStructure).is_none());
    }

    #[tokio::test]
    async fn test_failing_progress_hook_does_not_abort() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let hook = move |event: &ProgressEvent| {
            sink.lock().unwrap().push(event.phase);
            Err(ProgressError("listener gone".to_string()))
        };

        let lyrics = Lyrics::new();
        let result = lyrics
            .orchestrator(12, 12)
            .with_progress_hook(Arc::new(hook))
            .run(input())
            .await;

        assert!(result.success);
        let phases = seen.lock().unwrap().clone();
        assert_eq!(phases.first(), Some(&ProgressPhase::Planning));
        assert_eq!(phases.last(), Some(&ProgressPhase::Complete));
        assert!(phases.contains(&ProgressPhase::ToolCall));
    }

    #[tokio::test]
    async fn test_resume_with_existing_draft_skips_generation() {
        let lyrics = Lyrics::new();
        let mut state = StateStore::new();
        state.set(StateKey::SongStructure, json!({ "title": "kept" }));

        let result = lyrics.orchestrator(12, 12).run_with_state(input(), state).await;

        assert!(result.success);
        assert_eq!(lyrics.generate.calls(), 0);
        assert_eq!(lyrics.evaluate.calls(), 2);
    }

    #[tokio::test]
    async fn test_resume_with_unreadable_iteration_count_fails() {
        let lyrics = Lyrics::new();
        let mut state = StateStore::new();
        state.set(StateKey::SongStructure, json!({ "title": "kept" }));
        state.set(
            StateKey::Evaluation,
            json!({ "score": 5.0, "needsImprovement": true }),
        );
        state.set(StateKey::IterationCount, "many");

        let result = lyrics.orchestrator(12, 12).run_with_state(input(), state).await;

        assert!(!result.success);
        assert_eq!(result.failure().map(RunError::error_code), Some("POLICY_ERROR"));
        assert_eq!(lyrics.improve.calls(), 0);
    }
}
