//! # Mock Tools for Testing
//!
//! Tools with scripted responses and call tracking, plus a recorder that
//! instruments a real [`ToolSet`] without changing its behavior.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use verso_core::model::Evaluation;
use verso_core::{Tool, ToolError, ToolKind, ToolResult, ToolSet, WorkError};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A tool that answers from a queue of scripted responses.
///
/// Once the queue is drained the default response is returned; without one
/// the tool echoes its input.
#[derive(Debug, Clone)]
pub struct MockTool {
    kind: ToolKind,
    responses: Arc<Mutex<VecDeque<ToolResult<Value>>>>,
    default_response: Option<ToolResult<Value>>,
    call_history: Arc<Mutex<Vec<Value>>>,
}

impl MockTool {
    pub fn new(kind: ToolKind) -> Self {
        Self {
            kind,
            responses: Arc::new(Mutex::new(VecDeque::new())),
            default_response: None,
            call_history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Evaluator returning `(score, needsImprovement)` pairs in order, then
    /// repeating the last one.
    pub fn evaluator(kind: ToolKind, scores: impl IntoIterator<Item = (f64, bool)>) -> Self {
        let mut tool = Self::new(kind);
        for (score, needs) in scores {
            tool = tool.with_response(evaluation(score, needs));
        }
        let last = lock(&tool.responses).back().cloned();
        tool.default_response = last;
        tool
    }

    /// Queue a successful response.
    pub fn with_response(self, output: Value) -> Self {
        lock(&self.responses).push_back(Ok(output));
        self
    }

    /// Queue a work failure.
    pub fn with_failure(self, error: impl Into<String>) -> Self {
        let failure = ToolError::work(self.kind, WorkError::Upstream(error.into()));
        lock(&self.responses).push_back(Err(failure));
        self
    }

    pub fn with_default_response(mut self, output: Value) -> Self {
        self.default_response = Some(Ok(output));
        self
    }

    pub fn with_default_failure(mut self, error: impl Into<String>) -> Self {
        self.default_response = Some(Err(ToolError::work(
            self.kind,
            WorkError::Upstream(error.into()),
        )));
        self
    }

    pub fn call_count(&self) -> usize {
        lock(&self.call_history).len()
    }

    /// Inputs received so far, in call order.
    pub fn call_history(&self) -> Vec<Value> {
        lock(&self.call_history).clone()
    }

    pub fn last_input(&self) -> Option<Value> {
        lock(&self.call_history).last().cloned()
    }

    pub fn reset(&self) {
        lock(&self.call_history).clear();
    }
}

#[async_trait]
impl Tool for MockTool {
    fn kind(&self) -> ToolKind {
        self.kind
    }

    fn description(&self) -> &str {
        "scripted mock tool"
    }

    async fn execute(&self, input: Value) -> ToolResult<Value> {
        lock(&self.call_history).push(input.clone());
        let scripted = lock(&self.responses).pop_front();
        match (scripted, &self.default_response) {
            (Some(response), _) => response,
            (None, Some(default)) => default.clone(),
            (None, None) => Ok(input),
        }
    }
}

/// Evaluation output as a tool would emit it.
pub fn evaluation(score: f64, needs_improvement: bool) -> Value {
    serde_json::to_value(Evaluation::new(score, needs_improvement))
        .unwrap_or_else(|_| json!({ "score": score, "needsImprovement": needs_improvement }))
}

/// Delegating tool that records every input and result.
pub struct RecordingTool {
    inner: Arc<dyn Tool>,
    calls: Mutex<Vec<(Value, Result<Value, String>)>>,
}

impl RecordingTool {
    pub fn new(inner: Arc<dyn Tool>) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    pub fn inputs(&self) -> Vec<Value> {
        lock(&self.calls).iter().map(|(input, _)| input.clone()).collect()
    }

    /// Successful outputs, in call order.
    pub fn outputs(&self) -> Vec<Value> {
        lock(&self.calls)
            .iter()
            .filter_map(|(_, result)| result.as_ref().ok().cloned())
            .collect()
    }
}

#[async_trait]
impl Tool for RecordingTool {
    fn kind(&self) -> ToolKind {
        self.inner.kind()
    }

    fn description(&self) -> &str {
        self.inner.description()
    }

    async fn execute(&self, input: Value) -> ToolResult<Value> {
        let result = self.inner.execute(input.clone()).await;
        let recorded = match &result {
            Ok(output) => Ok(output.clone()),
            Err(error) => Err(error.to_string()),
        };
        lock(&self.calls).push((input, recorded));
        result
    }
}

/// Handles to the recording wrappers of an instrumented [`ToolSet`].
#[derive(Default)]
pub struct ToolRecorder {
    tools: HashMap<ToolKind, Arc<RecordingTool>>,
}

impl ToolRecorder {
    /// Wrap every tool in `tools`, returning the instrumented set.
    pub fn instrument(tools: &ToolSet) -> (ToolSet, Self) {
        let mut recorder = Self::default();
        let mut instrumented = ToolSet::new();
        for kind in tools.kinds() {
            if let Some(tool) = tools.get(kind) {
                let recording = Arc::new(RecordingTool::new(tool));
                instrumented.insert(recording.clone());
                recorder.tools.insert(kind, recording);
            }
        }
        (instrumented, recorder)
    }

    pub fn tool(&self, kind: ToolKind) -> Option<&RecordingTool> {
        self.tools.get(&kind).map(Arc::as_ref)
    }

    pub fn calls(&self, kind: ToolKind) -> usize {
        self.tool(kind).map_or(0, RecordingTool::call_count)
    }

    pub fn inputs(&self, kind: ToolKind) -> Vec<Value> {
        self.tool(kind).map(RecordingTool::inputs).unwrap_or_default()
    }

    pub fn total_calls(&self) -> usize {
        self.tools.values().map(|tool| tool.call_count()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_tool_drains_queue_then_defaults() {
        let tool = MockTool::new(ToolKind::GenerateMelody)
            .with_response(json!({"n": 1}))
            .with_failure("model down")
            .with_default_response(json!({"n": 0}));

        assert_eq!(tool.execute(json!("a")).await.unwrap(), json!({"n": 1}));
        assert!(tool.execute(json!("b")).await.is_err());
        assert_eq!(tool.execute(json!("c")).await.unwrap(), json!({"n": 0}));
        assert_eq!(tool.call_count(), 3);
        assert_eq!(tool.last_input(), Some(json!("c")));
    }

    #[tokio::test]
    async fn test_evaluator_repeats_last_score() {
        let tool = MockTool::evaluator(ToolKind::EvaluateLyrics, [(6.0, true), (7.5, false)]);

        let scores: Vec<Value> = [
            tool.execute(json!({})).await.unwrap(),
            tool.execute(json!({})).await.unwrap(),
            tool.execute(json!({})).await.unwrap(),
        ]
        .into_iter()
        .map(|v| v["score"].clone())
        .collect();
        assert_eq!(scores, vec![json!(6.0), json!(7.5), json!(7.5)]);
    }

    #[tokio::test]
    async fn test_recorder_tracks_wrapped_calls() {
        let tools = ToolSet::new()
            .with_tool(Arc::new(MockTool::new(ToolKind::ImproveLyrics)))
            .with_tool(Arc::new(
                MockTool::new(ToolKind::EvaluateLyrics).with_default_failure("no"),
            ));
        let (instrumented, recorder) = ToolRecorder::instrument(&tools);

        let improve = instrumented.get(ToolKind::ImproveLyrics).unwrap();
        improve.execute(json!({"x": 1})).await.unwrap();
        let evaluate = instrumented.get(ToolKind::EvaluateLyrics).unwrap();
        assert!(evaluate.execute(json!({})).await.is_err());

        assert_eq!(recorder.calls(ToolKind::ImproveLyrics), 1);
        assert_eq!(recorder.inputs(ToolKind::ImproveLyrics), vec![json!({"x": 1})]);
        assert_eq!(recorder.total_calls(), 2);
        assert!(recorder.tool(ToolKind::EvaluateLyrics).unwrap().outputs().is_empty());
        assert_eq!(recorder.calls(ToolKind::GenerateMelody), 0);
    }
}
