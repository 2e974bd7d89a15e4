//! # Execution Trace
//!
//! Append-only, ordered record of every loop phase and tool call in a run.
//! Insertion order is the only ordering; timestamps are informational.
//! One trace belongs to exactly one run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::tool::ToolKind;

/// Kind of trace event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceEventType {
    Plan,
    Act,
    Observe,
    Reflect,
    ToolCall,
    AgentStep,
}

impl TraceEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TraceEventType::Plan => "plan",
            TraceEventType::Act => "act",
            TraceEventType::Observe => "observe",
            TraceEventType::Reflect => "reflect",
            TraceEventType::ToolCall => "tool_call",
            TraceEventType::AgentStep => "agent_step",
        }
    }
}

impl std::fmt::Display for TraceEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable record of one phase or tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub event_type: TraceEventType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_id: Option<ToolKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl TraceEvent {
    pub fn new(event_type: TraceEventType) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event_type,
            agent_id: None,
            tool_id: None,
            input: None,
            output: None,
            error: None,
            metadata: None,
        }
    }

    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn with_tool(mut self, tool: ToolKind) -> Self {
        self.tool_id = Some(tool);
        self
    }

    pub fn with_input(mut self, input: Value) -> Self {
        self.input = Some(input);
        self
    }

    pub fn with_output(mut self, output: Value) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Read a string field from the metadata object, if any.
    pub fn metadata_str(&self, field: &str) -> Option<&str> {
        self.metadata.as_ref()?.get(field)?.as_str()
    }
}

/// Append-only event log for a single run.
#[derive(Debug, Clone, Default)]
pub struct ExecutionTrace {
    events: Vec<TraceEvent>,
}

impl ExecutionTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, event: TraceEvent) {
        self.events.push(event);
    }

    /// Defensive copy in insertion order.
    pub fn get_all(&self) -> Vec<TraceEvent> {
        self.events.clone()
    }

    pub fn get_by_type(&self, event_type: TraceEventType) -> Vec<TraceEvent> {
        self.events
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }

    pub fn last(&self) -> Option<&TraceEvent> {
        self.events.last()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Consume the trace, yielding the events in insertion order.
    pub fn into_events(self) -> Vec<TraceEvent> {
        self.events
    }
}
