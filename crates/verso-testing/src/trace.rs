//! Structural checks over a run's trace.

use verso_core::{ToolKind, TraceEvent, TraceEventType};

/// Check that every `tool_call` start is immediately completed by a
/// `tool_call` for the same tool, in order.
pub fn check_tool_call_pairs(events: &[TraceEvent]) -> Result<usize, String> {
    let mut open: Option<(usize, ToolKind)> = None;
    let mut pairs = 0;

    for (index, event) in events.iter().enumerate() {
        if event.event_type != TraceEventType::ToolCall {
            continue;
        }
        let tool = event
            .tool_id
            .ok_or_else(|| format!("tool_call event {index} has no tool id"))?;

        match (event.metadata_str("status"), open) {
            (Some("start"), None) => open = Some((index, tool)),
            (Some("start"), Some((started, _))) => {
                return Err(format!("tool_call {index} starts before {started} completed"));
            }
            (Some("success" | "failure"), Some((_, started))) if started == tool => {
                open = None;
                pairs += 1;
            }
            (status, _) => {
                return Err(format!(
                    "tool_call {index} for '{tool}' has unexpected status {status:?}"
                ));
            }
        }
    }

    match open {
        Some((index, tool)) => Err(format!("tool_call {index} for '{tool}' never completed")),
        None => Ok(pairs),
    }
}

/// Event types in trace order.
pub fn event_types(events: &[TraceEvent]) -> Vec<TraceEventType> {
    events.iter().map(|event| event.event_type).collect()
}

/// Tools of the completed `tool_call` events, in call order.
pub fn tools_called(events: &[TraceEvent]) -> Vec<ToolKind> {
    events
        .iter()
        .filter(|event| {
            event.event_type == TraceEventType::ToolCall
                && event.metadata_str("status") == Some("start")
        })
        .filter_map(|event| event.tool_id)
        .collect()
}
