use std::collections::HashMap;
use std::sync::Arc;

use crate::tool::{Tool, ToolKind};

/// Tool instances bound to a decision policy, keyed by their kind.
///
/// A policy resolves the tool for each intended action through its
/// `ToolSet`; a kind with no registered instance is a configuration error
/// surfaced by the orchestrator.
///
/// # Example
///
/// ```rust
/// use verso_core::{ToolSet, ToolKind};
///
/// let tools = ToolSet::new();
/// assert!(tools.get(ToolKind::EvaluateLyrics).is_none());
/// ```
#[derive(Clone, Default)]
pub struct ToolSet {
    tools: HashMap<ToolKind, Arc<dyn Tool>>,
}

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its own kind, replacing any previous instance.
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.insert(tool);
        self
    }

    pub fn insert(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.kind(), tool);
    }

    pub fn get(&self, kind: ToolKind) -> Option<Arc<dyn Tool>> {
        self.tools.get(&kind).cloned()
    }

    pub fn contains(&self, kind: ToolKind) -> bool {
        self.tools.contains_key(&kind)
    }

    /// Registered kinds in declaration order.
    pub fn kinds(&self) -> Vec<ToolKind> {
        let mut kinds: Vec<ToolKind> = self.tools.keys().copied().collect();
        kinds.sort();
        kinds
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSet")
            .field("kinds", &self.kinds())
            .finish()
    }
}
