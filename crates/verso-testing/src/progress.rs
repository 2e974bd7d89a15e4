//! Progress hook that keeps every event for later assertions.

use std::sync::{Arc, Mutex};
use verso_agent::{ProgressError, ProgressEvent, ProgressHook, ProgressPhase};

use crate::mock_tools::lock;

#[derive(Debug, Clone, Default)]
pub struct ProgressRecorder {
    events: Arc<Mutex<Vec<ProgressEvent>>>,
    failing: bool,
}

impl ProgressRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records events but reports every notification as failed.
    pub fn failing() -> Self {
        Self {
            events: Arc::default(),
            failing: true,
        }
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        lock(&self.events).clone()
    }

    pub fn phases(&self) -> Vec<ProgressPhase> {
        lock(&self.events).iter().map(|e| e.phase).collect()
    }

    pub fn count(&self, phase: ProgressPhase) -> usize {
        lock(&self.events).iter().filter(|e| e.phase == phase).count()
    }
}

impl ProgressHook for ProgressRecorder {
    fn notify(&self, event: &ProgressEvent) -> Result<(), ProgressError> {
        lock(&self.events).push(event.clone());
        if self.failing {
            return Err(ProgressError("recorder configured to fail".to_string()));
        }
        Ok(())
    }
}
