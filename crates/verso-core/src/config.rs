//! Guardrail configuration.
//!
//! The control loop requires every limit explicitly; there is no `Default`.
//! Outer layers (the CLI) pick defaults and load overrides from the
//! environment before building a [`GuardrailConfig`].

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Hard numeric limits that bound the work of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardrailConfig {
    /// Plan-phase budget.
    pub max_steps: u32,
    /// Tool-invocation budget.
    pub max_tool_calls: u32,
    /// Improvement-cycle budget, consulted by the policy.
    pub max_iterations: u32,
}

impl GuardrailConfig {
    /// Build and validate a guardrail configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if a step or tool-call budget is
    /// zero. A zero iteration budget is allowed and disables improvement.
    pub fn new(max_steps: u32, max_tool_calls: u32, max_iterations: u32) -> Result<Self, ConfigError> {
        let config = Self {
            max_steps,
            max_tool_calls,
            max_iterations,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_steps == 0 {
            return Err(ConfigError::ValidationError(
                "max_steps must be greater than 0".to_string(),
            ));
        }
        if self.max_tool_calls == 0 {
            return Err(ConfigError::ValidationError(
                "max_tool_calls must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
