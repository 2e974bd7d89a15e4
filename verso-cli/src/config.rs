//! CLI configuration: environment first, then command-line overrides.

use std::env;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use verso::agent::DEFAULT_APPROVAL_TIMEOUT;
use verso::tools::{Backend, Composer, ModelComposer, SampleComposer};
use verso::{ConfigError, GuardrailConfig, HttpCompletionClient, HttpCompletionConfig};

pub const DEFAULT_MAX_STEPS: u32 = 12;
pub const DEFAULT_MAX_TOOL_CALLS: u32 = 12;
pub const DEFAULT_MAX_ITERATIONS: u32 = 3;

/// Errors that stop the CLI before or outside a run (exit code 2).
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Cannot read song structure from '{path}': {message}")]
    ReadSong { path: String, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CliConfig {
    pub max_steps: u32,
    pub max_tool_calls: u32,
    pub max_iterations: u32,
    pub approval_timeout: Duration,
    pub backend: Backend,
    pub model_endpoint: Option<String>,
    pub model_name: Option<String>,
    pub model_api_key: Option<String>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            max_tool_calls: DEFAULT_MAX_TOOL_CALLS,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            approval_timeout: DEFAULT_APPROVAL_TIMEOUT,
            backend: Backend::Sample,
            model_endpoint: None,
            model_name: None,
            model_api_key: None,
        }
    }
}

impl CliConfig {
    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `VERSO_MAX_STEPS`: plan-phase budget (default: 12)
    /// - `VERSO_MAX_TOOL_CALLS`: tool-invocation budget (default: 12)
    /// - `VERSO_MAX_ITERATIONS`: improvement budget (default: 3)
    /// - `VERSO_APPROVAL_TIMEOUT`: e.g. `90s`, `5m` (default: 5m)
    /// - `VERSO_BACKEND`: `sample` or `live` (default: sample)
    /// - `VERSO_MODEL_ENDPOINT`, `VERSO_MODEL_NAME`, `VERSO_MODEL_API_KEY`:
    ///   live backend settings
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(v) = get_env_u32(&lookup, "VERSO_MAX_STEPS")? {
            config.max_steps = v;
        }
        if let Some(v) = get_env_u32(&lookup, "VERSO_MAX_TOOL_CALLS")? {
            config.max_tool_calls = v;
        }
        if let Some(v) = get_env_u32(&lookup, "VERSO_MAX_ITERATIONS")? {
            config.max_iterations = v;
        }
        if let Some(v) = get_env_duration(&lookup, "VERSO_APPROVAL_TIMEOUT")? {
            config.approval_timeout = v;
        }
        if let Some(v) = get_env_backend(&lookup, "VERSO_BACKEND")? {
            config.backend = v;
        }
        config.model_endpoint = get_env_string(&lookup, "VERSO_MODEL_ENDPOINT");
        config.model_name = get_env_string(&lookup, "VERSO_MODEL_NAME");
        config.model_api_key = get_env_string(&lookup, "VERSO_MODEL_API_KEY");

        Ok(config)
    }

    pub fn with_max_steps(mut self, value: Option<u32>) -> Self {
        if let Some(value) = value {
            self.max_steps = value;
        }
        self
    }

    pub fn with_max_tool_calls(mut self, value: Option<u32>) -> Self {
        if let Some(value) = value {
            self.max_tool_calls = value;
        }
        self
    }

    pub fn with_max_iterations(mut self, value: Option<u32>) -> Self {
        if let Some(value) = value {
            self.max_iterations = value;
        }
        self
    }

    pub fn with_backend(mut self, value: Option<Backend>) -> Self {
        if let Some(value) = value {
            self.backend = value;
        }
        self
    }

    pub fn guardrails(&self) -> Result<GuardrailConfig, ConfigError> {
        GuardrailConfig::new(self.max_steps, self.max_tool_calls, self.max_iterations)
    }

    /// Composer for the selected backend.
    pub fn composer(&self) -> Result<Arc<dyn Composer>, ConfigError> {
        match self.backend {
            Backend::Sample => Ok(Arc::new(SampleComposer::new())),
            Backend::Live => {
                let endpoint = self.model_endpoint.as_deref().ok_or_else(|| {
                    ConfigError::ValidationError(
                        "live backend requires VERSO_MODEL_ENDPOINT".to_string(),
                    )
                })?;
                let model = self.model_name.as_deref().ok_or_else(|| {
                    ConfigError::ValidationError("live backend requires VERSO_MODEL_NAME".to_string())
                })?;

                let mut http = HttpCompletionConfig::new(endpoint, model);
                if let Some(key) = &self.model_api_key {
                    http = http.with_api_key(key.clone());
                }
                Ok(Arc::new(ModelComposer::new(HttpCompletionClient::new(http))))
            }
        }
    }
}

fn get_env_string(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn get_env_u32(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<u32>, ConfigError> {
    match lookup(key) {
        Some(val) => val
            .trim()
            .parse::<u32>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidEnvVar {
                key: key.to_string(),
                message: format!("invalid u32 value '{val}': {e}"),
            }),
        None => Ok(None),
    }
}

fn get_env_duration(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<Duration>, ConfigError> {
    match lookup(key) {
        Some(val) => humantime::parse_duration(val.trim())
            .map(Some)
            .map_err(|e| ConfigError::InvalidEnvVar {
                key: key.to_string(),
                message: format!("invalid duration '{val}': {e}"),
            }),
        None => Ok(None),
    }
}

fn get_env_backend(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<Backend>, ConfigError> {
    match lookup(key) {
        Some(val) => val
            .parse::<Backend>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidEnvVar {
                key: key.to_string(),
                message: e.to_string(),
            }),
        None => Ok(None),
    }
}
