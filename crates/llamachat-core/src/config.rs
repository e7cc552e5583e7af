//! Session configuration loaded from the environment.

use thiserror::Error;

use crate::models::model_config::{
    DEFAULT_OLLAMA_HOST, DEFAULT_OLLAMA_MODEL, DEFAULT_TEMPERATURE, ModelConfig,
    TEMPERATURE_RANGE,
};

pub const ENV_OLLAMA_HOST: &str = "OLLAMA_HOST";
pub const ENV_OLLAMA_MODEL: &str = "OLLAMA_MODEL";
pub const ENV_SYSTEM_PROMPT: &str = "LLAMACHAT_SYSTEM_PROMPT";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid Ollama host '{host}': {reason}")]
    InvalidHost { host: String, reason: String },

    #[error("Model name must not be empty")]
    EmptyModelName,

    #[error("Temperature {0} is outside the allowed range 0.0..=2.0")]
    TemperatureOutOfRange(f32),
}

/// Builder for [`ModelConfig`]
#[derive(Debug, Default, Clone)]
pub struct ModelConfigBuilder {
    host: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    system_prompt: Option<String>,
}

impl ModelConfigBuilder {
    /// Start from `OLLAMA_HOST`, `OLLAMA_MODEL` and `LLAMACHAT_SYSTEM_PROMPT`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            host: non_empty(ENV_OLLAMA_HOST),
            model: non_empty(ENV_OLLAMA_MODEL),
            temperature: None,
            system_prompt: non_empty(ENV_SYSTEM_PROMPT),
        }
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn build(self) -> Result<ModelConfig, ConfigError> {
        let host = self
            .host
            .unwrap_or_else(|| DEFAULT_OLLAMA_HOST.to_string());
        let host = normalize_host(host)?;

        let model = self
            .model
            .unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string());
        if model.trim().is_empty() {
            return Err(ConfigError::EmptyModelName);
        }

        let temperature = self.temperature.unwrap_or(DEFAULT_TEMPERATURE);
        if !TEMPERATURE_RANGE.contains(&temperature) {
            return Err(ConfigError::TemperatureOutOfRange(temperature));
        }

        let mut config = ModelConfig::new(host, model.trim());
        config.set_temperature(temperature);
        if let Some(prompt) = self.system_prompt {
            config = config.with_system_prompt(prompt);
        }
        Ok(config)
    }
}

impl ModelConfig {
    pub fn builder() -> ModelConfigBuilder {
        ModelConfigBuilder::default()
    }

    /// Create config from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        ModelConfigBuilder::from_env().build()
    }
}

/// Ollama accepts a bare `host:port` in `OLLAMA_HOST`; we need a full URL.
fn normalize_host(host: String) -> Result<String, ConfigError> {
    let trimmed = host.trim();
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };

    let url = reqwest::Url::parse(&with_scheme).map_err(|e| ConfigError::InvalidHost {
        host: host.clone(),
        reason: e.to_string(),
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidHost {
            host,
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }

    Ok(with_scheme.trim_end_matches('/').to_string())
}
