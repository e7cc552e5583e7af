use serde::Serialize;
use std::ops::RangeInclusive;

pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "gpt-oss:20b";

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const TEMPERATURE_RANGE: RangeInclusive<f32> = 0.0..=2.0;
pub const TEMPERATURE_STEP: f32 = 0.1;

/// Sampling constants sent with every request; not user-configurable.
pub const TOP_P: f32 = 0.9;
pub const TOP_K: u32 = 40;

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "Du bist ein hilfsbereit AI-Assistent. Antworte höflich und informativ auf Deutsch.";

/// Model and sampling settings for one session.
///
/// Everything is fixed at session start except the temperature.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelConfig {
    host: String,
    model_name: String,
    temperature: f32,
    top_p: f32,
    top_k: u32,
    system_prompt: String,
}

/// Sampling knobs in the shape of Ollama's `options` object
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SamplingParams {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
}

impl ModelConfig {
    pub fn new(host: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            host: host.into().trim_end_matches('/').to_string(),
            model_name: model_name.into(),
            temperature: DEFAULT_TEMPERATURE,
            top_p: TOP_P,
            top_k: TOP_K,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    pub(crate) fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Set the temperature, clamped to the allowed range and snapped to the
    /// slider step. Returns the value actually stored.
    pub fn set_temperature(&mut self, temperature: f32) -> f32 {
        self.temperature = normalize_temperature(temperature);
        self.temperature
    }

    pub fn top_p(&self) -> f32 {
        self.top_p
    }

    pub fn top_k(&self) -> u32 {
        self.top_k
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn sampling(&self) -> SamplingParams {
        SamplingParams {
            temperature: self.temperature,
            top_p: self.top_p,
            top_k: self.top_k,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::new(DEFAULT_OLLAMA_HOST, DEFAULT_OLLAMA_MODEL)
    }
}

fn normalize_temperature(value: f32) -> f32 {
    if value.is_nan() {
        return DEFAULT_TEMPERATURE;
    }
    let clamped = value.clamp(*TEMPERATURE_RANGE.start(), *TEMPERATURE_RANGE.end());
    (clamped / TEMPERATURE_STEP).round() * TEMPERATURE_STEP
}
