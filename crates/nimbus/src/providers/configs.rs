use serde::Serialize;
use std::env;
use thiserror::Error;

pub const OPENAI_HOST: &str = "https://api.openai.com";
pub const OPENAI_MODEL: &str = "gpt-4o";
pub const OLLAMA_HOST: &str = "http://localhost:11434";
pub const OLLAMA_MODEL: &str = "llama3.2:3b";
pub const DEFAULT_TEMPERATURE: f32 = 0.0;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Environment variable {key} has an invalid value: {value}")]
    InvalidValue { key: String, value: String },
}

/// Read an environment variable, treating blank values as unset
pub fn get_env(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

fn parse_temperature(key: &str) -> Result<f32, ConfigError> {
    match get_env(key) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value,
        }),
        None => Ok(DEFAULT_TEMPERATURE),
    }
}

/// Which class of backend is serving the conversation; selects the prompt variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    Hosted,
    Local,
}

// Unified enum to wrap different provider configurations
#[derive(Debug, Clone)]
pub enum ProviderConfig {
    OpenAi(OpenAiProviderConfig),
    Ollama(OllamaProviderConfig),
}

impl ProviderConfig {
    /// Select a backend from the environment: OpenAI when `OPENAI_API_KEY` is
    /// set, the local Ollama server otherwise.
    pub fn from_env() -> Result<Self, ConfigError> {
        let temperature = Some(parse_temperature("MODEL_TEMPERATURE")?);

        if let Some(api_key) = get_env("OPENAI_API_KEY") {
            return Ok(ProviderConfig::OpenAi(OpenAiProviderConfig {
                host: get_env("OPENAI_HOST").unwrap_or_else(|| OPENAI_HOST.to_string()),
                api_key,
                model: get_env("OPENAI_MODEL").unwrap_or_else(|| OPENAI_MODEL.to_string()),
                temperature,
                max_tokens: None,
            }));
        }

        Ok(ProviderConfig::Ollama(OllamaProviderConfig {
            host: get_env("OLLAMA_BASE_URL").unwrap_or_else(|| OLLAMA_HOST.to_string()),
            model: get_env("OLLAMA_MODEL").unwrap_or_else(|| OLLAMA_MODEL.to_string()),
            temperature,
            max_tokens: None,
        }))
    }

    pub fn tier(&self) -> ModelTier {
        match self {
            ProviderConfig::OpenAi(_) => ModelTier::Hosted,
            ProviderConfig::Ollama(_) => ModelTier::Local,
        }
    }

    pub fn model(&self) -> &str {
        match self {
            ProviderConfig::OpenAi(config) => &config.model,
            ProviderConfig::Ollama(config) => &config.model,
        }
    }

    /// Override the model identifier chosen from the environment
    pub fn with_model<S: Into<String>>(mut self, model: S) -> Self {
        match &mut self {
            ProviderConfig::OpenAi(config) => config.model = model.into(),
            ProviderConfig::Ollama(config) => config.model = model.into(),
        }
        self
    }

    /// Override the sampling temperature chosen from the environment
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        match &mut self {
            ProviderConfig::OpenAi(config) => config.temperature = Some(temperature),
            ProviderConfig::Ollama(config) => config.temperature = Some(temperature),
        }
        self
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiProviderConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct OllamaProviderConfig {
    pub host: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
}
