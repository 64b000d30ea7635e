use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;

use super::base::{Provider, Usage};
use super::configs::{OllamaProviderConfig, OpenAiProviderConfig};
use super::utils::{create_request, get_usage, openai_response_to_message};
use crate::models::message::Message;
use crate::models::tool::Tool;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// Whether a response without token counts is acceptable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsagePolicy {
    Required,
    /// Older ollama builds omit usage on the compatibility endpoint
    BestEffort,
}

/// Everything needed to talk to one `/v1/chat/completions` server
#[derive(Debug, Clone)]
pub struct ChatEndpoint {
    /// Label used in logs and error messages
    pub backend: &'static str,
    pub host: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
    pub usage: UsagePolicy,
}

impl ChatEndpoint {
    fn url(&self) -> String {
        format!("{}/v1/chat/completions", self.host.trim_end_matches('/'))
    }
}

impl From<OpenAiProviderConfig> for ChatEndpoint {
    fn from(config: OpenAiProviderConfig) -> Self {
        Self {
            backend: "OpenAI",
            host: config.host,
            api_key: Some(config.api_key),
            model: config.model,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            usage: UsagePolicy::Required,
        }
    }
}

impl From<OllamaProviderConfig> for ChatEndpoint {
    fn from(config: OllamaProviderConfig) -> Self {
        Self {
            backend: "Ollama",
            host: config.host,
            api_key: None,
            model: config.model,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            usage: UsagePolicy::BestEffort,
        }
    }
}

/// Client for any server speaking the OpenAI chat completions protocol
pub struct ChatCompletionsProvider {
    client: Client,
    endpoint: ChatEndpoint,
}

impl ChatCompletionsProvider {
    pub fn new(endpoint: ChatEndpoint) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, endpoint })
    }

    async fn post(&self, payload: &Value) -> Result<Value> {
        let mut request = self.client.post(self.endpoint.url()).json(payload);
        if let Some(api_key) = &self.endpoint.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::OK {
            return Ok(response.json().await?);
        }

        // 429 and 5xx are transient
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(anyhow!("Server error: {}", status));
        }
        let body = response.text().await.unwrap_or_default();
        tracing::debug!(%status, %body, %payload, "Rejected chat request");
        Err(anyhow!("Request failed: {}: {}", status, body))
    }
}

#[async_trait]
impl Provider for ChatCompletionsProvider {
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<(Message, Usage)> {
        let endpoint = &self.endpoint;
        let payload = create_request(
            &endpoint.model,
            system,
            messages,
            tools,
            endpoint.temperature,
            endpoint.max_tokens,
        )?;

        let response = self.post(&payload).await?;
        if let Some(error) = response.get("error") {
            return Err(anyhow!("{} API error: {}", endpoint.backend, error));
        }

        let usage = match endpoint.usage {
            UsagePolicy::Required => get_usage(&response)?,
            UsagePolicy::BestEffort => get_usage(&response).unwrap_or_default(),
        };
        let message = openai_response_to_message(response)?;

        Ok((message, usage))
    }
}
