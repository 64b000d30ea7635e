use anyhow::Result;

use super::base::Provider;
use super::chat_completions::{ChatCompletionsProvider, ChatEndpoint};
use super::configs::ProviderConfig;

/// Build the client for a configured backend
pub fn get_provider(config: ProviderConfig) -> Result<Box<dyn Provider>> {
    let endpoint = match config {
        ProviderConfig::OpenAi(openai) => ChatEndpoint::from(openai),
        ProviderConfig::Ollama(ollama) => ChatEndpoint::from(ollama),
    };
    tracing::info!(
        backend = endpoint.backend,
        model = %endpoint.model,
        host = %endpoint.host,
        "Using chat model"
    );

    Ok(Box::new(ChatCompletionsProvider::new(endpoint)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::configs::{OllamaProviderConfig, OLLAMA_HOST};

    #[test]
    fn test_builds_every_backend() {
        let config = ProviderConfig::Ollama(OllamaProviderConfig {
            host: OLLAMA_HOST.to_string(),
            model: "qwen2.5".to_string(),
            temperature: None,
            max_tokens: None,
        });
        assert!(get_provider(config).is_ok());
    }
}
