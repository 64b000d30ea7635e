use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::message::Message;
use crate::models::tool::Tool;

/// Tokens spent on one completion, as far as the backend reports them
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

impl Usage {
    /// A missing total is derived from the two halves when both are known
    pub fn new(
        input_tokens: Option<i32>,
        output_tokens: Option<i32>,
        total_tokens: Option<i32>,
    ) -> Self {
        let total_tokens = total_tokens.or_else(|| Some(input_tokens? + output_tokens?));
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }
}

/// A chat model the agent can consult
///
/// Tools are bound on every call, so a completion always sees the full set the model may request.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Produce the next assistant message for the conversation so far
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<(Message, Usage)>;
}
