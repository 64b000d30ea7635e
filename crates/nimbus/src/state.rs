use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::errors::AgentResult;
use crate::models::message::Message;
use crate::models::tool::Tool;

/// Server-side implementation of a caller-supplied tool
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Execute the tool and return its textual output
    async fn call(&self, arguments: Value) -> AgentResult<String>;
}

/// A tool declared by the caller for a single turn
#[derive(Clone)]
pub struct ExternalTool {
    pub tool: Tool,
    /// When absent, the caller executes the tool itself
    pub handler: Option<Arc<dyn ToolHandler>>,
}

impl ExternalTool {
    pub fn new(tool: Tool, handler: Arc<dyn ToolHandler>) -> Self {
        Self {
            tool,
            handler: Some(handler),
        }
    }

    pub fn client_side(tool: Tool) -> Self {
        Self {
            tool,
            handler: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.tool.name
    }
}

impl fmt::Debug for ExternalTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalTool")
            .field("tool", &self.tool.name)
            .field("client_side", &self.handler.is_none())
            .finish()
    }
}

/// Everything the agent remembers about one session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationState {
    pub messages: Vec<Message>,
    pub last_location: Option<String>,
    /// Supplied per turn and never checkpointed
    #[serde(skip)]
    pub external_tools: Vec<ExternalTool>,
}

impl ConversationState {
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn external_tool(&self, name: &str) -> Option<&ExternalTool> {
        self.external_tools.iter().find(|tool| tool.name() == name)
    }
}
