use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::state::ConversationState;

/// Storage for conversation state between turns, keyed by session id
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn load(&self, session_id: &str) -> Result<Option<ConversationState>>;

    async fn save(&self, session_id: &str, state: ConversationState) -> Result<()>;
}

/// Keeps checkpoints for the lifetime of the process
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    states: RwLock<HashMap<String, ConversationState>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self, session_id: &str) -> Result<Option<ConversationState>> {
        Ok(self.states.read().await.get(session_id).cloned())
    }

    async fn save(&self, session_id: &str, mut state: ConversationState) -> Result<()> {
        state.external_tools.clear();
        self.states
            .write()
            .await
            .insert(session_id.to_string(), state);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::Message;
    use crate::models::tool::Tool;
    use crate::state::ExternalTool;
    use serde_json::json;

    #[tokio::test]
    async fn test_load_missing_session() -> Result<()> {
        let store = MemoryCheckpointStore::new();
        assert!(store.load("nobody").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_save_and_load_per_session() -> Result<()> {
        let store = MemoryCheckpointStore::new();
        let mut state = ConversationState::default();
        state.push(Message::user().with_text("Weather in Paris?"));
        state.last_location = Some("Paris".to_string());
        state.external_tools.push(ExternalTool::client_side(Tool::new(
            "getTime",
            "Current time",
            json!({"type": "object"}),
        )));

        store.save("a", state.clone()).await?;

        let loaded = store.load("a").await?.unwrap();
        assert_eq!(loaded.messages, state.messages);
        assert_eq!(loaded.last_location.as_deref(), Some("Paris"));
        assert!(loaded.external_tools.is_empty());
        assert!(store.load("b").await?.is_none());
        Ok(())
    }
}
