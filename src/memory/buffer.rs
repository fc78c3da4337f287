//! In-process memory, the default backend. Contents are lost on exit.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{normalize_id, Memory};
use crate::core::{Message, Result};

/// Stores conversations in a map guarded by an async lock
#[derive(Debug, Default)]
pub struct BufferMemory {
    conversations: RwLock<HashMap<String, Vec<Message>>>,
}

impl BufferMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids of every stored conversation, sorted
    pub async fn conversations(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.conversations.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl Memory for BufferMemory {
    async fn load_messages(&self, conversation_id: &str) -> Result<Vec<Message>> {
        let conversations = self.conversations.read().await;
        Ok(conversations
            .get(normalize_id(conversation_id))
            .cloned()
            .unwrap_or_default())
    }

    async fn save_messages(&self, conversation_id: &str, messages: &[Message]) -> Result<()> {
        self.conversations
            .write()
            .await
            .entry(normalize_id(conversation_id).to_string())
            .or_default()
            .extend_from_slice(messages);
        Ok(())
    }

    async fn clear_messages(&self, conversation_id: &str) -> Result<()> {
        self.conversations
            .write()
            .await
            .remove(normalize_id(conversation_id));
        Ok(())
    }
}
