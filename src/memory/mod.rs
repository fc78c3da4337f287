//! Conversation memory - persistence for the message log
//!
//! The agent only depends on the [`Memory`] contract. Failures from any
//! backend are logged by the session and never abort a run.

pub mod buffer;
pub mod file;

use async_trait::async_trait;
use std::sync::Arc;

use crate::core::config::{MemoryBackend, MemoryConfig};
use crate::core::{Message, Result};

pub use buffer::BufferMemory;
pub use file::FileMemory;

/// Conversation id used when the caller passes an empty one
pub const DEFAULT_CONVERSATION: &str = "default";

/// Storage for conversation history keyed by conversation id
#[async_trait]
pub trait Memory: Send + Sync {
    /// Load every stored message for a conversation, oldest first
    async fn load_messages(&self, conversation_id: &str) -> Result<Vec<Message>>;

    /// Append messages to a conversation
    async fn save_messages(&self, conversation_id: &str, messages: &[Message]) -> Result<()>;

    /// Forget a conversation
    async fn clear_messages(&self, conversation_id: &str) -> Result<()>;
}

/// Map an empty id to [`DEFAULT_CONVERSATION`]
pub(crate) fn normalize_id(conversation_id: &str) -> &str {
    if conversation_id.is_empty() {
        DEFAULT_CONVERSATION
    } else {
        conversation_id
    }
}

/// Build the configured backend, if any
pub fn from_config(config: &MemoryConfig) -> Option<Arc<dyn Memory>> {
    match config.backend {
        MemoryBackend::None => None,
        MemoryBackend::Buffer => Some(Arc::new(BufferMemory::new())),
        MemoryBackend::File => Some(Arc::new(FileMemory::new(config.dir()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_normalize_id() {
        assert_eq!(normalize_id(""), "default");
        assert_eq!(normalize_id("abc"), "abc");
    }

    #[test]
    fn test_from_config() {
        let mut config = MemoryConfig {
            backend: MemoryBackend::None,
            dir: Some(PathBuf::from("/tmp/reagent-test")),
        };
        assert!(from_config(&config).is_none());

        config.backend = MemoryBackend::Buffer;
        assert!(from_config(&config).is_some());

        config.backend = MemoryBackend::File;
        assert!(from_config(&config).is_some());
    }
}
