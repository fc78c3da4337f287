//! Conversation history management
//!
//! The message log of a session. System messages form a fixed prefix; every
//! other message is appended in order and mirrored to the memory store when
//! one is attached. Memory failures are logged and never surface.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::core::Message;
use crate::memory::Memory;

/// Ordered message log with optional persistence
#[derive(Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    memory: Option<Arc<dyn Memory>>,
    conversation_id: Option<String>,
}

impl Conversation {
    /// Create an empty log; an empty id disables persistence
    pub fn new(memory: Option<Arc<dyn Memory>>, conversation_id: Option<String>) -> Self {
        Self {
            messages: Vec::new(),
            memory,
            conversation_id: conversation_id.filter(|id| !id.is_empty()),
        }
    }

    /// Add a system message at the end of the system prefix
    pub fn add_system(&mut self, content: impl Into<String>) {
        let at = self.system_len();
        self.messages.insert(at, Message::system(content));
    }

    /// Add a user message
    pub async fn add_user(&mut self, content: impl Into<String>) {
        self.append(Message::user(content)).await;
    }

    /// Add an assistant message
    pub async fn add_assistant(&mut self, content: impl Into<String>) {
        self.append(Message::assistant(content)).await;
    }

    /// Add a tool's output as a user message
    pub async fn add_tool_result(&mut self, tool_name: &str, result: &str) {
        self.append(Message::tool_result(tool_name, result)).await;
    }

    async fn append(&mut self, message: Message) {
        self.persist(&message).await;
        self.messages.push(message);
    }

    async fn persist(&self, message: &Message) {
        let (Some(memory), Some(id)) = (&self.memory, &self.conversation_id) else {
            return;
        };
        if let Err(e) = memory
            .save_messages(id, std::slice::from_ref(message))
            .await
        {
            warn!(conversation = %id, error = %e, "Failed to save message to memory");
        }
    }

    /// Append the stored history for the current conversation
    pub async fn load_history(&mut self) {
        let (Some(memory), Some(id)) = (&self.memory, &self.conversation_id) else {
            return;
        };

        match memory.load_messages(id).await {
            Ok(history) => {
                debug!(conversation = %id, count = history.len(), "Loaded history");
                // system messages only come from this session
                self.messages
                    .extend(history.into_iter().filter(|m| !m.is_system()));
            }
            Err(e) => {
                warn!(conversation = %id, error = %e, "Failed to load history from memory");
            }
        }
    }

    /// Keep the system prefix, drop the rest and reload history for `id`
    pub async fn switch_conversation(&mut self, conversation_id: Option<String>) {
        self.truncate_to_system();
        self.conversation_id = conversation_id.filter(|id| !id.is_empty());
        self.load_history().await;
    }

    /// Forget the current conversation in memory and in the log
    pub async fn clear(&mut self) {
        if let (Some(memory), Some(id)) = (&self.memory, &self.conversation_id) {
            if let Err(e) = memory.clear_messages(id).await {
                warn!(conversation = %id, error = %e, "Failed to clear memory");
            }
        }
        self.truncate_to_system();
    }

    fn truncate_to_system(&mut self) {
        let keep = self.system_len();
        self.messages.truncate(keep);
    }

    /// Number of leading system messages
    pub fn system_len(&self) -> usize {
        self.messages.iter().take_while(|m| m.is_system()).count()
    }

    /// All messages including the system prefix
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Owned copy of the log
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    /// Messages after the system prefix
    pub fn history(&self) -> &[Message] {
        &self.messages[self.system_len()..]
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    /// Get message count
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl std::fmt::Debug for Conversation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conversation")
            .field("messages", &self.messages.len())
            .field("conversation_id", &self.conversation_id)
            .field("memory", &self.memory.is_some())
            .finish()
    }
}
