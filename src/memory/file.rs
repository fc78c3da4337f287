//! File-backed memory, one JSON-lines file per conversation.
//!
//! Storage location: `~/.local/share/reagent/conversations/<id>.jsonl`
//! unless `memory.dir` is configured. Saves append lines, so a crash mid
//! run loses at most the message being written.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{normalize_id, Memory};
use crate::core::{Message, ReagentError, Result};

/// Persists each conversation under `dir`
#[derive(Debug)]
pub struct FileMemory {
    dir: PathBuf,
    // serializes appends from concurrent sessions sharing this store
    write_lock: Mutex<()>,
}

impl FileMemory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Directory holding the conversation files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File for a conversation; characters outside `[A-Za-z0-9._-]` become `_`
    pub fn path_for(&self, conversation_id: &str) -> PathBuf {
        let safe: String = normalize_id(conversation_id)
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        // keep "." and ".." from resolving to directories
        let safe = if safe.trim_matches('.').is_empty() {
            safe.replace('.', "_")
        } else {
            safe
        };
        self.dir.join(format!("{}.jsonl", safe))
    }
}

#[async_trait]
impl Memory for FileMemory {
    async fn load_messages(&self, conversation_id: &str) -> Result<Vec<Message>> {
        let path = self.path_for(conversation_id);
        let content = match fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(ReagentError::memory(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let messages: Vec<Message> = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<Message>(line) {
                Ok(message) => Some(message),
                Err(e) => {
                    warn!(error = %e, path = %path.display(), "Skipping corrupted message line");
                    None
                }
            })
            .collect();

        debug!(conversation = conversation_id, count = messages.len(), "Loaded conversation");
        Ok(messages)
    }

    async fn save_messages(&self, conversation_id: &str, messages: &[Message]) -> Result<()> {
        if messages.is_empty() {
            return Ok(());
        }

        let mut content = String::new();
        for message in messages {
            content.push_str(&serde_json::to_string(message)?);
            content.push('\n');
        }

        let _guard = self.write_lock.lock().await;
        fs::create_dir_all(&self.dir).await.map_err(|e| {
            ReagentError::memory(format!("Failed to create memory directory: {}", e))
        })?;

        let path = self.path_for(conversation_id);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| ReagentError::memory(format!("Failed to open {}: {}", path.display(), e)))?;

        file.write_all(content.as_bytes())
            .await
            .map_err(|e| ReagentError::memory(format!("Failed to write {}: {}", path.display(), e)))?;
        file.flush().await?;
        Ok(())
    }

    async fn clear_messages(&self, conversation_id: &str) -> Result<()> {
        let path = self.path_for(conversation_id);
        let _guard = self.write_lock.lock().await;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ReagentError::memory(format!(
                "Failed to remove {}: {}",
                path.display(),
                e
            ))),
        }
    }
}
