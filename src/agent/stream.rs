//! Streaming output types
//!
//! A streamed run is a finite sequence of [`StreamChunk`]s ending in exactly
//! one [`StreamChunk::Done`] or [`StreamChunk::Error`]. Tool activity travels
//! as typed chunks so callers can render it apart from narration.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::core::{ReagentError, Result};
use crate::tools::ToolArgs;

/// Receiving end of a streamed run
pub type ChunkStream = ReceiverStream<StreamChunk>;

/// One unit of progress in a streamed run
#[derive(Debug)]
pub enum StreamChunk {
    /// Reasoning text from models that expose it
    Reasoning(String),
    /// Narration or answer text
    Content(String),
    /// The model asked for a tool
    ToolCall(ToolCallReport),
    /// The tool's output, or the failure that ends the run
    ToolResult(ToolCallReport),
    /// Separates one tool exchange from the text that follows
    ToolDelimiter,
    /// The run produced its answer
    Done,
    /// The run failed; nothing follows
    Error(ReagentError),
}

impl StreamChunk {
    /// Whether this chunk ends the sequence
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamChunk::Done | StreamChunk::Error(_))
    }

    /// Text of a content chunk
    pub fn content(&self) -> Option<&str> {
        match self {
            StreamChunk::Content(text) => Some(text),
            _ => None,
        }
    }
}

/// Structured record of a tool exchange, serialized as JSON for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallReport {
    /// `call_tool` for the request, `tool_result` for the outcome
    pub action: String,
    pub tool: String,
    pub args: ToolArgs,
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub message: String,
}

impl ToolCallReport {
    /// Report of the requested call
    pub fn call(tool: &str, args: &ToolArgs) -> Self {
        Self {
            action: "call_tool".to_string(),
            tool: tool.to_string(),
            args: args.clone(),
            result: String::new(),
            error: false,
            message: String::new(),
        }
    }

    /// Successful outcome of this call
    pub fn succeeded(&self, result: impl Into<String>) -> Self {
        Self {
            action: "tool_result".to_string(),
            result: result.into(),
            ..self.clone()
        }
    }

    /// Failed outcome of this call
    pub fn failed(&self, message: impl Into<String>) -> Self {
        Self {
            action: "tool_result".to_string(),
            error: true,
            message: message.into(),
            ..self.clone()
        }
    }
}

impl fmt::Display for ToolCallReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "{} {}", self.action, self.tool),
        }
    }
}

/// Sending half used by the run task
///
/// A closed receiver means the caller went away, which ends the run as
/// cancelled.
#[derive(Debug, Clone)]
pub(crate) struct ChunkSink {
    tx: mpsc::Sender<StreamChunk>,
}

impl ChunkSink {
    pub(crate) fn new(tx: mpsc::Sender<StreamChunk>) -> Self {
        Self { tx }
    }

    pub(crate) async fn send(&self, chunk: StreamChunk) -> Result<()> {
        self.tx
            .send(chunk)
            .await
            .map_err(|_| ReagentError::Cancelled)
    }

    /// Resolves once the receiver is dropped
    pub(crate) async fn closed(&self) {
        self.tx.closed().await
    }
}
