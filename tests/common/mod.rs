//! Test doubles shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use futures::stream;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use futures::StreamExt;
use reagent::agent::{ChunkStream, StreamChunk};
use reagent::core::{Message, ReagentError, Result, TokenUsage};
use reagent::llm::{GenerateOptions, LLMProvider, LLMResponse, StreamDelta, StreamResponse};
use reagent::memory::Memory;
use reagent::tools::{Tool, ToolArgs};

/// One scripted model response
#[derive(Debug, Clone)]
pub enum Step {
    Reply(String),
    ReplyWithUsage(String, TokenUsage),
    /// Reasoning text followed by content
    Think(String, String),
    Fail(String),
    /// Streams the text, then fails (non-streaming: fails outright)
    BreakMidStream(String),
    /// No choices / no deltas
    Empty,
    /// Never answers
    Hang,
}

pub fn reply(text: &str) -> Step {
    Step::Reply(text.to_string())
}

/// Plays back a fixed script, one step per model call
pub struct ScriptedProvider {
    steps: Mutex<VecDeque<Step>>,
    calls: AtomicUsize,
    streaming: bool,
    chunk_size: usize,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedProvider {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            calls: AtomicUsize::new(0),
            streaming: true,
            chunk_size: 4,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Provider that only implements `chat`
    pub fn without_streaming(mut self) -> Self {
        self.streaming = false;
        self
    }

    /// Bytes per streamed delta (rounded up to a char boundary)
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Message log seen by each call
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }

    fn next_step(&self, messages: &[Message]) -> Option<Step> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(messages.to_vec());
        self.steps.lock().unwrap().pop_front()
    }

    fn deltas(&self, text: &str) -> Vec<Result<StreamDelta>> {
        split(text, self.chunk_size)
            .into_iter()
            .map(|c| Ok(StreamDelta::content(c)))
            .collect()
    }
}

/// Split text into pieces of about `size` bytes without breaking characters
pub fn split(text: &str, size: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let mut cut = size.min(rest.len());
        while !rest.is_char_boundary(cut) {
            cut += 1;
        }
        let (piece, tail) = rest.split_at(cut);
        pieces.push(piece.to_string());
        rest = tail;
    }
    pieces
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn chat(
        &self,
        messages: &[Message],
        _options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        let step = self.next_step(messages);
        match step {
            None => Err(ReagentError::provider("script exhausted")),
            Some(Step::Reply(text)) | Some(Step::Think(_, text)) => {
                Ok(LLMResponse::single("scripted", text))
            }
            Some(Step::ReplyWithUsage(text, usage)) => {
                Ok(LLMResponse::single("scripted", text).with_usage(usage))
            }
            Some(Step::Fail(message)) | Some(Step::BreakMidStream(message)) => {
                Err(ReagentError::provider(message))
            }
            Some(Step::Empty) => Ok(LLMResponse {
                choices: Vec::new(),
                usage: None,
                model: "scripted".to_string(),
            }),
            Some(Step::Hang) => futures::future::pending().await,
        }
    }

    fn supports_streaming(&self) -> bool {
        self.streaming
    }

    async fn chat_stream(
        &self,
        messages: &[Message],
        _options: Option<GenerateOptions>,
    ) -> Result<StreamResponse> {
        let step = self.next_step(messages);
        let deltas = match step {
            None => return Err(ReagentError::provider("script exhausted")),
            Some(Step::Reply(text)) => self.deltas(&text),
            Some(Step::ReplyWithUsage(text, usage)) => {
                let mut deltas = self.deltas(&text);
                deltas.push(Ok(StreamDelta {
                    usage: Some(usage),
                    ..Default::default()
                }));
                deltas
            }
            Some(Step::Think(reasoning, text)) => {
                let mut deltas = vec![Ok(StreamDelta::reasoning(reasoning))];
                deltas.extend(self.deltas(&text));
                deltas
            }
            Some(Step::Fail(message)) => return Err(ReagentError::provider(message)),
            Some(Step::BreakMidStream(text)) => {
                let mut deltas = self.deltas(&text);
                deltas.push(Err(ReagentError::provider("connection reset")));
                deltas
            }
            Some(Step::Empty) => Vec::new(),
            Some(Step::Hang) => return Ok(Box::pin(stream::pending::<Result<StreamDelta>>())),
        };
        Ok(Box::pin(stream::iter(deltas)))
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

/// Returns its arguments and remembers every call
#[derive(Default)]
pub struct EchoTool {
    calls: Mutex<Vec<ToolArgs>>,
}

impl EchoTool {
    pub fn calls(&self) -> Vec<ToolArgs> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Returns the arguments it was given"
    }

    async fn call(&self, args: &ToolArgs) -> Result<String> {
        self.calls.lock().unwrap().push(args.clone());
        Ok(format!("echo {}", serde_json::Value::Object(args.clone())))
    }
}

/// Always fails
pub struct ExplodingTool;

#[async_trait]
impl Tool for ExplodingTool {
    fn name(&self) -> &str {
        "explode"
    }

    fn description(&self) -> &str {
        "Fails every time"
    }

    async fn call(&self, _args: &ToolArgs) -> Result<String> {
        Err(ReagentError::tool("explode", "kaboom"))
    }
}

/// Memory whose every operation fails
pub struct FailingMemory;

#[async_trait]
impl Memory for FailingMemory {
    async fn load_messages(&self, _id: &str) -> Result<Vec<Message>> {
        Err(ReagentError::memory("unavailable"))
    }

    async fn save_messages(&self, _id: &str, _messages: &[Message]) -> Result<()> {
        Err(ReagentError::memory("unavailable"))
    }

    async fn clear_messages(&self, _id: &str) -> Result<()> {
        Err(ReagentError::memory("unavailable"))
    }
}

/// Drain a stream, failing the test if it does not end
pub async fn collect(stream: ChunkStream) -> Vec<StreamChunk> {
    tokio::time::timeout(Duration::from_secs(5), stream.collect::<Vec<_>>())
        .await
        .expect("stream did not finish")
}

/// Concatenated content chunks
pub fn content(chunks: &[StreamChunk]) -> String {
    chunks.iter().filter_map(|c| c.content()).collect()
}
