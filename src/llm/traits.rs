//! LLM Provider trait for abstracting different backends
//!
//! Enables swapping between Ollama, OpenAI-compatible endpoints, and test doubles.
//! Streaming is an optional capability: providers advertise it through
//! [`LLMProvider::supports_streaming`] and the agent falls back to
//! [`LLMProvider::chat`] when it is absent.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::core::{Message, ReagentError, Result, TokenUsage};

/// One candidate completion
#[derive(Debug, Clone, Default)]
pub struct ChatChoice {
    /// Text content of the completion
    pub content: String,
    /// Separate reasoning text for models that expose it
    pub reasoning: Option<String>,
    /// Why generation stopped, if reported
    pub finish_reason: Option<String>,
}

/// Response from an LLM provider
#[derive(Debug, Clone, Default)]
pub struct LLMResponse {
    /// Completions; the agent only reads the first one
    pub choices: Vec<ChatChoice>,
    /// Token usage information
    pub usage: Option<TokenUsage>,
    /// Model that generated the response
    pub model: String,
}

impl LLMResponse {
    /// Response carrying a single completion
    pub fn single(model: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            choices: vec![ChatChoice {
                content: content.into(),
                ..Default::default()
            }],
            usage: None,
            model: model.into(),
        }
    }

    /// Attach usage information
    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// Options for LLM generation
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Temperature for sampling (0.0 - 2.0)
    pub temperature: Option<f32>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Stop sequences
    pub stop: Option<Vec<String>>,
}

/// An incremental piece of a streaming response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamDelta {
    /// Answer text delta
    pub content: String,
    /// Reasoning text delta
    pub reasoning: String,
    /// Usage, usually only on the last delta
    pub usage: Option<TokenUsage>,
}

impl StreamDelta {
    /// Create a content delta
    pub fn content(text: impl Into<String>) -> Self {
        Self {
            content: text.into(),
            ..Default::default()
        }
    }

    /// Create a reasoning delta
    pub fn reasoning(text: impl Into<String>) -> Self {
        Self {
            reasoning: text.into(),
            ..Default::default()
        }
    }
}

/// Type alias for a boxed stream of deltas
pub type StreamResponse = Pin<Box<dyn Stream<Item = Result<StreamDelta>> + Send>>;

/// Trait for LLM providers
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a response from messages
    async fn chat(
        &self,
        messages: &[Message],
        options: Option<GenerateOptions>,
    ) -> Result<LLMResponse>;

    /// Whether [`chat_stream`](Self::chat_stream) delivers tokens incrementally
    fn supports_streaming(&self) -> bool {
        false
    }

    /// Generate a streaming response
    ///
    /// Dropping the returned stream aborts the underlying request.
    async fn chat_stream(
        &self,
        _messages: &[Message],
        _options: Option<GenerateOptions>,
    ) -> Result<StreamResponse> {
        Err(ReagentError::StreamingUnsupported(self.name().to_string()))
    }

    /// Embed each input text
    async fn embeddings(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(ReagentError::Unsupported {
            provider: self.name().to_string(),
            capability: "embeddings",
        })
    }

    /// List available models
    async fn list_models(&self) -> Result<Vec<String>> {
        Ok(vec![self.model().to_string()])
    }

    /// Get the provider name
    fn name(&self) -> &str;

    /// Model used for requests
    fn model(&self) -> &str;
}
