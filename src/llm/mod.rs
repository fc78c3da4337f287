//! LLM module - Language Model integrations
//!
//! Provides abstractions for different LLM backends with Ollama as the primary.

pub mod ollama;
pub mod provider;
pub mod traits;

pub use ollama::OllamaClient;
pub use provider::{create_provider, OpenAiClient};
pub use traits::{
    ChatChoice, GenerateOptions, LLMProvider, LLMResponse, StreamDelta, StreamResponse,
};
