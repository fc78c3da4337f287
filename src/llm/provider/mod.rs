//! LLM Provider implementations and factory
//!
//! Ollama lives at the crate's llm root; OpenAI-compatible endpoints are here.

pub mod openai;

use std::sync::Arc;

use tracing::info;

use crate::core::config::{ProviderConfig, ProviderKind};
use crate::core::Result;
use crate::llm::traits::LLMProvider;
use crate::llm::OllamaClient;

pub use self::openai::OpenAiClient;

/// Create a new LLM provider based on configuration
pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn LLMProvider>> {
    let provider: Arc<dyn LLMProvider> = match config.kind {
        ProviderKind::Ollama => Arc::new(OllamaClient::from_config(config)?),
        ProviderKind::OpenAi => Arc::new(OpenAiClient::from_config(config)?),
    };

    info!(
        provider = provider.name(),
        model = provider.model(),
        base_url = %config.base_url(),
        "Model provider ready"
    );
    Ok(provider)
}
