//! Ollama client implementation
//!
//! Async HTTP client for the Ollama chat API with NDJSON streaming support.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use crate::core::config::ProviderConfig;
use crate::core::{Message, ReagentError, Result, TokenUsage};
use crate::llm::traits::{
    ChatChoice, GenerateOptions, LLMProvider, LLMResponse, StreamDelta, StreamResponse,
};

/// Ollama API client
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
    temperature: Option<f32>,
}

/// Ollama chat request
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
    stream: bool,
}

/// Ollama generation options
#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

/// Message in an Ollama response
#[derive(Debug, Default, Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    thinking: String,
}

/// Ollama chat response; the same shape is used for every NDJSON line when streaming
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    message: Option<OllamaMessage>,
    #[serde(default)]
    model: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

impl ChatResponse {
    fn usage(&self) -> Option<TokenUsage> {
        match (self.prompt_eval_count, self.eval_count) {
            (Some(prompt), Some(completion)) => Some(TokenUsage::new(prompt, completion)),
            _ => None,
        }
    }
}

/// Ollama models list response
#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

/// Model information
#[derive(Debug, Deserialize)]
struct ModelInfo {
    name: String,
}

impl OllamaClient {
    /// Create a new Ollama client from configuration
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    /// Create a client with custom base URL and model
    pub fn with_base_url(base_url: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
            temperature: None,
        })
    }

    fn ollama_options(&self, options: Option<GenerateOptions>) -> Option<OllamaOptions> {
        match options {
            Some(opts) => Some(OllamaOptions {
                temperature: opts.temperature.or(self.temperature),
                num_predict: opts.max_tokens,
                stop: opts.stop,
            }),
            None => self.temperature.map(|t| OllamaOptions {
                temperature: Some(t),
                num_predict: None,
                stop: None,
            }),
        }
    }

    /// POST a chat request and map transport/status failures
    async fn send_chat(&self, request: &ChatRequest<'_>) -> Result<reqwest::Response> {
        debug!(
            model = %self.model,
            messages = request.messages.len(),
            stream = request.stream,
            "Sending Ollama chat request"
        );

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    ReagentError::provider(format!(
                        "Cannot connect to Ollama at {}. Is it running?",
                        self.base_url
                    ))
                } else {
                    ReagentError::from(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            if status.as_u16() == 404 && error_text.contains("not found") {
                return Err(ReagentError::ModelNotFound(self.model.clone()));
            }

            return Err(ReagentError::provider(format!(
                "Ollama API error ({}): {}",
                status, error_text
            )));
        }

        Ok(response)
    }

    /// Turn one NDJSON line into a delta, skipping empty keep-alive lines
    fn parse_stream_line(line: &str) -> Option<Result<StreamDelta>> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let chunk: ChatResponse = match serde_json::from_str(line) {
            Ok(chunk) => chunk,
            Err(e) => {
                debug!("Skipping unparseable Ollama stream line: {}: {}", e, line);
                return None;
            }
        };

        let usage = if chunk.done { chunk.usage() } else { None };
        let message = chunk.message.unwrap_or_default();

        if message.content.is_empty() && message.thinking.is_empty() && usage.is_none() {
            return None;
        }

        Some(Ok(StreamDelta {
            content: message.content,
            reasoning: message.thinking,
            usage,
        }))
    }
}

#[async_trait]
impl LLMProvider for OllamaClient {
    async fn chat(
        &self,
        messages: &[Message],
        options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            options: self.ollama_options(options),
            stream: false,
        };

        let response = self.send_chat(&request).await?;
        let response_text = response.text().await?;

        let chat_response: ChatResponse = serde_json::from_str(&response_text)
            .map_err(|e| ReagentError::provider(format!("Failed to parse response: {}", e)))?;

        let usage = chat_response.usage();
        let message = chat_response.message.unwrap_or_default();
        let reasoning = (!message.thinking.is_empty()).then_some(message.thinking);

        Ok(LLMResponse {
            choices: vec![ChatChoice {
                content: message.content,
                reasoning,
                finish_reason: chat_response.done_reason,
            }],
            usage,
            model: chat_response.model,
        })
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    async fn chat_stream(
        &self,
        messages: &[Message],
        options: Option<GenerateOptions>,
    ) -> Result<StreamResponse> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            options: self.ollama_options(options),
            stream: true,
        };

        let response = self.send_chat(&request).await?;
        let (tx, rx) = mpsc::channel(32);

        tokio::spawn(async move {
            let mut bytes = response.bytes_stream();
            // raw bytes: a network chunk may end inside a multibyte character
            let mut buffer: Vec<u8> = Vec::new();

            loop {
                let next = tokio::select! {
                    // receiver dropped: stop reading even if the model stalls
                    _ = tx.closed() => return,
                    next = bytes.next() => next,
                };
                let Some(chunk) = next else { break };
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ReagentError::provider(format!("Stream error: {}", e))))
                            .await;
                        return;
                    }
                };
                buffer.extend_from_slice(&chunk);

                while let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=newline_pos).collect();
                    if let Some(delta) = Self::parse_stream_line(&String::from_utf8_lossy(&line)) {
                        if tx.send(delta).await.is_err() {
                            // receiver dropped, abandon the response body
                            return;
                        }
                    }
                }
            }

            if let Some(delta) = Self::parse_stream_line(&String::from_utf8_lossy(&buffer)) {
                let _ = tx.send(delta).await;
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    ReagentError::provider(format!(
                        "Cannot connect to Ollama at {}. Is it running?",
                        self.base_url
                    ))
                } else {
                    ReagentError::from(e)
                }
            })?;

        if !response.status().is_success() {
            return Err(ReagentError::provider("Failed to list models"));
        }

        let models_response: ModelsResponse = response.json().await?;
        Ok(models_response.models.into_iter().map(|m| m.name).collect())
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }
}
