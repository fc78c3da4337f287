//! OpenAI-compatible client implementation
//!
//! Works with any endpoint that speaks the chat completions protocol
//! (OpenAI, DeepSeek, vLLM, LM Studio, ...). Streaming uses server-sent events.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::core::config::ProviderConfig;
use crate::core::{Message, ReagentError, Result, TokenUsage};
use crate::llm::traits::{
    ChatChoice, GenerateOptions, LLMProvider, LLMResponse, StreamDelta, StreamResponse,
};

/// OpenAI-compatible API client
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    usage: Option<UsageBody>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageBody {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl From<UsageBody> for TokenUsage {
    fn from(usage: UsageBody) -> Self {
        TokenUsage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StreamBody {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<UsageBody>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: ChoiceMessage,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

/// Result of parsing one SSE line
#[derive(Debug, PartialEq)]
enum SseLine {
    Delta(StreamDelta),
    Done,
    Skip,
}

impl OpenAiClient {
    /// Create a new client from configuration
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    fn request<'a>(
        &'a self,
        messages: &'a [Message],
        options: Option<GenerateOptions>,
        stream: bool,
    ) -> CompletionRequest<'a> {
        let options = options.unwrap_or_default();
        CompletionRequest {
            model: &self.model,
            messages,
            stream,
            temperature: options.temperature.or(self.temperature),
            max_tokens: options.max_tokens,
            stop: options.stop,
            stream_options: stream.then_some(StreamOptions {
                include_usage: true,
            }),
        }
    }

    async fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<reqwest::Response> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .authorized(self.client.post(&url))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    ReagentError::provider(format!("Cannot connect to {}", self.base_url))
                } else {
                    ReagentError::from(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %error_text, "Provider returned an error");

            if status.as_u16() == 404 && error_text.contains("model") {
                return Err(ReagentError::ModelNotFound(self.model.clone()));
            }

            return Err(ReagentError::provider(format!(
                "API error ({}): {}",
                status, error_text
            )));
        }

        Ok(response)
    }

    fn parse_sse_line(line: &str) -> Result<SseLine> {
        let line = line.trim_end_matches('\r');
        let Some(data) = line.strip_prefix("data:") else {
            return Ok(SseLine::Skip);
        };

        let data = data.trim();
        if data == "[DONE]" {
            return Ok(SseLine::Done);
        }
        if data.is_empty() {
            return Ok(SseLine::Skip);
        }

        let body: StreamBody = serde_json::from_str(data)?;
        let mut delta = StreamDelta {
            usage: body.usage.map(TokenUsage::from),
            ..Default::default()
        };

        if let Some(choice) = body.choices.into_iter().next() {
            delta.content = choice.delta.content.unwrap_or_default();
            delta.reasoning = choice.delta.reasoning_content.unwrap_or_default();
        }

        if delta == StreamDelta::default() {
            Ok(SseLine::Skip)
        } else {
            Ok(SseLine::Delta(delta))
        }
    }
}

#[async_trait]
impl LLMProvider for OpenAiClient {
    async fn chat(
        &self,
        messages: &[Message],
        options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        let request = self.request(messages, options, false);
        debug!(model = %self.model, messages = messages.len(), "Sending chat completion");

        let response: CompletionResponse = self.post("chat/completions", &request).await?.json().await?;

        Ok(LLMResponse {
            choices: response
                .choices
                .into_iter()
                .map(|c| ChatChoice {
                    content: c.message.content.unwrap_or_default(),
                    reasoning: c.message.reasoning_content,
                    finish_reason: c.finish_reason,
                })
                .collect(),
            usage: response.usage.map(TokenUsage::from),
            model: response.model,
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
        let request = self.request(messages, options, true);
        debug!(model = %self.model, messages = messages.len(), "Sending streaming chat completion");

        let response = self.post("chat/completions", &request).await?;
        let (tx, rx) = mpsc::channel(32);

        tokio::spawn(async move {
            let mut bytes = response.bytes_stream();
            let mut buffer: Vec<u8> = Vec::new();

            loop {
                let next = tokio::select! {
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
                    let line = String::from_utf8_lossy(&line);
                    match Self::parse_sse_line(line.trim_end_matches(['\r', '\n'])) {
                        Ok(SseLine::Delta(delta)) => {
                            if tx.send(Ok(delta)).await.is_err() {
                                return;
                            }
                        }
                        Ok(SseLine::Done) => return,
                        Ok(SseLine::Skip) => {}
                        Err(e) => {
                            let _ = tx.send(Err(e)).await;
                            return;
                        }
                    }
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    async fn embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let response: EmbeddingResponse = self.post("embeddings", &request).await?.json().await?;
        if response.data.is_empty() {
            return Err(ReagentError::provider("No embedding data returned"));
        }

        let mut data = response.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/models", self.base_url);
        let response = self.authorized(self.client.get(&url)).send().await?;

        if !response.status().is_success() {
            return Err(ReagentError::provider("Failed to list models"));
        }

        let models: ModelsResponse = response.json().await?;
        Ok(models.data.into_iter().map(|m| m.id).collect())
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }
}
