//! Iteration controller - the ReAct loop shared by both execution modes
//!
//! [`drive`] owns the state machine: bound check, model call, assistant
//! append, decode, dispatch. How a model response is obtained and what the
//! caller sees along the way is up to the [`TurnDriver`]: the blocking driver
//! makes one `chat` call per iteration, the streaming driver forwards
//! narration through a [`DeliveryBuffer`] as it arrives.

use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, info, warn};

use crate::agent::action::{self, Action};
use crate::agent::conversation::Conversation;
use crate::agent::delivery::DeliveryBuffer;
use crate::agent::loop_state::{LoopPhase, LoopState, RunMetadata};
use crate::agent::stream::{ChunkSink, StreamChunk, ToolCallReport};
use crate::core::{Message, ReagentError, Result, TokenUsage};
use crate::llm::LLMProvider;
use crate::tools::ToolRegistry;

/// One complete model response
#[derive(Debug, Clone)]
pub(crate) struct ModelTurn {
    pub content: String,
    pub usage: Option<TokenUsage>,
}

/// Everything a run borrows from its session
pub(crate) struct RunContext<'a> {
    pub provider: &'a dyn LLMProvider,
    pub tools: &'a ToolRegistry,
    pub conversation: &'a mut Conversation,
    pub metadata: &'a mut RunMetadata,
    pub max_iterations: usize,
}

/// Mode-specific half of the loop
#[async_trait]
pub(crate) trait TurnDriver: Send {
    /// Produce the model's response to the current log
    async fn respond(&mut self, provider: &dyn LLMProvider, messages: &[Message])
        -> Result<ModelTurn>;

    /// The response resolved to `answer`; `response` is its full text
    async fn deliver_answer(&mut self, answer: &str, response: &str) -> Result<()>;

    /// A tool is about to run
    async fn tool_started(&mut self, _call: &ToolCallReport) -> Result<()> {
        Ok(())
    }

    /// A tool finished, successfully or not
    async fn tool_finished(&mut self, _outcome: &ToolCallReport) -> Result<()> {
        Ok(())
    }
}

/// Run the loop until an answer, an error, or the iteration bound
pub(crate) async fn drive<D: TurnDriver>(mut ctx: RunContext<'_>, driver: &mut D) -> Result<String> {
    let mut state = LoopState::new(ctx.max_iterations);

    loop {
        let iteration = state.begin_iteration().inspect_err(|_| {
            warn!(max = ctx.max_iterations, "Iteration limit reached without an answer");
        })?;
        ctx.metadata.iterations = iteration;
        debug!(iteration, max = ctx.max_iterations, "Calling model");

        let turn = driver
            .respond(ctx.provider, ctx.conversation.messages())
            .await?;
        ctx.metadata.record_usage(turn.usage);
        ctx.conversation.add_assistant(turn.content.as_str()).await;

        state.enter(LoopPhase::Parsing);
        let action = action::decode(&turn.content)?;

        let (tool, args) = match action {
            Action::CallTool { tool, args } => (tool, args),
            other => {
                if let Action::UseSkill { skill, .. } = &other {
                    warn!(skill = %skill, "use_skill is not supported; answering with the raw response");
                }
                let answer = other.answer_text(&turn.content).unwrap_or_default();
                driver.deliver_answer(&answer, &turn.content).await?;
                state.enter(LoopPhase::Finished);
                info!(iterations = iteration, "Run finished");
                return Ok(answer);
            }
        };

        state.enter(LoopPhase::Dispatching);
        info!(iteration, tool = %tool, "Dispatching tool call");
        let call = ToolCallReport::call(&tool, &args);
        driver.tool_started(&call).await?;

        match ctx.tools.dispatch(&tool, &args).await {
            Ok(result) => {
                driver.tool_finished(&call.succeeded(result.as_str())).await?;
                ctx.conversation.add_tool_result(&tool, &result).await;
            }
            Err(e) => {
                warn!(tool = %tool, error = %e, "Tool call failed");
                driver.tool_finished(&call.failed(e.to_string())).await?;
                return Err(e);
            }
        }
    }
}

/// One `chat` call per iteration; nothing is shown until the run ends
#[derive(Debug, Default)]
pub(crate) struct BlockingDriver;

#[async_trait]
impl TurnDriver for BlockingDriver {
    async fn respond(
        &mut self,
        provider: &dyn LLMProvider,
        messages: &[Message],
    ) -> Result<ModelTurn> {
        chat_turn(provider, messages).await
    }

    async fn deliver_answer(&mut self, _answer: &str, _response: &str) -> Result<()> {
        Ok(())
    }
}

async fn chat_turn(provider: &dyn LLMProvider, messages: &[Message]) -> Result<ModelTurn> {
    let response = provider.chat(messages, None).await.map_err(as_provider_error)?;
    let usage = response.usage;
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ReagentError::provider("Model returned no choices"))?;

    Ok(ModelTurn {
        content: choice.content,
        usage,
    })
}

fn as_provider_error(e: ReagentError) -> ReagentError {
    if e.is_provider_error() {
        e
    } else {
        ReagentError::provider(e.to_string())
    }
}

/// Streams narration to the caller while withholding action payloads
pub(crate) struct StreamingDriver {
    sink: ChunkSink,
    debug: bool,
    /// Delivery state of the last streamed response; `None` after a fallback call
    last: Option<DeliveryBuffer>,
}

impl StreamingDriver {
    pub(crate) fn new(sink: ChunkSink, debug: bool) -> Self {
        Self {
            sink,
            debug,
            last: None,
        }
    }

    async fn send_content(&self, text: String) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        self.sink.send(StreamChunk::Content(text)).await
    }
}

#[async_trait]
impl TurnDriver for StreamingDriver {
    async fn respond(
        &mut self,
        provider: &dyn LLMProvider,
        messages: &[Message],
    ) -> Result<ModelTurn> {
        self.last = None;

        if !provider.supports_streaming() {
            debug!(provider = provider.name(), "Provider cannot stream, using chat");
            return chat_turn(provider, messages).await;
        }

        let mut deltas = provider
            .chat_stream(messages, None)
            .await
            .map_err(as_provider_error)?;
        let mut buffer = DeliveryBuffer::new(self.debug);
        let mut usage = None;

        while let Some(delta) = deltas.next().await {
            let delta = delta.map_err(as_provider_error)?;

            if !delta.reasoning.is_empty() {
                self.sink.send(StreamChunk::Reasoning(delta.reasoning)).await?;
            }
            if let Some(text) = buffer.push(&delta.content) {
                self.send_content(text).await?;
            }
            if delta.usage.is_some() {
                usage = delta.usage;
            }
        }

        if let Some(text) = buffer.finish() {
            self.send_content(text).await?;
        }

        if buffer.full_content().is_empty() {
            return Err(ReagentError::provider("Model returned an empty response"));
        }

        let content = buffer.full_content().to_string();
        self.last = Some(buffer);
        Ok(ModelTurn { content, usage })
    }

    async fn deliver_answer(&mut self, answer: &str, response: &str) -> Result<()> {
        match self.last.take() {
            // fallback call: nothing was shown yet
            None => self.send_content(answer.to_string()).await,
            Some(buffer) if buffer.marker_found() => {
                // the narration before the marker is already out; a fail-open
                // answer is the whole response, so release the payload too
                let rest = if answer == response {
                    buffer.withheld().to_string()
                } else {
                    answer.to_string()
                };
                self.send_content(rest).await
            }
            Some(_) => Ok(()),
        }
    }

    async fn tool_started(&mut self, call: &ToolCallReport) -> Result<()> {
        self.sink.send(StreamChunk::ToolCall(call.clone())).await
    }

    async fn tool_finished(&mut self, outcome: &ToolCallReport) -> Result<()> {
        self.sink
            .send(StreamChunk::ToolResult(outcome.clone()))
            .await?;
        self.sink.send(StreamChunk::ToolDelimiter).await
    }
}
