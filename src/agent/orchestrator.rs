//! Agent orchestrator
//!
//! The session: owns the message log and settings, and runs the ReAct loop
//! (Thought → Action → Observation) in blocking or streaming mode.
//!
//! Runs on one agent hold the session lock for their whole duration, so
//! concurrent calls on the same agent are serialized. Clones share the
//! session; build another agent for independent conversations.

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::agent::controller::{self, BlockingDriver, RunContext, StreamingDriver, TurnDriver};
use crate::agent::conversation::Conversation;
use crate::agent::loop_state::RunMetadata;
use crate::agent::prompt::build_system_prompt;
use crate::agent::stream::{ChunkSink, ChunkStream, StreamChunk};
use crate::core::{Config, Message, ReagentError, Result};
use crate::llm::{create_provider, LLMProvider};
use crate::memory::{self, Memory};
use crate::tools::{self, Tool, ToolRegistry};

const DEFAULT_MAX_ITERATIONS: usize = 10;
const DEFAULT_CHANNEL_CAPACITY: usize = 10;

/// Mutable per-session state, guarded by one lock
#[derive(Debug, Default)]
struct SessionState {
    conversation: Conversation,
    metadata: RunMetadata,
}

/// Main agent that orchestrates the model, tools, and conversation
#[derive(Clone)]
pub struct Agent {
    provider: Arc<dyn LLMProvider>,
    tools: Arc<ToolRegistry>,
    max_iterations: usize,
    debug: bool,
    channel_capacity: usize,
    session: Arc<Mutex<SessionState>>,
}

/// Builder for creating an [`Agent`]
pub struct AgentBuilder {
    provider: Arc<dyn LLMProvider>,
    tools: ToolRegistry,
    memory: Option<Arc<dyn Memory>>,
    conversation_id: Option<String>,
    max_iterations: usize,
    system_prompt: Option<String>,
    debug: bool,
    channel_capacity: usize,
}

impl AgentBuilder {
    /// Create a new builder around a model provider
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider,
            tools: ToolRegistry::new(),
            memory: None,
            conversation_id: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            system_prompt: None,
            debug: false,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Register one tool
    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.register(tool);
        self
    }

    /// Register several tools, in order
    pub fn tools(mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        for tool in tools {
            self.tools.register(tool);
        }
        self
    }

    /// Set the memory store
    pub fn memory(mut self, memory: Arc<dyn Memory>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Set the conversation id used for memory load/save
    pub fn conversation_id(mut self, id: impl Into<String>) -> Self {
        self.conversation_id = Some(id.into());
        self
    }

    /// Set maximum model calls per run
    pub fn max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Extra instructions added after the generated system prompt
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Forward raw deltas while streaming
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Capacity of the stream chunk channel
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Build the agent, loading stored history for the conversation
    pub async fn build(self) -> Result<Agent> {
        if self.max_iterations == 0 {
            return Err(ReagentError::config("max_iterations must be greater than 0"));
        }
        if self.channel_capacity == 0 {
            return Err(ReagentError::config("channel_capacity must be greater than 0"));
        }

        let mut conversation = Conversation::new(self.memory, self.conversation_id);
        conversation.add_system(build_system_prompt(&self.tools));
        if let Some(extra) = self.system_prompt.filter(|p| !p.trim().is_empty()) {
            conversation.add_system(extra);
        }
        conversation.load_history().await;

        info!(
            provider = self.provider.name(),
            model = self.provider.model(),
            tools = self.tools.len(),
            max_iterations = self.max_iterations,
            conversation = conversation.conversation_id().unwrap_or("-"),
            "Agent ready"
        );

        Ok(Agent {
            provider: self.provider,
            tools: Arc::new(self.tools),
            max_iterations: self.max_iterations,
            debug: self.debug,
            channel_capacity: self.channel_capacity,
            session: Arc::new(Mutex::new(SessionState {
                conversation,
                metadata: RunMetadata::default(),
            })),
        })
    }
}

impl Agent {
    /// Create a builder for more control
    pub fn builder(provider: Arc<dyn LLMProvider>) -> AgentBuilder {
        AgentBuilder::new(provider)
    }

    /// Create an agent from configuration: provider, command tools and memory
    pub async fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let provider = create_provider(&config.provider)?;
        let registry = tools::from_config(&config.tools);

        let mut builder = AgentBuilder::new(provider)
            .max_iterations(config.agent.max_iterations)
            .debug(config.agent.debug)
            .channel_capacity(config.agent.channel_capacity);
        builder.tools = registry;

        if let Some(memory) = memory::from_config(&config.memory) {
            builder = builder.memory(memory);
        }
        if let Some(ref id) = config.agent.conversation_id {
            builder = builder.conversation_id(id.clone());
        }
        if let Some(ref prompt) = config.agent.system_prompt {
            builder = builder.system_prompt(prompt.clone());
        }

        builder.build().await
    }

    /// Answer one message, running tools as the model asks
    pub async fn run(&self, input: &str) -> Result<String> {
        let mut session = self.session.lock().await;
        let mut driver = BlockingDriver;
        let result = self.run_session(&mut session, input, &mut driver).await;
        session.metadata.finish();
        result
    }

    /// [`run`](Self::run), abandoned as soon as `cancel` fires
    ///
    /// Messages appended before cancellation stay in the log and the run's
    /// end time is still recorded.
    pub async fn run_with_cancel(&self, input: &str, cancel: CancellationToken) -> Result<String> {
        let mut session = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ReagentError::Cancelled),
            session = self.session.lock() => session,
        };

        let mut driver = BlockingDriver;
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Run cancelled");
                Err(ReagentError::Cancelled)
            }
            result = self.run_session(&mut session, input, &mut driver) => result,
        };
        session.metadata.finish();
        result
    }

    /// One run on an already locked session; the caller records the end
    async fn run_session<D: TurnDriver>(
        &self,
        session: &mut SessionState,
        input: &str,
        driver: &mut D,
    ) -> Result<String> {
        let SessionState {
            conversation,
            metadata,
        } = session;

        metadata.start(conversation.conversation_id());
        conversation.add_user(input).await;

        let ctx = RunContext {
            provider: self.provider.as_ref(),
            tools: &self.tools,
            conversation,
            metadata,
            max_iterations: self.max_iterations,
        };
        controller::drive(ctx, driver).await
    }

    /// Answer one message as a stream of chunks
    ///
    /// Must be called inside a tokio runtime. Dropping the stream cancels
    /// the run.
    pub fn stream(&self, input: impl Into<String>) -> ChunkStream {
        self.stream_with_cancel(input, CancellationToken::new())
    }

    /// [`stream`](Self::stream) with an external cancellation token
    pub fn stream_with_cancel(
        &self,
        input: impl Into<String>,
        cancel: CancellationToken,
    ) -> ChunkStream {
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let sink = ChunkSink::new(tx);
        let agent = self.clone();
        let input = input.into();

        tokio::spawn(async move {
            let outcome = agent.stream_run(&input, sink.clone(), cancel).await;

            let last = match outcome {
                Ok(()) => StreamChunk::Done,
                Err(e) => {
                    if matches!(e, ReagentError::Cancelled) {
                        debug!("Stream cancelled");
                    } else {
                        warn!(error = %e, "Stream ended with an error");
                    }
                    StreamChunk::Error(e)
                }
            };
            // the receiver may already be gone
            let _ = sink.send(last).await;
        });

        ChunkStream::new(rx)
    }

    /// Body of a streamed run; a closed sink counts as cancellation
    async fn stream_run(&self, input: &str, sink: ChunkSink, cancel: CancellationToken) -> Result<()> {
        let mut session = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ReagentError::Cancelled),
            _ = sink.closed() => return Err(ReagentError::Cancelled),
            session = self.session.lock() => session,
        };

        let mut driver = StreamingDriver::new(sink.clone(), self.debug);
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ReagentError::Cancelled),
            _ = sink.closed() => Err(ReagentError::Cancelled),
            result = self.run_session(&mut session, input, &mut driver) => result,
        };
        session.metadata.finish();
        result.map(|_| ())
    }

    /// Switch to another conversation, keeping only the system prompt
    ///
    /// History for the new id is loaded from memory; an empty id stops
    /// persistence.
    pub async fn set_conversation_id(&self, id: impl Into<String>) {
        let id = id.into();
        info!(conversation = %id, "Switching conversation");
        self.session
            .lock()
            .await
            .conversation
            .switch_conversation(Some(id))
            .await;
    }

    /// Forget the current conversation, in memory and in the log
    pub async fn clear_history(&self) {
        self.session.lock().await.conversation.clear().await;
    }

    /// Copy of the message log
    pub async fn messages(&self) -> Vec<Message> {
        self.session.lock().await.conversation.snapshot()
    }

    /// Bookkeeping of the last run
    pub async fn metadata(&self) -> RunMetadata {
        self.session.lock().await.metadata.clone()
    }

    pub async fn conversation_id(&self) -> Option<String> {
        self.session
            .lock()
            .await
            .conversation
            .conversation_id()
            .map(str::to_string)
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn provider(&self) -> &Arc<dyn LLMProvider> {
        &self.provider
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("provider", &self.provider.name())
            .field("model", &self.provider.model())
            .field("tools", &self.tools)
            .field("max_iterations", &self.max_iterations)
            .field("debug", &self.debug)
            .finish()
    }
}
