//! Agent module - orchestration and conversation management
//!
//! Contains the ReAct loop that coordinates model calls and tool execution,
//! the action codec, and the incremental delivery used when streaming.

pub mod action;
pub mod controller;
pub mod conversation;
pub mod delivery;
pub mod loop_state;
pub mod orchestrator;
pub mod prompt;
pub mod stream;

pub use action::{Action, MARKER};
pub use conversation::Conversation;
pub use delivery::DeliveryBuffer;
pub use loop_state::{LoopPhase, LoopState, RunMetadata};
pub use orchestrator::{Agent, AgentBuilder};
pub use stream::{ChunkStream, StreamChunk, ToolCallReport};
