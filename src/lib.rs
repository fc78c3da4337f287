//! reagent - a ReAct agent engine
//!
//! Lets a caller converse with a language model that can invoke tools mid
//! conversation and resume reasoning with their output. Tool calls are JSON
//! objects embedded in the model's text; when streaming, narration reaches
//! the caller as it arrives while action payloads are held back.
//!
//! # Architecture
//!
//! - **Core**: Shared types, configuration, and error handling
//! - **LLM**: Provider abstraction with Ollama and OpenAI-compatible clients
//! - **Tools**: Tool contract, registry, and the command-line tool adapter
//! - **Memory**: Conversation persistence (in-process buffer, JSON files)
//! - **Agent**: The loop, action codec, delivery controller, and session
//! - **CLI**: Command-line interface and REPL
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use reagent::llm::OllamaClient;
//! use reagent::Agent;
//!
//! #[tokio::main]
//! async fn main() -> reagent::Result<()> {
//!     let provider = Arc::new(OllamaClient::with_base_url("http://localhost:11434", "qwen3:8b")?);
//!     let agent = Agent::builder(provider).max_iterations(5).build().await?;
//!
//!     let answer = agent.run("What is the capital of France?").await?;
//!     println!("{}", answer);
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod core;
pub mod llm;
pub mod memory;
pub mod tools;

// Re-export commonly used items
pub use agent::{Agent, AgentBuilder, StreamChunk};
pub use cli::Repl;
pub use core::{Config, ReagentError, Result};
