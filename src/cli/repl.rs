//! Interactive REPL for reagent
//!
//! Provides the main user interaction loop.

use futures::StreamExt;
use std::io::{self, BufRead, Write};
use tokio_util::sync::CancellationToken;

use crate::agent::{Agent, StreamChunk};
use crate::cli::commands::{handle_command, CommandResult};
use crate::core::{Config, ReagentError, Result};

/// Interactive REPL (Read-Eval-Print Loop)
pub struct Repl {
    agent: Agent,
    streaming: bool,
}

impl Repl {
    /// Create a REPL around an existing agent
    pub fn new(agent: Agent, streaming: bool) -> Self {
        Self { agent, streaming }
    }

    /// Create a REPL with custom configuration
    pub async fn with_config(config: &Config, streaming: bool) -> Result<Self> {
        Ok(Self::new(Agent::from_config(config).await?, streaming))
    }

    /// Run the REPL
    pub async fn run(&mut self) -> Result<()> {
        self.print_banner();

        let stdin = io::stdin();
        let mut stdout = io::stdout();

        loop {
            // Print prompt
            print!("You: ");
            stdout.flush()?;

            // Read input
            let mut input = String::new();
            match stdin.lock().read_line(&mut input) {
                Ok(0) => {
                    // EOF (Ctrl+D)
                    println!("\nGoodbye!");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    eprintln!("Error reading input: {}", e);
                    continue;
                }
            }

            let input = input.trim();

            if input.is_empty() {
                continue;
            }

            // Handle commands
            match handle_command(input, &self.agent, self.streaming).await {
                Ok(CommandResult::Exit) => {
                    println!("\nGoodbye!");
                    break;
                }
                Ok(CommandResult::Clear) => {
                    println!("Conversation cleared.\n");
                }
                Ok(CommandResult::Handled(output)) => {
                    println!("{}\n", output);
                }
                Ok(CommandResult::SetStreaming(enabled)) => {
                    self.streaming = enabled;
                    println!("Streaming: {}\n", if enabled { "on" } else { "off" });
                }
                Ok(CommandResult::Continue(input)) => {
                    if let Err(e) = self.answer(&input).await {
                        eprintln!("\nError: {}\n", e);
                    }
                }
                Err(e) => {
                    eprintln!("Command error: {}\n", e);
                }
            }
        }

        Ok(())
    }

    /// Answer one input, cancelling on Ctrl+C
    async fn answer(&self, input: &str) -> Result<()> {
        let cancel = CancellationToken::new();
        let watcher = cancel.clone();
        let ctrl_c = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                watcher.cancel();
            }
        });

        let result = if self.streaming {
            println!("\nAssistant:");
            print_stream(&self.agent, input, cancel).await
        } else {
            self.agent
                .run_with_cancel(input, cancel)
                .await
                .map(|answer| println!("\nAssistant:\n{}\n", answer))
        };

        ctrl_c.abort();
        match result {
            Err(ReagentError::Cancelled) => {
                println!("\n[cancelled]\n");
                Ok(())
            }
            other => other,
        }
    }

    /// Print the startup banner
    fn print_banner(&self) {
        println!();
        println!("reagent - ReAct agent");
        println!(
            "Provider:   {} ({})",
            self.agent.provider().name(),
            self.agent.provider().model()
        );
        if self.agent.tools().is_empty() {
            println!("Tools:      none");
        } else {
            println!("Tools:      {}", self.agent.tools().names().join(", "));
        }
        println!();
        println!("Commands: help, clear, status, models, history, conversation, stream, exit");
        println!("─────────────────────────────────────────────");
    }
}

/// Stream one answer to stdout, rendering tool activity on its own lines
pub async fn print_stream(agent: &Agent, input: &str, cancel: CancellationToken) -> Result<()> {
    let mut stream = agent.stream_with_cancel(input, cancel);
    let mut stdout = io::stdout();

    while let Some(chunk) = stream.next().await {
        match chunk {
            StreamChunk::Reasoning(text) => {
                if agent.is_debug() {
                    print!("\x1b[2m{}\x1b[0m", text);
                }
            }
            StreamChunk::Content(text) => print!("{}", text),
            StreamChunk::ToolCall(call) => println!("\n→ {}", call),
            StreamChunk::ToolResult(result) => println!("← {}", result),
            StreamChunk::ToolDelimiter => println!(),
            StreamChunk::Done => {
                println!("\n");
                return Ok(());
            }
            StreamChunk::Error(e) => return Err(e),
        }
        stdout.flush()?;
    }

    Ok(())
}
