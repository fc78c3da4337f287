//! CLI commands
//!
//! Special commands that can be executed in the REPL.

use crate::agent::Agent;
use crate::core::Result;

/// Result of parsing a command
pub enum CommandResult {
    /// Continue processing as normal input
    Continue(String),
    /// Command was handled, show output
    Handled(String),
    /// Exit the REPL
    Exit,
    /// Clear history
    Clear,
    /// Switch streaming output on or off
    SetStreaming(bool),
}

/// Parse and handle special commands
pub async fn handle_command(input: &str, agent: &Agent, streaming: bool) -> Result<CommandResult> {
    let input = input.trim();
    let (cmd, args) = match input.split_once(' ') {
        Some((cmd, args)) => (cmd.to_lowercase(), args.trim()),
        None => (input.to_lowercase(), ""),
    };

    match cmd.as_str() {
        "exit" | "quit" | "q" => Ok(CommandResult::Exit),

        "clear" | "reset" => {
            agent.clear_history().await;
            Ok(CommandResult::Clear)
        }

        "help" | "?" => Ok(CommandResult::Handled(help_text())),

        "models" => {
            let models = agent.provider().list_models().await?;
            let output = format!(
                "Available models:\n{}\n\nCurrent: {}",
                models
                    .iter()
                    .map(|m| format!("  - {}", m))
                    .collect::<Vec<_>>()
                    .join("\n"),
                agent.provider().model()
            );
            Ok(CommandResult::Handled(output))
        }

        "status" => Ok(CommandResult::Handled(status_text(agent, streaming).await)),

        "conversation" | "conv" => {
            if args.is_empty() {
                let current = agent.conversation_id().await;
                return Ok(CommandResult::Handled(format!(
                    "Conversation: {}\nUsage: conversation <id>",
                    current.as_deref().unwrap_or("(none)")
                )));
            }
            agent.set_conversation_id(args).await;
            let loaded = agent.messages().await.iter().filter(|m| !m.is_system()).count();
            Ok(CommandResult::Handled(format!(
                "Switched to conversation '{}' ({} messages loaded)",
                args, loaded
            )))
        }

        "history" => {
            let messages = agent.messages().await;
            let lines: Vec<String> = messages
                .iter()
                .filter(|m| !m.is_system())
                .map(|m| format!("[{}] {}", m.role, preview(&m.content, 120)))
                .collect();
            if lines.is_empty() {
                Ok(CommandResult::Handled("History is empty.".to_string()))
            } else {
                Ok(CommandResult::Handled(lines.join("\n")))
            }
        }

        "stream" => match args.to_lowercase().as_str() {
            "on" | "true" | "1" | "yes" => Ok(CommandResult::SetStreaming(true)),
            "off" | "false" | "0" | "no" => Ok(CommandResult::SetStreaming(false)),
            "" => Ok(CommandResult::SetStreaming(!streaming)),
            other => Ok(CommandResult::Handled(format!(
                "Unknown value: {}. Usage: stream <on|off>",
                other
            ))),
        },

        _ => {
            // Not a command, treat as normal input
            if input.starts_with('/') {
                Ok(CommandResult::Handled(format!(
                    "Unknown command: {}. Type 'help' for available commands.",
                    cmd
                )))
            } else {
                Ok(CommandResult::Continue(input.to_string()))
            }
        }
    }
}

async fn status_text(agent: &Agent, streaming: bool) -> String {
    let metadata = agent.metadata().await;
    let history = agent.messages().await.iter().filter(|m| !m.is_system()).count();
    let duration = metadata
        .duration()
        .map(|d| format!("{} ms", d.num_milliseconds()))
        .unwrap_or_else(|| "-".to_string());

    format!(
        "reagent Status:\n\
         ─────────────────────────────\n\
         Provider:     {} ({})\n\
         Tools:        {}\n\
         Conversation: {}\n\
         History:      {} messages\n\
         Streaming:    {}\n\
         Debug:        {}\n\
         Last run:     {} iterations, {} tokens, {}",
        agent.provider().name(),
        agent.provider().model(),
        if agent.tools().is_empty() {
            "none".to_string()
        } else {
            agent.tools().names().join(", ")
        },
        metadata.conversation_id.as_deref().unwrap_or("(none)"),
        history,
        if streaming { "on" } else { "off" },
        if agent.is_debug() { "on" } else { "off" },
        metadata.iterations,
        metadata.usage.total_tokens,
        duration,
    )
}

fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.replace('\n', " ");
    match flat.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &flat[..cut]),
        None => flat,
    }
}

/// Generate help text
fn help_text() -> String {
    r#"reagent Commands:
─────────────────────────────────────────────
  help, ?              Show this help message
  exit, quit, q        Exit reagent
  clear, reset         Clear conversation history
  status               Show provider, tools and last run
  models               List models known to the provider
  history              Show the conversation so far
  conversation <id>    Switch to another conversation
  stream <on|off>      Toggle streaming output

Keyboard Shortcuts:
  Ctrl+C           Cancel the current answer
  Ctrl+D           Exit reagent
─────────────────────────────────────────────"#
        .to_string()
}
