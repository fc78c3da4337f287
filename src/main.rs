//! reagent - ReAct agent CLI
//!
//! Main entry point for the CLI application.

use clap::Parser;
use reagent::core::config::ProviderKind;
use reagent::{Agent, Config, Repl};
use tokio_util::sync::CancellationToken;

/// reagent - chat with a model that can call tools
#[derive(Parser, Debug)]
#[command(name = "reagent")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Single prompt mode (non-interactive)
    #[arg(long, short = 'p')]
    prompt: Option<String>,

    /// Stream the answer as it is generated
    #[arg(long, short = 's')]
    stream: bool,

    /// Enable debug output (raw deltas while streaming, debug logs)
    #[arg(long, short = 'd')]
    debug: bool,

    /// Model name
    #[arg(long, short = 'm')]
    model: Option<String>,

    /// Provider: ollama or openai
    #[arg(long)]
    provider: Option<ProviderKind>,

    /// Conversation id for memory
    #[arg(long, short = 'c')]
    conversation: Option<String>,

    /// Maximum model calls per answer
    #[arg(long)]
    max_iterations: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = if args.debug { "reagent=debug" } else { "reagent=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Build configuration
    let mut config = Config::load();

    // Apply CLI overrides
    if let Some(kind) = args.provider {
        config.provider.kind = kind;
    }

    if let Some(model) = args.model {
        config.provider.model = model;
    }

    if let Some(id) = args.conversation {
        config.agent.conversation_id = Some(id);
    }

    if let Some(max) = args.max_iterations {
        config.agent.max_iterations = max;
    }

    if args.debug {
        config.agent.debug = true;
    }

    // Single prompt mode
    if let Some(prompt) = args.prompt {
        let agent = Agent::from_config(&config).await?;

        if args.stream {
            reagent::cli::print_stream(&agent, &prompt, CancellationToken::new()).await?;
        } else {
            let response = agent.run(&prompt).await?;
            println!("{}", response);
        }
        return Ok(());
    }

    // Interactive REPL mode
    let mut repl = Repl::with_config(&config, args.stream).await?;
    repl.run().await?;

    Ok(())
}
