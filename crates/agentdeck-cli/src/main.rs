//! agentdeck CLI - agents and chats on top of a local model server.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod session;

/// agentdeck - named presets and chats for a local Ollama server
#[derive(Parser)]
#[command(name = "agentdeck")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Model server URL (default: $AGENTDECK_OLLAMA_URL, $OLLAMA_HOST or http://localhost:11434)
    #[arg(long, global = true)]
    url: Option<String>,

    /// Directory for saved presets and transcripts (default: ~/.agentdeck)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether the model server is reachable
    Status,

    /// List installed base models
    Models,

    /// List agents
    Agents,

    /// Show recently used agents
    Recent,

    /// Show an agent's preset
    Show {
        /// Agent name
        agent: String,
    },

    /// Create an agent from a base model
    Create {
        /// Display name of the agent
        name: String,
        /// Base model to build on
        #[arg(short, long)]
        base: String,
        /// System prompt
        #[arg(short, long)]
        system: Option<String>,
        /// Generation parameter as key=value (repeatable)
        #[arg(short, long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,
    },

    /// Change an existing agent
    Edit {
        /// Agent name
        agent: String,
        /// New display name
        #[arg(short, long)]
        name: Option<String>,
        /// New base model
        #[arg(short, long)]
        base: Option<String>,
        /// New system prompt
        #[arg(short, long)]
        system: Option<String>,
        /// Generation parameter as key=value (repeatable)
        #[arg(short, long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,
    },

    /// Delete an agent and its saved data
    Delete {
        /// Agent name
        agent: String,
    },

    /// Delete an installed base model
    DeleteBase {
        /// Model name
        model: String,
    },

    /// Download a model
    Pull {
        /// Model name, e.g. qwen2:7b
        model: String,
    },

    /// Chat with an agent
    Chat {
        /// Agent name (default: the last used agent)
        agent: Option<String>,
        /// Send a single message and exit
        #[arg(short, long)]
        message: Option<String>,
        /// Send only the latest message, without the transcript
        #[arg(long)]
        no_history: bool,
    },

    /// Print or clear an agent's transcript
    History {
        /// Agent name
        agent: String,
        /// Delete the transcript
        #[arg(long)]
        clear: bool,
    },

    /// Show configuration and storage information
    Info,
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose { "debug" } else { "warn" };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    let config = commands::load_config(cli.url, cli.data_dir);

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| miette::miette!("Failed to start async runtime: {}", e))?;

    runtime.block_on(async {
        match cli.command {
            Commands::Status => commands::status::run(&config).await,
            Commands::Models => commands::models::list(&config).await,
            Commands::Agents => commands::agents::list(&config).await,
            Commands::Recent => commands::agents::recent(&config),
            Commands::Show { agent } => commands::agents::show(&config, &agent).await,
            Commands::Create {
                name,
                base,
                system,
                params,
            } => commands::agents::create(&config, &name, &base, system.as_deref(), &params).await,
            Commands::Edit {
                agent,
                name,
                base,
                system,
                params,
            } => {
                let changes = commands::agents::AgentChanges {
                    display_name: name,
                    base_model: base,
                    system_prompt: system,
                    params,
                };
                commands::agents::edit(&config, &agent, changes).await
            }
            Commands::Delete { agent } => commands::agents::delete(&config, &agent).await,
            Commands::DeleteBase { model } => commands::models::delete(&config, &model).await,
            Commands::Pull { model } => commands::models::pull(&config, &model).await,
            Commands::Chat {
                agent,
                message,
                no_history,
            } => {
                commands::chat::run(&config, agent.as_deref(), message.as_deref(), no_history)
                    .await
            }
            Commands::History { agent, clear } => commands::chat::history(&config, &agent, clear),
            Commands::Info => commands::info::run(&config),
        }
    })
}
