//! Info command.

use std::path::PathBuf;

use agentdeck_client::DeckConfig;
use agentdeck_store::{FileStore, RECENT_AGENTS_KEY};

use super::format_size;

/// Show configuration and where things are stored.
pub(crate) fn run(config: &DeckConfig) -> miette::Result<()> {
    println!("agentdeck {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Configuration:");
    println!("  Server URL:      {}", config.base_url);
    println!("  Probe timeout:   {:?}", config.probe_timeout);
    match config.stream_timeout {
        Some(timeout) => println!("  Stream timeout:  {:?}", timeout),
        None => println!("  Stream timeout:  none"),
    }
    println!("  Keep history:    {}", config.keep_history);
    println!();

    let store = FileStore::in_data_dir(&config.data_dir);
    let keys = store
        .keys()
        .map_err(|e| miette::miette!("Failed to read store: {}", e))?;
    let size = store
        .size_bytes()
        .map_err(|e| miette::miette!("Failed to read store: {}", e))?;

    let presets = keys.iter().filter(|k| k.starts_with("agent_config_")).count();
    let transcripts = keys.iter().filter(|k| k.starts_with("chat_")).count();

    println!("Local store:");
    println!("  Directory:       {}", store.dir().display());
    println!("  Entries:         {} ({})", keys.len(), format_size(size));
    println!("  Presets:         {}", presets);
    println!("  Transcripts:     {}", transcripts);
    println!(
        "  Recent list:     {}",
        keys.iter().any(|k| k == RECENT_AGENTS_KEY)
    );
    println!();

    println!("Models are stored by the server in:");
    println!("  {}", server_models_dir().display());
    println!("  (set OLLAMA_MODELS before starting the server to change it)");

    Ok(())
}

/// Default model directory of the server, unless overridden by `OLLAMA_MODELS`.
fn server_models_dir() -> PathBuf {
    std::env::var("OLLAMA_MODELS")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".ollama")
                .join("models")
        })
}
