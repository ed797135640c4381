//! Connectivity check.

use agentdeck_client::DeckConfig;

use crate::session::SessionError;

/// Probe the server and summarize what is installed.
pub(crate) async fn run(config: &DeckConfig) -> miette::Result<()> {
    let mut session = super::open(config);

    match session.connect().await {
        Ok(catalog) => {
            println!("Model server: {} (connected)", config.base_url);
            println!("  Base models: {}", catalog.base_models.len());
            println!("  Agents:      {}", catalog.agents.len());
            Ok(())
        }
        Err(SessionError::Offline) => {
            println!("Model server: {} (not reachable)", config.base_url);
            println!();
            println!("Start it with:");
            println!("  ollama serve");
            Err(miette::miette!("Model server is not reachable"))
        }
        Err(e) => Err(miette::miette!("Failed to list models: {}", e)),
    }
}
