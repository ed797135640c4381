//! CLI commands.

pub mod agents;
pub mod chat;
pub mod info;
pub mod models;
pub mod status;

use std::path::PathBuf;

use agentdeck_client::{DeckConfig, OllamaClient};
use agentdeck_store::FileStore;

use crate::session::Session;

pub(crate) type DeckSession = Session<OllamaClient, FileStore>;

/// Environment configuration with command-line overrides applied.
pub(crate) fn load_config(url: Option<String>, data_dir: Option<PathBuf>) -> DeckConfig {
    let mut config = DeckConfig::from_env();
    if let Some(url) = url {
        config = DeckConfig::builder()
            .base_url(url)
            .data_dir(config.data_dir)
            .stream_timeout(config.stream_timeout)
            .keep_history(config.keep_history)
            .build();
    }
    if let Some(dir) = data_dir {
        config.data_dir = dir;
    }
    config
}

/// Open a session without contacting the server.
pub(crate) fn open(config: &DeckConfig) -> DeckSession {
    Session::new(
        OllamaClient::from_config(config),
        FileStore::in_data_dir(&config.data_dir),
        config.keep_history,
    )
}

/// Open a session and load the model list.
pub(crate) async fn connect(config: &DeckConfig) -> miette::Result<DeckSession> {
    let mut session = open(config);
    session.connect().await.map_err(|e| {
        miette::miette!(
            "Cannot connect to the model server at {}: {}\nIs it running? Start it with: ollama serve",
            config.base_url,
            e
        )
    })?;
    Ok(session)
}

/// Human-readable age of a millisecond timestamp.
pub(crate) fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms).max(0);
    let minutes = diff / 60_000;
    let hours = diff / 3_600_000;
    let days = diff / 86_400_000;

    if minutes < 1 {
        "just now".to_string()
    } else if minutes < 60 {
        format!("{} min ago", minutes)
    } else if hours < 24 {
        format!("{} h ago", hours)
    } else {
        format!("{} d ago", days)
    }
}

/// Human-readable byte size.
pub(crate) fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_time() {
        let now = 10 * 86_400_000;
        assert_eq!(format_relative_time(now - 30_000, now), "just now");
        assert_eq!(format_relative_time(now - 5 * 60_000, now), "5 min ago");
        assert_eq!(format_relative_time(now - 3 * 3_600_000, now), "3 h ago");
        assert_eq!(format_relative_time(now - 2 * 86_400_000, now), "2 d ago");
        // Clock skew never yields a negative age.
        assert_eq!(format_relative_time(now + 5_000, now), "just now");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(4 * 1024 * 1024 * 1024), "4.0 GB");
    }

    #[test]
    fn test_load_config_overrides() {
        let config = load_config(
            Some("127.0.0.1:9999".to_string()),
            Some(PathBuf::from("/tmp/deck")),
        );
        assert_eq!(config.base_url, "http://127.0.0.1:9999");
        assert_eq!(config.data_dir, PathBuf::from("/tmp/deck"));
    }
}
