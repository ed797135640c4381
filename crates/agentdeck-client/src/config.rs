//! Client configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::{DEFAULT_OLLAMA_URL, DEFAULT_PROBE_TIMEOUT_SECS};

/// Configuration shared by the client, the store and the CLI.
#[derive(Debug, Clone)]
pub struct DeckConfig {
    /// Model server base URL (default: http://localhost:11434)
    pub base_url: String,
    /// Directory holding saved presets and transcripts
    pub data_dir: PathBuf,
    /// Bounded wait for the connectivity probe
    pub probe_timeout: Duration,
    /// Idle timeout between chunks of a streamed response; `None` waits forever
    pub stream_timeout: Option<Duration>,
    /// Send the whole transcript with each chat message
    pub keep_history: bool,
}

impl Default for DeckConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            data_dir: default_data_dir(),
            probe_timeout: Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS),
            stream_timeout: None,
            keep_history: true,
        }
    }
}

impl DeckConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let base_url = std::env::var("AGENTDECK_OLLAMA_URL")
            .or_else(|_| std::env::var("OLLAMA_HOST"))
            .map(|url| normalize_url(&url))
            .unwrap_or_else(|_| DEFAULT_OLLAMA_URL.to_string());

        let data_dir = std::env::var("AGENTDECK_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_data_dir());

        let stream_timeout = std::env::var("AGENTDECK_STREAM_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        let keep_history = std::env::var("AGENTDECK_KEEP_HISTORY")
            .map(|v| !(v == "0" || v.to_lowercase() == "false"))
            .unwrap_or(true);

        Self {
            base_url,
            data_dir,
            probe_timeout: Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS),
            stream_timeout,
            keep_history,
        }
    }

    /// Create a builder for configuration.
    pub fn builder() -> DeckConfigBuilder {
        DeckConfigBuilder::default()
    }
}

/// Builder for [`DeckConfig`].
#[derive(Debug, Default)]
pub struct DeckConfigBuilder {
    config: DeckConfig,
}

impl DeckConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = normalize_url(&url.into());
        self
    }

    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.config.probe_timeout = timeout;
        self
    }

    pub fn stream_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.stream_timeout = timeout;
        self
    }

    pub fn keep_history(mut self, keep: bool) -> Self {
        self.config.keep_history = keep;
        self
    }

    pub fn build(self) -> DeckConfig {
        self.config
    }
}

/// Get the agentdeck data directory (~/.agentdeck/).
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".agentdeck")
}

/// `OLLAMA_HOST` is often given as a bare `host:port`.
fn normalize_url(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("http://{}", url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DeckConfig::default();
        assert_eq!(config.base_url, DEFAULT_OLLAMA_URL);
        assert_eq!(config.probe_timeout, Duration::from_secs(5));
        assert!(config.stream_timeout.is_none());
        assert!(config.keep_history);
        assert!(config.data_dir.ends_with(".agentdeck"));
    }

    #[test]
    fn test_builder() {
        let config = DeckConfig::builder()
            .base_url("127.0.0.1:11500/")
            .data_dir("/tmp/deck")
            .stream_timeout(Some(Duration::from_secs(30)))
            .keep_history(false)
            .build();
        assert_eq!(config.base_url, "http://127.0.0.1:11500");
        assert_eq!(config.data_dir, PathBuf::from("/tmp/deck"));
        assert_eq!(config.stream_timeout, Some(Duration::from_secs(30)));
        assert!(!config.keep_history);
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("https://gpu-box:11434"), "https://gpu-box:11434");
        assert_eq!(normalize_url(" localhost:11434 "), "http://localhost:11434");
    }
}
