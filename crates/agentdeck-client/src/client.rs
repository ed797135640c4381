//! HTTP client for the Ollama API.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

use crate::api::{ModelApi, UpdateFn};
use crate::config::DeckConfig;
use crate::error::ClientError;
use crate::stream::{read_stream, StreamAccumulator, StreamFailure};
use crate::types::{
    ChatMessage, ChatRequest, CreateRequest, ErrorBody, ModelSummary, NameRequest, PullRequest,
    ShowResponse, TagsResponse,
};
use crate::{DEFAULT_OLLAMA_URL, DEFAULT_PROBE_TIMEOUT_SECS};

/// Client for a local Ollama server.
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    probe_timeout: Duration,
    stream_timeout: Option<Duration>,
}

impl OllamaClient {
    /// Create a new client with default settings.
    pub fn new() -> Self {
        Self::with_url(DEFAULT_OLLAMA_URL)
    }

    /// Create a new client with a custom URL.
    pub fn with_url(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            probe_timeout: Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS),
            stream_timeout: None,
        }
    }

    /// Create a client from configuration.
    pub fn from_config(config: &DeckConfig) -> Self {
        Self::with_url(config.base_url.clone())
            .with_probe_timeout(config.probe_timeout)
            .with_stream_timeout(config.stream_timeout)
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_stream_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stream_timeout = timeout;
        self
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn send_error(&self, e: reqwest::Error) -> ClientError {
        if e.is_connect() || e.is_timeout() {
            ClientError::Unreachable(self.base_url.clone())
        } else {
            ClientError::Http(e)
        }
    }

    /// Turn a non-success response into [`ClientError::Status`], using the
    /// server's `{"error": ...}` body as the message when there is one.
    async fn check_status(
        &self,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|body| body.error)
            .unwrap_or(text);
        Err(ClientError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn post_stream<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
        on_update: &mut UpdateFn<'_>,
    ) -> Result<StreamAccumulator, StreamFailure> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| StreamFailure::before_start(self.send_error(e)))?;
        let response = self
            .check_status(response)
            .await
            .map_err(StreamFailure::before_start)?;

        let acc = read_stream(response.bytes_stream(), self.stream_timeout, on_update).await?;
        debug!(
            "Stream from {} finished: {} records, {} skipped",
            path, acc.records, acc.skipped
        );
        Ok(acc)
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelApi for OllamaClient {
    async fn probe(&self) -> bool {
        let result = self
            .client
            .get(self.url("/api/tags"))
            .timeout(self.probe_timeout)
            .send()
            .await;
        match result {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("Probe of {} failed: {}", self.base_url, e);
                false
            }
        }
    }

    async fn list_models(&self) -> Result<Vec<ModelSummary>, ClientError> {
        let response = self
            .client
            .get(self.url("/api/tags"))
            .send()
            .await
            .map_err(|e| self.send_error(e))?;
        let response = self.check_status(response).await?;

        let tags: TagsResponse = response.json().await?;
        debug!("Server reported {} models", tags.models.len());
        Ok(tags.models)
    }

    async fn show(&self, name: &str) -> Result<ShowResponse, ClientError> {
        let response = self
            .client
            .post(self.url("/api/show"))
            .json(&NameRequest { name })
            .send()
            .await
            .map_err(|e| self.send_error(e))?;
        let response = self.check_status(response).await?;
        Ok(response.json().await?)
    }

    async fn create_model(&self, name: &str, modelfile: &str) -> Result<(), ClientError> {
        info!("Creating model '{}'", name);
        let response = self
            .client
            .post(self.url("/api/create"))
            .json(&CreateRequest {
                name,
                modelfile,
                stream: false,
            })
            .send()
            .await
            .map_err(|e| self.send_error(e))?;
        self.check_status(response).await?;
        Ok(())
    }

    async fn delete_model(&self, name: &str) -> Result<(), ClientError> {
        info!("Deleting model '{}'", name);
        let response = self
            .client
            .delete(self.url("/api/delete"))
            .json(&NameRequest { name })
            .send()
            .await
            .map_err(|e| self.send_error(e))?;
        self.check_status(response).await?;
        Ok(())
    }

    async fn pull(
        &self,
        name: &str,
        on_update: &mut UpdateFn<'_>,
    ) -> Result<StreamAccumulator, StreamFailure> {
        info!("Pulling model '{}'", name);
        let body = PullRequest { name, stream: true };
        self.post_stream("/api/pull", &body, on_update).await
    }

    async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        on_update: &mut UpdateFn<'_>,
    ) -> Result<StreamAccumulator, StreamFailure> {
        debug!("Chatting with '{}' ({} messages)", model, messages.len());
        let body = ChatRequest {
            model,
            messages,
            stream: true,
        };
        self.post_stream("/api/chat", &body, on_update).await
    }
}
