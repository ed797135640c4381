//! The operations the session layer needs from a model server.

use async_trait::async_trait;

use crate::error::ClientError;
use crate::stream::{StreamAccumulator, StreamFailure, StreamRecord};
use crate::types::{ChatMessage, ModelSummary, ShowResponse};

/// Callback invoked after every record of a streamed response.
pub type UpdateFn<'a> = dyn FnMut(&StreamRecord, &StreamAccumulator) + Send + 'a;

/// Model server operations.
///
/// [`OllamaClient`](crate::OllamaClient) implements this over HTTP.
#[async_trait]
pub trait ModelApi: Send + Sync {
    /// Whether the server answers within the probe timeout.
    async fn probe(&self) -> bool;

    /// List installed models.
    async fn list_models(&self) -> Result<Vec<ModelSummary>, ClientError>;

    /// Fetch a model's definition.
    async fn show(&self, name: &str) -> Result<ShowResponse, ClientError>;

    /// Create (or replace) a model from a definition document.
    async fn create_model(&self, name: &str, modelfile: &str) -> Result<(), ClientError>;

    /// Delete a model by name.
    async fn delete_model(&self, name: &str) -> Result<(), ClientError>;

    /// Pull a model, reporting progress records as they arrive.
    async fn pull(
        &self,
        name: &str,
        on_update: &mut UpdateFn<'_>,
    ) -> Result<StreamAccumulator, StreamFailure>;

    /// Chat with a model, reporting text fragments as they arrive.
    async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        on_update: &mut UpdateFn<'_>,
    ) -> Result<StreamAccumulator, StreamFailure>;
}
