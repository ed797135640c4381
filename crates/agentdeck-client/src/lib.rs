//! Client side of a local model server (Ollama-compatible HTTP API).
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │   OllamaClient  │ --> │  NDJSON reader  │ --> │ StreamAccumulator│
//! │  (reqwest/HTTP) │     │ (chunk → lines) │     │ (text, progress)│
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//!          │
//!    ┌─────┴─────┐
//!    │  Catalog  │  base models / agents
//!    └───────────┘
//! ```
//!
//! The session layer talks to the server through the [`ModelApi`] trait so
//! that a scripted backend can stand in for the network in tests.

mod api;
mod catalog;
mod client;
mod config;
mod error;
pub mod stream;
mod types;

pub use api::{ModelApi, UpdateFn};
pub use catalog::{
    associate_base_model, is_base_model, model_aliases, refresh_catalog, strip_tag, Agent,
    Catalog, BASE_MODEL_PREFIXES, UNKNOWN_BASE_MODEL,
};
pub use client::OllamaClient;
pub use config::{default_data_dir, DeckConfig, DeckConfigBuilder};
pub use error::ClientError;
pub use stream::{
    progress_percent, read_stream, NdjsonDecoder, RecordFacet, StreamAccumulator, StreamFailure,
    StreamReader, StreamRecord,
};
pub use types::{ChatMessage, ChatRole, ModelSummary, ShowResponse};

/// Default Ollama server URL.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Timeout for the connectivity probe, in seconds.
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;
