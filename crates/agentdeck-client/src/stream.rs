//! Incremental reader for newline-delimited JSON response bodies.
//!
//! The streaming endpoints (chat, pull) answer with one JSON object per
//! line over a chunked body. Chunks may end anywhere, including in the middle
//! of a multi-byte UTF-8 character, so decoding is done in two stages:
//!
//! 1. [`NdjsonDecoder`] turns raw byte chunks into complete text lines.
//! 2. [`StreamRecord::parse`] decodes one line into the facets it carries,
//!    which [`StreamAccumulator::apply`] folds into running state.
//!
//! A line that is not valid JSON is skipped; it never aborts the stream.

use std::time::Duration;

use futures_util::{pin_mut, Stream, StreamExt};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::error::ClientError;

/// Splits a byte stream into UTF-8 text lines.
#[derive(Debug, Default)]
pub struct NdjsonDecoder {
    /// Trailing bytes of an incomplete UTF-8 sequence.
    pending: Vec<u8>,
    /// Decoded text not yet terminated by a newline.
    buffer: String,
}

impl NdjsonDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        self.decode_pending();

        let mut lines = Vec::new();
        while let Some(end) = self.buffer.find('\n') {
            let mut line: String = self.buffer.drain(..=end).collect();
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
            lines.push(line);
        }
        lines
    }

    /// Flush whatever is left once the body has ended.
    pub fn finish(&mut self) -> Option<String> {
        if !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            self.buffer.push_str(&String::from_utf8_lossy(&rest));
        }
        let line = std::mem::take(&mut self.buffer);
        if line.trim().is_empty() {
            None
        } else {
            Some(line.trim_end_matches('\r').to_string())
        }
    }

    /// Move every complete character from `pending` into `buffer`.
    ///
    /// Invalid sequences become U+FFFD; an incomplete sequence at the end is
    /// kept for the next chunk.
    fn decode_pending(&mut self) {
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    self.pending.clear();
                    return;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    let text = std::str::from_utf8(&self.pending[..valid]).unwrap_or_default();
                    self.buffer.push_str(text);
                    match e.error_len() {
                        Some(bad) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + bad);
                        }
                        None => {
                            self.pending.drain(..valid);
                            return;
                        }
                    }
                }
            }
        }
    }
}

/// One recognized field of a streamed record.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordFacet {
    /// `message.content`: a fragment of assistant text.
    Content(String),
    /// `status`: a human-readable progress label.
    Status(String),
    /// `completed` / `total`: byte counters of a pull or create.
    Progress {
        completed: Option<u64>,
        total: Option<u64>,
    },
    /// `digest`: the layer currently being transferred.
    Digest(String),
    /// `error`: the server gave up on the request.
    Error(String),
    /// `done: true`: final record of a chat response.
    Done,
}

/// A decoded line, as the facets it carried in the order they are applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamRecord {
    pub facets: Vec<RecordFacet>,
}

impl StreamRecord {
    /// Decode one line.
    ///
    /// Returns `Ok(None)` for blank lines and an error for lines that are not
    /// JSON. Fields are read by presence; unknown fields are ignored, and a
    /// field with an unexpected type is treated as absent.
    pub fn parse(line: &str) -> Result<Option<Self>, serde_json::Error> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let value: Value = serde_json::from_str(line)?;
        Ok(Some(Self::from_value(&value)))
    }

    /// Decode an already parsed JSON value.
    pub fn from_value(value: &Value) -> Self {
        let mut facets = Vec::new();

        if let Some(error) = value.get("error").and_then(Value::as_str) {
            facets.push(RecordFacet::Error(error.to_string()));
        }
        if let Some(content) = value
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(Value::as_str)
        {
            if !content.is_empty() {
                facets.push(RecordFacet::Content(content.to_string()));
            }
        }
        if let Some(status) = value.get("status").and_then(Value::as_str) {
            facets.push(RecordFacet::Status(status.to_string()));
        }
        if let Some(digest) = value.get("digest").and_then(Value::as_str) {
            facets.push(RecordFacet::Digest(digest.to_string()));
        }
        let completed = value.get("completed").and_then(Value::as_u64);
        let total = value.get("total").and_then(Value::as_u64);
        if completed.is_some() || total.is_some() {
            facets.push(RecordFacet::Progress { completed, total });
        }
        if value.get("done").and_then(Value::as_bool) == Some(true) {
            facets.push(RecordFacet::Done);
        }

        Self { facets }
    }

    pub fn is_empty(&self) -> bool {
        self.facets.is_empty()
    }

    /// Text fragment carried by this record, if any.
    pub fn content(&self) -> Option<&str> {
        self.facets.iter().find_map(|f| match f {
            RecordFacet::Content(text) => Some(text.as_str()),
            _ => None,
        })
    }
}

/// Percentage of `completed` over `total`, rounded and capped at 100;
/// `None` when `total` is 0.
pub fn progress_percent(completed: u64, total: u64) -> Option<u8> {
    if total == 0 {
        return None;
    }
    Some((completed as f64 / total as f64 * 100.0).round().min(100.0) as u8)
}

/// Running state of one streamed response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamAccumulator {
    /// Concatenated assistant text.
    pub text: String,
    /// Latest status label.
    pub status: Option<String>,
    /// Latest layer digest.
    pub digest: Option<String>,
    pub completed: Option<u64>,
    pub total: Option<u64>,
    /// Derived from `completed` / `total`; absent while `total` is unknown or 0.
    pub percent: Option<u8>,
    /// Error reported by the server inside the stream.
    pub error: Option<String>,
    /// Whether a `done: true` record was seen.
    pub done: bool,
    /// Records applied so far.
    pub records: usize,
    /// Lines dropped because they were not JSON.
    pub skipped: usize,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one record into the running state.
    pub fn apply(&mut self, record: &StreamRecord) {
        for facet in &record.facets {
            match facet {
                RecordFacet::Content(text) => self.text.push_str(text),
                RecordFacet::Status(status) => self.status = Some(status.clone()),
                RecordFacet::Digest(digest) => {
                    // A new layer starts its own byte count.
                    if self.digest.as_deref() != Some(digest.as_str()) {
                        self.completed = None;
                        self.total = None;
                        self.percent = None;
                    }
                    self.digest = Some(digest.clone());
                }
                RecordFacet::Progress { completed, total } => {
                    // The server omits `completed` while it is still 0.
                    match (completed, total) {
                        (Some(done), _) => self.completed = Some(*done),
                        (None, Some(_)) => self.completed = Some(0),
                        (None, None) => {}
                    }
                    if total.is_some() {
                        self.total = *total;
                    }
                    self.percent = match (self.completed, self.total) {
                        (Some(done), Some(total)) => progress_percent(done, total),
                        _ => None,
                    };
                }
                RecordFacet::Error(message) => self.error = Some(message.clone()),
                RecordFacet::Done => self.done = true,
            }
        }
        self.records += 1;
    }
}

/// A stream that broke off. The text and progress gathered before the
/// failure are kept in `partial`.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct StreamFailure {
    pub partial: StreamAccumulator,
    #[source]
    pub source: ClientError,
}

impl StreamFailure {
    /// A failure before any byte of the body arrived.
    pub fn before_start(source: ClientError) -> Self {
        Self {
            partial: StreamAccumulator::default(),
            source,
        }
    }
}

/// Decoder and accumulator for one response body.
///
/// Records are applied in the exact order their lines complete. The callback
/// runs after every applied record and sees the updated state.
#[derive(Debug, Default)]
pub struct StreamReader {
    decoder: NdjsonDecoder,
    acc: StreamAccumulator,
}

impl StreamReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of the body.
    pub fn feed<F>(&mut self, chunk: &[u8], on_update: &mut F)
    where
        F: FnMut(&StreamRecord, &StreamAccumulator) + ?Sized,
    {
        for line in self.decoder.push(chunk) {
            self.apply_line(&line, on_update);
        }
    }

    /// End of body: apply a trailing unterminated line, if any.
    pub fn finish<F>(mut self, on_update: &mut F) -> StreamAccumulator
    where
        F: FnMut(&StreamRecord, &StreamAccumulator) + ?Sized,
    {
        if let Some(line) = self.decoder.finish() {
            self.apply_line(&line, on_update);
        }
        self.acc
    }

    pub fn state(&self) -> &StreamAccumulator {
        &self.acc
    }

    /// Give up on the body and keep what was gathered.
    pub fn into_partial(self) -> StreamAccumulator {
        self.acc
    }

    fn apply_line<F>(&mut self, line: &str, on_update: &mut F)
    where
        F: FnMut(&StreamRecord, &StreamAccumulator) + ?Sized,
    {
        match StreamRecord::parse(line) {
            Ok(Some(record)) => {
                self.acc.apply(&record);
                on_update(&record, &self.acc);
            }
            Ok(None) => {}
            Err(e) => {
                debug!("Skipping malformed stream line ({}): {:?}", e, line);
                self.acc.skipped += 1;
            }
        }
    }
}

/// Consume a chunked body until it ends.
///
/// On a transport error, or when `idle_timeout` elapses between two chunks,
/// the partial state is returned inside the [`StreamFailure`].
pub async fn read_stream<S, B, E, F>(
    stream: S,
    idle_timeout: Option<Duration>,
    on_update: &mut F,
) -> Result<StreamAccumulator, StreamFailure>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
    F: FnMut(&StreamRecord, &StreamAccumulator) + ?Sized,
{
    pin_mut!(stream);
    let mut reader = StreamReader::new();

    loop {
        let next = match idle_timeout {
            Some(limit) => match tokio::time::timeout(limit, stream.next()).await {
                Ok(next) => next,
                Err(_) => {
                    return Err(StreamFailure {
                        partial: reader.into_partial(),
                        source: ClientError::StreamTimeout(limit),
                    })
                }
            },
            None => stream.next().await,
        };

        match next {
            Some(Ok(chunk)) => reader.feed(chunk.as_ref(), on_update),
            Some(Err(e)) => {
                return Err(StreamFailure {
                    partial: reader.into_partial(),
                    source: ClientError::Stream(e.to_string()),
                })
            }
            None => break,
        }
    }

    Ok(reader.finish(on_update))
}
