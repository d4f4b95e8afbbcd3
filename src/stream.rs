//! Streaming-response aggregator
//!
//! Folds an asynchronous chunk stream into a cumulative reply buffer,
//! filtering non-text chunks and abandoning quietly when its request
//! token is superseded by a newer request or a reset.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, warn};

use crate::collaborators::ChunkStream;

/// Terminal outcomes of a stream that did not complete cleanly
#[derive(Debug, Clone, thiserror::Error)]
pub enum StreamError {
    /// A newer request (or a reset) took over; discarded silently
    #[error("response superseded by a newer request")]
    Superseded,

    /// The agent stream itself failed mid-way
    #[error("agent stream failed: {0}")]
    Agent(String),
}

/// Folds one agent response stream for a single request id.
///
/// The shared `active` cell holds the id of the youngest request; the
/// aggregator stops applying chunks as soon as its own id no longer
/// matches. An abandoned stream reports [`StreamError::Superseded`]
/// exactly once, it never errors loudly.
pub struct StreamAggregator {
    request_id: u64,
    active: Arc<AtomicU64>,
    buffer: String,
}

impl StreamAggregator {
    /// Create an aggregator bound to one request id
    pub fn new(request_id: u64, active: Arc<AtomicU64>) -> Self {
        Self {
            request_id,
            active,
            buffer: String::new(),
        }
    }

    /// Consume the stream to completion.
    ///
    /// `on_update` receives the request id and the cumulative buffer
    /// after every accepted chunk. Returns the final buffer on clean
    /// exhaustion; a partial buffer is kept by the caller on error, not
    /// rolled back here.
    pub async fn run<F>(mut self, mut stream: ChunkStream, mut on_update: F) -> Result<String, StreamError>
    where
        F: FnMut(u64, &str),
    {
        while let Some(item) = stream.next().await {
            if self.active.load(Ordering::SeqCst) != self.request_id {
                debug!(request_id = self.request_id, "stream superseded, abandoning");
                return Err(StreamError::Superseded);
            }

            match item {
                Ok(chunk) => {
                    // Non-assistant and empty chunks are skipped, not errors
                    if let Some(text) = chunk.assistant_text() {
                        self.buffer.push_str(text);
                        on_update(self.request_id, &self.buffer);
                    }
                }
                Err(e) => {
                    warn!(request_id = self.request_id, cause = %e, "agent stream error");
                    return Err(StreamError::Agent(e.to_string()));
                }
            }
        }

        debug!(
            request_id = self.request_id,
            len = self.buffer.len(),
            "stream exhausted"
        );
        Ok(self.buffer)
    }
}
