//! External collaborator interfaces
//!
//! The core never talks to hardware or the network directly: audio
//! capture, speech-to-text, and the remote conversational agent sit
//! behind these traits, implemented by the host.

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

/// Chunk type carrying assistant reply text
pub const ASSISTANT_MESSAGE: &str = "assistant_message";

/// One unit of a streamed agent response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseChunk {
    /// Kind of chunk; only `assistant_message` carries reply text
    #[serde(rename = "messageType")]
    pub message_type: String,
    /// Text payload, absent for non-text chunk kinds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl ResponseChunk {
    /// Build an assistant-text chunk
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            message_type: ASSISTANT_MESSAGE.to_string(),
            content: Some(text.into()),
        }
    }

    /// Reply text carried by this chunk, if it passes the filter.
    ///
    /// Non-assistant chunks, chunks without content, and the literal
    /// string `"undefined"` (a serialization artifact of the upstream
    /// agent transport) all yield `None`.
    pub fn assistant_text(&self) -> Option<&str> {
        if self.message_type != ASSISTANT_MESSAGE {
            return None;
        }
        match self.content.as_deref() {
            Some(text) if text != "undefined" => Some(text),
            _ => None,
        }
    }
}

/// Asynchronous sequence of response chunks from one agent call
pub type ChunkStream = BoxStream<'static, Result<ResponseChunk>>;

/// Audio capture and speech-to-text collaborator
#[async_trait]
pub trait SpeechCapture: Send + Sync {
    /// Begin capturing audio
    async fn start(&self) -> Result<()>;

    /// Stop capturing and transcribe what was recorded.
    ///
    /// Returns `None` when the capture produced nothing transcribable.
    async fn stop_and_transcribe(&self) -> Result<Option<String>>;
}

/// Remote conversational agent collaborator
#[async_trait]
pub trait Agent: Send + Sync {
    /// Send a user message, returning the streamed reply.
    ///
    /// The stream is assumed to terminate; the core imposes no timeout.
    async fn send_message(&self, text: &str) -> Result<ChunkStream>;
}
