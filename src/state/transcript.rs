//! Chat transcript and streaming-response buffers

use serde::{Deserialize, Serialize};

/// One message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message text; grows in place for a streaming agent reply
    pub text: String,
    /// True for messages the user produced (typed or spoken)
    pub is_user: bool,
}

impl Message {
    /// Build a user message
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_user: true,
        }
    }

    /// Build an empty agent message to stream into
    pub fn agent_placeholder() -> Self {
        Self {
            text: String::new(),
            is_user: false,
        }
    }
}

/// Ordered conversation history.
///
/// Append-only, except the last message while an agent reply streams
/// into it. At most one message is in progress at a time; the state
/// machine enforces that by superseding the older request before it
/// appends a new pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTranscript {
    messages: Vec<Message>,
}

impl ChatTranscript {
    /// Append a user message
    pub fn push_user(&mut self, text: impl Into<String>) {
        self.messages.push(Message::user(text));
    }

    /// Append an empty agent message for streaming
    pub fn push_agent_placeholder(&mut self) {
        self.messages.push(Message::agent_placeholder());
    }

    /// Replace the text of the trailing in-progress agent message.
    ///
    /// Returns false (and changes nothing) when the transcript is empty
    /// or the last message belongs to the user.
    pub fn set_last_agent_text(&mut self, text: &str) -> bool {
        match self.messages.last_mut() {
            Some(last) if !last.is_user => {
                last.text.clear();
                last.text.push_str(text);
                true
            }
            _ => false,
        }
    }

    /// Drop all messages
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// All messages in order
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// True when no messages exist
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// The in-flight agent reply as published to the rendering layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamingResponse {
    /// Cumulative reply text received so far
    pub buffer: String,
    /// True from request start until stream exhaustion or error
    pub is_generating: bool,
}

impl StreamingResponse {
    /// Start a fresh response: empty buffer, generating
    pub fn begin(&mut self) {
        self.buffer.clear();
        self.is_generating = true;
    }

    /// Mark the response finished, keeping whatever buffer exists
    pub fn finish(&mut self) {
        self.is_generating = false;
    }

    /// Drop the buffer and the generating flag
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.is_generating = false;
    }
}
