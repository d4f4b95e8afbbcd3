//! Outbound widget events
//!
//! Structured notices emitted by the state machine over a broadcast
//! channel: mode changes, recording lifecycle, and the user-visible
//! failure notices the host must surface rather than drop.

use serde::{Deserialize, Serialize};

use crate::state::WidgetMode;

/// Events emitted by the widget core during operation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WidgetEvent {
    /// The authoritative mode changed
    ModeChanged {
        /// Mode before the transition
        from: WidgetMode,
        /// Mode after the transition
        to: WidgetMode,
    },

    /// Audio capture began
    RecordingStarted,

    /// Audio capture stopped; transcription pending
    RecordingStopped,

    /// The capture collaborator refused to start (user-visible)
    RecordingStartFailed {
        /// Human-readable cause for surfacing to the user
        cause: String,
    },

    /// Transcription failed after capture stopped (user-visible)
    TranscriptionFailed {
        /// Human-readable cause for surfacing to the user
        cause: String,
    },

    /// An agent call began streaming
    ResponseStarted {
        /// Monotonic id of the request
        request_id: u64,
    },

    /// An agent reply finished streaming cleanly
    ResponseCompleted {
        /// Monotonic id of the request
        request_id: u64,
    },

    /// The agent stream failed mid-reply; the partial reply is kept
    AgentStreamFailed {
        /// Monotonic id of the request
        request_id: u64,
        /// Human-readable cause for surfacing to the user
        cause: String,
    },
}

impl std::fmt::Display for WidgetEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WidgetEvent::ModeChanged { from, to } => {
                write!(f, "MODE_CHANGED ({from} -> {to})")
            }
            WidgetEvent::RecordingStarted => write!(f, "RECORDING_STARTED"),
            WidgetEvent::RecordingStopped => write!(f, "RECORDING_STOPPED"),
            WidgetEvent::RecordingStartFailed { cause } => {
                write!(f, "RECORDING_START_FAILED ({cause})")
            }
            WidgetEvent::TranscriptionFailed { cause } => {
                write!(f, "TRANSCRIPTION_FAILED ({cause})")
            }
            WidgetEvent::ResponseStarted { request_id } => {
                write!(f, "RESPONSE_STARTED (request {request_id})")
            }
            WidgetEvent::ResponseCompleted { request_id } => {
                write!(f, "RESPONSE_COMPLETED (request {request_id})")
            }
            WidgetEvent::AgentStreamFailed { request_id, cause } => {
                write!(f, "AGENT_STREAM_FAILED (request {request_id}: {cause})")
            }
        }
    }
}
