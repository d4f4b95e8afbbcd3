//! companion-widget: interaction core for a voice/text companion widget
//!
//! The host renders an on-screen avatar; this crate decides what it is
//! doing. It provides:
//! - An explicit state machine over the widget modes (Dormant,
//!   Activated, Expanded, ChatActive, Resetting)
//! - Chord routing from raw host key events to semantic commands
//! - A recording coordinator around the host's speech-capture
//!   collaborator
//! - A streaming aggregator folding chunked agent replies into the
//!   transcript, with request-token supersede semantics
//!
//! Rendering, audio capture, transcription, and the remote agent stay
//! outside: the host implements [`SpeechCapture`] and [`Agent`], feeds
//! input through [`Widget`], and reads [`WidgetSnapshot`] each frame.

pub mod chord;
pub mod collaborators;
pub mod config;
pub mod events;
pub mod recording;
pub mod state;
pub mod stream;

mod widget;

pub use chord::{ChordRouter, Command, Key, KeyPress, Modifiers};
pub use collaborators::{Agent, ChunkStream, ResponseChunk, SpeechCapture};
pub use config::Config;
pub use events::WidgetEvent;
pub use recording::{RecorderError, RecordingCoordinator, RecordingState};
pub use state::{
    ChatTranscript, Message, StateMachine, StreamingResponse, WidgetMode, WidgetSnapshot,
};
pub use stream::{StreamAggregator, StreamError};
pub use widget::{Widget, WidgetDriver};
