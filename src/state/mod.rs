//! State machine module governing the widget's interaction modes
//!
//! Provides the authoritative mode value and conversation state:
//! - Dormant: avatar idle, waiting for the first click
//! - Activated: avatar awake, accepting chords and a second click
//! - Expanded: listening surface open, voice capture possible
//! - ChatActive: text chat surface open
//! - Resetting: transient fade-out, self-clears back to Dormant

mod machine;
mod transcript;

pub use machine::{Input, StateMachine, WidgetMode, WidgetSnapshot};
pub use transcript::{ChatTranscript, Message, StreamingResponse};
