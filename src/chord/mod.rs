//! Chord module for keyboard command routing
//!
//! Normalizes raw key-down/key-up events from the host surface into
//! semantic widget commands, firing once per physical chord press.

mod keys;
mod router;

pub use keys::{Key, KeyPress, Modifiers};
pub use router::{ChordRouter, Command};
