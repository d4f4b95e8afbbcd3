//! Chord router: raw key events to semantic commands
//!
//! Level-triggered on key-down: a command fires once when its chord
//! first becomes true, and key-repeat while the chord stays held fires
//! nothing. Voice release fires once on the key-up that breaks the
//! chord, not on every key-up.

use tracing::debug;

use super::keys::{Key, KeyPress};

/// Semantic commands emitted by the router
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Start voice capture (primary+alt+v, or bare v with `debug-keys`)
    ToggleVoice {
        /// True when triggered by the bare-key debug alias
        via_alias: bool,
    },
    /// The voice chord was released
    ReleaseVoice,
    /// Enter chat mode (primary+alt+t, or bare t with `debug-keys`)
    ActivateChat {
        /// True when triggered by the bare-key debug alias
        via_alias: bool,
    },
    /// Reset the widget to dormant (Escape)
    Reset,
}

/// Routes raw key events to at most one command per physical chord press.
///
/// Holds only transient chord-held tracking, no widget state. Owned by
/// the host, which feeds it every key event it wants the widget to see.
#[derive(Debug, Default)]
pub struct ChordRouter {
    /// Voice chord (primary+alt+v) is currently held
    voice_held: bool,
    /// Chat chord (primary+alt+t) is currently held
    chat_held: bool,
    #[cfg(feature = "debug-keys")]
    voice_alias_held: bool,
    #[cfg(feature = "debug-keys")]
    chat_alias_held: bool,
}

impl ChordRouter {
    /// Create a new router with no chords held
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a key-down event, returning the command it triggers, if any
    pub fn key_down(&mut self, press: &KeyPress) -> Option<Command> {
        // Escape resets unconditionally, regardless of modifiers
        if press.key == Key::Escape {
            debug!("escape pressed, routing reset");
            return Some(Command::Reset);
        }

        if press.modifiers.is_chord() {
            if press.is_char('v') {
                if self.voice_held {
                    // Key-repeat while the chord stays held
                    return None;
                }
                self.voice_held = true;
                debug!("voice chord engaged");
                return Some(Command::ToggleVoice { via_alias: false });
            }
            if press.is_char('t') {
                if self.chat_held {
                    return None;
                }
                self.chat_held = true;
                debug!("chat chord engaged");
                return Some(Command::ActivateChat { via_alias: false });
            }
        }

        #[cfg(feature = "debug-keys")]
        if press.modifiers.is_bare() {
            if press.is_char('v') {
                if self.voice_alias_held {
                    return None;
                }
                self.voice_alias_held = true;
                debug!("bare v alias engaged");
                return Some(Command::ToggleVoice { via_alias: true });
            }
            if press.is_char('t') {
                if self.chat_alias_held {
                    return None;
                }
                self.chat_alias_held = true;
                debug!("bare t alias engaged");
                return Some(Command::ActivateChat { via_alias: true });
            }
        }

        None
    }

    /// Process a key-up event, returning the command it triggers, if any
    pub fn key_up(&mut self, press: &KeyPress) -> Option<Command> {
        let mut command = None;

        // The voice chord breaks when v is released or either modifier drops
        if self.voice_held && (press.is_char('v') || !press.modifiers.is_chord()) {
            self.voice_held = false;
            debug!("voice chord released");
            command = Some(Command::ReleaseVoice);
        }

        if self.chat_held && (press.is_char('t') || !press.modifiers.is_chord()) {
            self.chat_held = false;
        }

        #[cfg(feature = "debug-keys")]
        {
            if self.voice_alias_held && press.is_char('v') {
                self.voice_alias_held = false;
                if command.is_none() {
                    debug!("bare v alias released");
                    command = Some(Command::ReleaseVoice);
                }
            }
            if self.chat_alias_held && press.is_char('t') {
                self.chat_alias_held = false;
            }
        }

        command
    }
}
