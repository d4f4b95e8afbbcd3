//! Key and modifier definitions
//!
//! Provides a host-agnostic view of a single keyboard event: the key
//! identity plus the modifier flags active at the time of the event.

use serde::{Deserialize, Serialize};

/// Identity of the key a keyboard event refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    /// A printable character key
    Char(char),
    /// The Escape key
    Escape,
    /// Any key the router does not care about
    Other,
}

/// Tracks which modifier keys are active for a keyboard event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    /// Primary modifier is held (meta on macOS, ctrl elsewhere)
    pub primary: bool,
    /// Alt/Option key is held
    pub alt: bool,
}

impl Modifiers {
    /// Check if the accelerator chord modifiers (primary + alt) are active
    pub fn is_chord(&self) -> bool {
        self.primary && self.alt
    }

    /// Check if no modifiers are active
    pub fn is_bare(&self) -> bool {
        !self.primary && !self.alt
    }
}

/// A single key-down or key-up event as delivered by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPress {
    /// The key this event refers to
    pub key: Key,
    /// Modifier flags at the time of the event
    pub modifiers: Modifiers,
}

impl KeyPress {
    /// A character key pressed together with the accelerator chord modifiers
    pub fn chord(c: char) -> Self {
        Self {
            key: Key::Char(c),
            modifiers: Modifiers {
                primary: true,
                alt: true,
            },
        }
    }

    /// A character key pressed with no modifiers
    pub fn bare(c: char) -> Self {
        Self {
            key: Key::Char(c),
            modifiers: Modifiers::default(),
        }
    }

    /// The Escape key with no modifiers
    pub fn escape() -> Self {
        Self {
            key: Key::Escape,
            modifiers: Modifiers::default(),
        }
    }

    /// Check whether this event refers to the given character, ignoring case
    pub fn is_char(&self, c: char) -> bool {
        matches!(self.key, Key::Char(k) if k.eq_ignore_ascii_case(&c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_modifiers() {
        let press = KeyPress::bare('v');
        assert!(press.modifiers.is_bare());
        assert!(!press.modifiers.is_chord());
    }

    #[test]
    fn test_chord_modifiers() {
        let press = KeyPress::chord('v');
        assert!(press.modifiers.is_chord());
        assert!(!press.modifiers.is_bare());
    }

    #[test]
    fn test_char_match_ignores_case() {
        let press = KeyPress::chord('V');
        assert!(press.is_char('v'));
        assert!(press.is_char('V'));
        assert!(!press.is_char('t'));
    }

    #[test]
    fn test_partial_modifiers_are_not_a_chord() {
        let press = KeyPress {
            key: Key::Char('v'),
            modifiers: Modifiers {
                primary: true,
                alt: false,
            },
        };
        assert!(!press.modifiers.is_chord());
        assert!(!press.modifiers.is_bare());
    }
}
