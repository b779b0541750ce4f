//! Keyboard input: modifier bitmask, key events, and key-capture strings.
//!
//! A key-capture string names a key chord the server wants reported, such as
//! `^#13` for Ctrl+Enter. Modifiers come first in the fixed order
//! `^` (ctrl), `@` (alt), `~` (meta), `$` (shift), followed by `#` and the
//! numeric key code.

use std::ops::{BitAnd, BitOr};

use serde_json::json;

use super::message::Event;

/// Key code of the Enter key.
pub const KEY_ENTER: u32 = 13;
/// Key code of the Backspace key.
pub const KEY_BACKSPACE: u32 = 8;

// ---------------------------------------------------------------------------
// Modifiers
// ---------------------------------------------------------------------------

/// Modifier key bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Modifiers(pub u8);

impl Modifiers {
    pub const NONE: Modifiers = Modifiers(0);
    pub const SHIFT: Modifiers = Modifiers(1);
    pub const CTRL: Modifiers = Modifiers(2);
    pub const ALT: Modifiers = Modifiers(4);
    pub const META: Modifiers = Modifiers(8);

    /// Check whether `self` contains all the bits in `other`.
    pub fn contains(self, other: Modifiers) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Check whether no modifier bits are set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Modifiers {
    type Output = Modifiers;
    fn bitor(self, rhs: Self) -> Self::Output {
        Modifiers(self.0 | rhs.0)
    }
}

impl BitAnd for Modifiers {
    type Output = Modifiers;
    fn bitand(self, rhs: Self) -> Self::Output {
        Modifiers(self.0 & rhs.0)
    }
}

// ---------------------------------------------------------------------------
// KeyEvent
// ---------------------------------------------------------------------------

/// A keyboard event with key code, typed character, and modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    pub code: u32,
    pub ch: Option<char>,
    pub modifiers: Modifiers,
}

impl KeyEvent {
    /// Create a new key event.
    pub fn new(code: u32, modifiers: Modifiers) -> Self {
        Self {
            code,
            ch: None,
            modifiers,
        }
    }

    /// A key press producing the character `ch`.
    pub fn char(ch: char) -> Self {
        Self {
            code: u32::from(ch),
            ch: Some(ch),
            modifiers: Modifiers::NONE,
        }
    }

    /// The key-capture string for this chord.
    pub fn to_key_capture(self) -> String {
        let mut value = String::new();
        for (flag, symbol) in [
            (Modifiers::CTRL, '^'),
            (Modifiers::ALT, '@'),
            (Modifiers::META, '~'),
            (Modifiers::SHIFT, '$'),
        ] {
            if self.modifiers.contains(flag) {
                value.push(symbol);
            }
        }
        value.push('#');
        value.push_str(&self.code.to_string());
        value
    }

    /// Build an event of type `kind` carrying this key's fields.
    pub fn to_event(self, kind: &str) -> Event {
        let mut event = Event::new(kind)
            .with_field("keyCode", json!(self.code))
            .with_field("which", json!(self.code))
            .with_field("ctrlKey", json!(self.modifiers.contains(Modifiers::CTRL)))
            .with_field("altKey", json!(self.modifiers.contains(Modifiers::ALT)))
            .with_field("metaKey", json!(self.modifiers.contains(Modifiers::META)))
            .with_field("shiftKey", json!(self.modifiers.contains(Modifiers::SHIFT)));
        if let Some(ch) = self.ch {
            event.set("key", json!(ch.to_string()));
        }
        event
    }

    /// Recover a key from an event's fields.
    pub fn from_event(event: &Event) -> Option<Self> {
        let code = event.json("keyCode")?.as_u64()? as u32;
        let flag = |name: &str, m: Modifiers| {
            if event.json(name).and_then(|v| v.as_bool()).unwrap_or(false) {
                m
            } else {
                Modifiers::NONE
            }
        };
        let modifiers = flag("ctrlKey", Modifiers::CTRL)
            | flag("altKey", Modifiers::ALT)
            | flag("metaKey", Modifiers::META)
            | flag("shiftKey", Modifiers::SHIFT);
        let ch = event
            .json("key")
            .and_then(|v| v.as_str())
            .and_then(|s| {
                let mut chars = s.chars();
                chars.next().filter(|_| chars.next().is_none())
            });
        Some(Self { code, ch, modifiers })
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modifiers_bitops() {
        let m = Modifiers::CTRL | Modifiers::SHIFT;
        assert!(m.contains(Modifiers::CTRL));
        assert!(!m.contains(Modifiers::ALT));
        assert_eq!(m & Modifiers::SHIFT, Modifiers::SHIFT);
        assert!(Modifiers::default().is_empty());
    }

    #[test]
    fn key_capture_strings() {
        assert_eq!(KeyEvent::new(13, Modifiers::NONE).to_key_capture(), "#13");
        assert_eq!(KeyEvent::new(13, Modifiers::CTRL).to_key_capture(), "^#13");
        let all = Modifiers::SHIFT | Modifiers::META | Modifiers::ALT | Modifiers::CTRL;
        assert_eq!(KeyEvent::new(65, all).to_key_capture(), "^@~$#65");
    }

    #[test]
    fn event_round_trip() {
        let key = KeyEvent::new(27, Modifiers::ALT);
        let event = key.to_event("keydown");
        assert_eq!(event.kind(), "keydown");
        assert_eq!(KeyEvent::from_event(&event), Some(key));
    }

    #[test]
    fn char_keys() {
        let key = KeyEvent::char('7');
        assert_eq!(key.code, 55);
        let event = key.to_event("keypress");
        assert_eq!(KeyEvent::from_event(&event).and_then(|k| k.ch), Some('7'));
    }

    #[test]
    fn missing_code_is_none() {
        assert!(KeyEvent::from_event(&Event::new("keydown")).is_none());
    }
}
