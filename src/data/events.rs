//! Input event data structures

use serde::{Deserialize, Serialize};

/// A single captured input event (keyboard or mouse)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputEvent {
    /// Timestamp in microseconds since session start
    pub timestamp_us: u64,

    /// The type of event
    pub kind: EventKind,
}

/// Type of input event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum EventKind {
    /// Mouse button click at a screen position (physical pixels)
    MouseClick {
        button: MouseButton,
        x: f64,
        y: f64,
    },

    /// Key press or release
    Key {
        symbol: KeySymbol,
        action: KeyAction,
    },
}

/// Mouse button identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Press or release half of a key stroke
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyAction {
    Press,
    Release,
}

/// Disambiguated key symbol.
///
/// Every printable character, space included, maps to a distinct `Char`
/// variant; non-printable keys the recorder cares about get named variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeySymbol {
    /// A printable character as typed (space is `Char(' ')`)
    Char(char),
    Escape,
    Enter,
    Tab,
    Backspace,
    Shift,
    Control,
    Alt,
    Meta,
    /// Anything else, carrying the platform key code
    Unknown(u32),
}

impl KeySymbol {
    /// True for printable characters, including space.
    pub fn is_printable(&self) -> bool {
        matches!(self, KeySymbol::Char(_))
    }

    /// Map an rdev key to a symbol, preferring the event's unicode name
    /// for printable characters so layout and shift state are respected.
    pub fn from_rdev(key: rdev::Key, name: Option<&str>) -> Self {
        match key {
            rdev::Key::Escape => return KeySymbol::Escape,
            rdev::Key::Return | rdev::Key::KpReturn => return KeySymbol::Enter,
            rdev::Key::Tab => return KeySymbol::Tab,
            rdev::Key::Backspace => return KeySymbol::Backspace,
            rdev::Key::ShiftLeft | rdev::Key::ShiftRight => return KeySymbol::Shift,
            rdev::Key::ControlLeft | rdev::Key::ControlRight => return KeySymbol::Control,
            rdev::Key::Alt | rdev::Key::AltGr => return KeySymbol::Alt,
            rdev::Key::MetaLeft | rdev::Key::MetaRight => return KeySymbol::Meta,
            // Space must survive as a real character, not a named no-op.
            rdev::Key::Space => return KeySymbol::Char(' '),
            _ => {}
        }

        if let Some(name) = name {
            let mut chars = name.chars();
            if let (Some(c), None) = (chars.next(), chars.next()) {
                if !c.is_control() {
                    return KeySymbol::Char(c);
                }
            }
        }

        // Releases arrive without a unicode name, so resolve them from the
        // key's layout identity; a press/release pair must land on the
        // same symbol family or replay cannot re-press the key.
        if let Some(c) = layout_char(key) {
            return KeySymbol::Char(c);
        }

        KeySymbol::Unknown(key_code(key))
    }
}

/// Base-layer character of a physical key on a US layout. Shift state is
/// unknowable without the unicode name, so letters resolve lowercase.
fn layout_char(key: rdev::Key) -> Option<char> {
    use rdev::Key;

    let c = match key {
        Key::KeyA => 'a',
        Key::KeyB => 'b',
        Key::KeyC => 'c',
        Key::KeyD => 'd',
        Key::KeyE => 'e',
        Key::KeyF => 'f',
        Key::KeyG => 'g',
        Key::KeyH => 'h',
        Key::KeyI => 'i',
        Key::KeyJ => 'j',
        Key::KeyK => 'k',
        Key::KeyL => 'l',
        Key::KeyM => 'm',
        Key::KeyN => 'n',
        Key::KeyO => 'o',
        Key::KeyP => 'p',
        Key::KeyQ => 'q',
        Key::KeyR => 'r',
        Key::KeyS => 's',
        Key::KeyT => 't',
        Key::KeyU => 'u',
        Key::KeyV => 'v',
        Key::KeyW => 'w',
        Key::KeyX => 'x',
        Key::KeyY => 'y',
        Key::KeyZ => 'z',
        Key::Num0 => '0',
        Key::Num1 => '1',
        Key::Num2 => '2',
        Key::Num3 => '3',
        Key::Num4 => '4',
        Key::Num5 => '5',
        Key::Num6 => '6',
        Key::Num7 => '7',
        Key::Num8 => '8',
        Key::Num9 => '9',
        Key::Minus => '-',
        Key::Equal => '=',
        Key::LeftBracket => '[',
        Key::RightBracket => ']',
        Key::SemiColon => ';',
        Key::Quote => '\'',
        Key::BackSlash => '\\',
        Key::Comma => ',',
        Key::Dot => '.',
        Key::Slash => '/',
        Key::BackQuote => '`',
        _ => return None,
    };
    Some(c)
}

impl From<rdev::Button> for MouseButton {
    fn from(button: rdev::Button) -> Self {
        match button {
            rdev::Button::Left => MouseButton::Left,
            rdev::Button::Right => MouseButton::Right,
            // Unknown buttons collapse to middle rather than being dropped;
            // the recorder only distinguishes the three standard buttons.
            rdev::Button::Middle | rdev::Button::Unknown(_) => MouseButton::Middle,
        }
    }
}

/// Stable numeric code for keys that have no character representation.
fn key_code(key: rdev::Key) -> u32 {
    match key {
        rdev::Key::Delete => 1,
        rdev::Key::Home => 2,
        rdev::Key::End => 3,
        rdev::Key::PageUp => 4,
        rdev::Key::PageDown => 5,
        rdev::Key::UpArrow => 6,
        rdev::Key::DownArrow => 7,
        rdev::Key::LeftArrow => 8,
        rdev::Key::RightArrow => 9,
        rdev::Key::Insert => 10,
        rdev::Key::CapsLock => 11,
        rdev::Key::F1 => 21,
        rdev::Key::F2 => 22,
        rdev::Key::F3 => 23,
        rdev::Key::F4 => 24,
        rdev::Key::F5 => 25,
        rdev::Key::F6 => 26,
        rdev::Key::F7 => 27,
        rdev::Key::F8 => 28,
        rdev::Key::F9 => 29,
        rdev::Key::F10 => 30,
        rdev::Key::F11 => 31,
        rdev::Key::F12 => 32,
        rdev::Key::PrintScreen => 40,
        rdev::Key::ScrollLock => 41,
        rdev::Key::Pause => 42,
        rdev::Key::NumLock => 43,
        rdev::Key::Function => 44,
        rdev::Key::Unknown(code) => code + 1000,
        _ => 999,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn space_is_a_distinct_printable_symbol() {
        let sym = KeySymbol::from_rdev(rdev::Key::Space, Some(" "));
        assert_eq!(sym, KeySymbol::Char(' '));
        assert!(sym.is_printable());

        // Space survives even when the backend provides no unicode name.
        let sym = KeySymbol::from_rdev(rdev::Key::Space, None);
        assert_eq!(sym, KeySymbol::Char(' '));
    }

    #[test]
    fn printable_ascii_maps_through_unicode_name() {
        for c in ' '..='~' {
            let buf = c.to_string();
            // Key identity is irrelevant once a printable name is present.
            let sym = KeySymbol::from_rdev(rdev::Key::KeyA, Some(&buf));
            assert_eq!(sym, KeySymbol::Char(c), "lost printable {:?}", c);
        }
    }

    #[test]
    fn printable_symbols_stay_distinct() {
        let h = KeySymbol::from_rdev(rdev::Key::KeyH, Some("H"));
        let e = KeySymbol::from_rdev(rdev::Key::KeyE, Some("e"));
        assert_ne!(h, e);
        assert_ne!(h, KeySymbol::Char(' '));
    }

    #[test]
    fn named_keys_win_over_names() {
        let sym = KeySymbol::from_rdev(rdev::Key::Escape, Some("\u{1b}"));
        assert_eq!(sym, KeySymbol::Escape);
        let sym = KeySymbol::from_rdev(rdev::Key::ShiftLeft, None);
        assert_eq!(sym, KeySymbol::Shift);
    }

    #[test]
    fn nameless_events_keep_key_identity() {
        // Releases have no unicode name; each key must still resolve to
        // its own symbol so the paired press can be re-pressed on replay.
        assert_eq!(
            KeySymbol::from_rdev(rdev::Key::KeyA, None),
            KeySymbol::Char('a')
        );
        assert_ne!(
            KeySymbol::from_rdev(rdev::Key::KeyA, None),
            KeySymbol::from_rdev(rdev::Key::KeyB, None)
        );
        assert_eq!(
            KeySymbol::from_rdev(rdev::Key::Num7, None),
            KeySymbol::Char('7')
        );
        assert_eq!(
            KeySymbol::from_rdev(rdev::Key::Comma, None),
            KeySymbol::Char(',')
        );
    }

    #[test]
    fn shifted_press_and_nameless_release_share_a_key() {
        let press = KeySymbol::from_rdev(rdev::Key::KeyH, Some("H"));
        let release = KeySymbol::from_rdev(rdev::Key::KeyH, None);
        assert_eq!(press, KeySymbol::Char('H'));
        assert_eq!(release, KeySymbol::Char('h'));
    }

    #[test]
    fn control_names_do_not_become_chars() {
        let sym = KeySymbol::from_rdev(rdev::Key::Delete, Some("\u{7f}"));
        assert_eq!(sym, KeySymbol::Unknown(1));
    }

    #[test]
    fn event_serde_round_trip() {
        let event = InputEvent {
            timestamp_us: 42,
            kind: EventKind::Key {
                symbol: KeySymbol::Char(' '),
                action: KeyAction::Press,
            },
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: InputEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
