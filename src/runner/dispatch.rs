//! Synthetic input dispatch
//!
//! Action blocks replay through an [`InputDispatcher`], so tests can
//! substitute a recording mock for the rdev-backed implementation.

use crate::data::{ActionBlock, KeyAction, KeySymbol, MouseButton};
use anyhow::{anyhow, Result};
use tracing::debug;

/// Dispatches one synthetic input event per action block.
pub trait InputDispatcher: Send {
    fn dispatch(&mut self, action: &ActionBlock) -> Result<()>;
}

/// rdev-backed dispatcher. Mouse clicks move the pointer to the recorded
/// physical position, then press and release; key actions replay the
/// recorded half of the stroke only.
pub struct RdevDispatcher;

impl RdevDispatcher {
    pub fn new() -> Self {
        Self
    }

    fn simulate(event: &rdev::EventType) -> Result<()> {
        rdev::simulate(event).map_err(|e| anyhow!("synthetic input dispatch failed: {e:?}"))
    }
}

impl Default for RdevDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl InputDispatcher for RdevDispatcher {
    fn dispatch(&mut self, action: &ActionBlock) -> Result<()> {
        match action {
            ActionBlock::MouseClick { button, x, y } => {
                debug!("dispatching {button:?} click at ({x}, {y})");
                let button = to_rdev_button(*button);
                Self::simulate(&rdev::EventType::MouseMove { x: *x, y: *y })?;
                Self::simulate(&rdev::EventType::ButtonPress(button))?;
                Self::simulate(&rdev::EventType::ButtonRelease(button))?;
                Ok(())
            }
            ActionBlock::Key { symbol, action } => {
                let key = to_rdev_key(*symbol)
                    .ok_or_else(|| anyhow!("no synthetic key for symbol {symbol:?}"))?;
                debug!("dispatching key {symbol:?} {action:?}");
                match action {
                    KeyAction::Press => Self::simulate(&rdev::EventType::KeyPress(key)),
                    KeyAction::Release => Self::simulate(&rdev::EventType::KeyRelease(key)),
                }
            }
        }
    }
}

fn to_rdev_button(button: MouseButton) -> rdev::Button {
    match button {
        MouseButton::Left => rdev::Button::Left,
        MouseButton::Right => rdev::Button::Right,
        MouseButton::Middle => rdev::Button::Middle,
    }
}

/// Map a key symbol back onto a physical key. Uppercase letters land on
/// the same key as lowercase; shift state is not synthesized.
fn to_rdev_key(symbol: KeySymbol) -> Option<rdev::Key> {
    use rdev::Key;

    let key = match symbol {
        KeySymbol::Escape => Key::Escape,
        KeySymbol::Enter => Key::Return,
        KeySymbol::Tab => Key::Tab,
        KeySymbol::Backspace => Key::Backspace,
        KeySymbol::Shift => Key::ShiftLeft,
        KeySymbol::Control => Key::ControlLeft,
        KeySymbol::Alt => Key::Alt,
        KeySymbol::Meta => Key::MetaLeft,
        KeySymbol::Unknown(_) => return None,
        KeySymbol::Char(c) => match c.to_ascii_lowercase() {
            ' ' => Key::Space,
            'a' => Key::KeyA,
            'b' => Key::KeyB,
            'c' => Key::KeyC,
            'd' => Key::KeyD,
            'e' => Key::KeyE,
            'f' => Key::KeyF,
            'g' => Key::KeyG,
            'h' => Key::KeyH,
            'i' => Key::KeyI,
            'j' => Key::KeyJ,
            'k' => Key::KeyK,
            'l' => Key::KeyL,
            'm' => Key::KeyM,
            'n' => Key::KeyN,
            'o' => Key::KeyO,
            'p' => Key::KeyP,
            'q' => Key::KeyQ,
            'r' => Key::KeyR,
            's' => Key::KeyS,
            't' => Key::KeyT,
            'u' => Key::KeyU,
            'v' => Key::KeyV,
            'w' => Key::KeyW,
            'x' => Key::KeyX,
            'y' => Key::KeyY,
            'z' => Key::KeyZ,
            '0' => Key::Num0,
            '1' => Key::Num1,
            '2' => Key::Num2,
            '3' => Key::Num3,
            '4' => Key::Num4,
            '5' => Key::Num5,
            '6' => Key::Num6,
            '7' => Key::Num7,
            '8' => Key::Num8,
            '9' => Key::Num9,
            '-' => Key::Minus,
            '=' => Key::Equal,
            '[' => Key::LeftBracket,
            ']' => Key::RightBracket,
            ';' => Key::SemiColon,
            '\'' => Key::Quote,
            '\\' => Key::BackSlash,
            ',' => Key::Comma,
            '.' => Key::Dot,
            '/' => Key::Slash,
            '`' => Key::BackQuote,
            _ => return None,
        },
    };
    Some(key)
}
