//! Global hotkey registration
//!
//! Hotkey bindings are an exclusive in-process resource: registering a
//! combination that is already bound fails fast with a conflict instead
//! of queueing. The watcher half maps the shared input-event stream onto
//! registered combinations, so no second OS hook is ever installed.

use crate::data::{EventKind, InputEvent, KeyAction, KeySymbol};
use crate::input::InputSource;
use crate::runner::EngineCommand;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum HotkeyError {
    #[error("hotkey {0} is already bound to another macro")]
    HotkeyConflict(Hotkey),

    #[error("unrecognized hotkey spec: {0:?}")]
    UnparsableSpec(String),
}

/// One hotkey combination: optional modifiers plus a terminal key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Hotkey {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub key: KeySymbol,
}

impl Hotkey {
    /// Parse a spec like `ctrl+shift+p`, `alt+f9`, or a bare key.
    pub fn parse(spec: &str) -> Result<Self, HotkeyError> {
        let mut hotkey = Hotkey {
            ctrl: false,
            shift: false,
            alt: false,
            key: KeySymbol::Unknown(0),
        };
        let mut key_set = false;

        for part in spec.split('+') {
            match part.trim().to_lowercase().as_str() {
                "ctrl" | "control" => hotkey.ctrl = true,
                "shift" => hotkey.shift = true,
                "alt" => hotkey.alt = true,
                "esc" | "escape" => {
                    hotkey.key = KeySymbol::Escape;
                    key_set = true;
                }
                "enter" | "return" => {
                    hotkey.key = KeySymbol::Enter;
                    key_set = true;
                }
                "tab" => {
                    hotkey.key = KeySymbol::Tab;
                    key_set = true;
                }
                other => {
                    if let Some(symbol) = function_key(other) {
                        hotkey.key = symbol;
                        key_set = true;
                        continue;
                    }
                    let mut chars = other.chars();
                    match (chars.next(), chars.next()) {
                        (Some(c), None) => {
                            hotkey.key = KeySymbol::Char(c);
                            key_set = true;
                        }
                        _ => return Err(HotkeyError::UnparsableSpec(spec.to_string())),
                    }
                }
            }
        }

        if !key_set {
            return Err(HotkeyError::UnparsableSpec(spec.to_string()));
        }
        Ok(hotkey)
    }
}

/// Resolve an `f1`..`f12` spec through the capture-side key mapping, so
/// a parsed function key equals the symbol the hook emits for it.
fn function_key(part: &str) -> Option<KeySymbol> {
    let key = match part.strip_prefix('f')?.parse::<u8>().ok()? {
        1 => rdev::Key::F1,
        2 => rdev::Key::F2,
        3 => rdev::Key::F3,
        4 => rdev::Key::F4,
        5 => rdev::Key::F5,
        6 => rdev::Key::F6,
        7 => rdev::Key::F7,
        8 => rdev::Key::F8,
        9 => rdev::Key::F9,
        10 => rdev::Key::F10,
        11 => rdev::Key::F11,
        12 => rdev::Key::F12,
        _ => return None,
    };
    Some(KeySymbol::from_rdev(key, None))
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ctrl {
            write!(f, "ctrl+")?;
        }
        if self.shift {
            write!(f, "shift+")?;
        }
        if self.alt {
            write!(f, "alt+")?;
        }
        match self.key {
            KeySymbol::Char(c) => write!(f, "{c}"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// In-process table of bound hotkey combinations.
#[derive(Clone)]
pub struct HotkeyRegistry {
    bound: Arc<Mutex<HashSet<Hotkey>>>,
}

impl HotkeyRegistry {
    pub fn new() -> Self {
        Self {
            bound: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Bind a combination. The returned handle releases the binding on
    /// drop; a second registration of the same combination fails.
    pub fn register(&self, hotkey: Hotkey) -> Result<HotkeyHandle, HotkeyError> {
        let mut bound = self.lock();
        if !bound.insert(hotkey.clone()) {
            return Err(HotkeyError::HotkeyConflict(hotkey));
        }
        info!("hotkey {hotkey} registered");
        Ok(HotkeyHandle {
            hotkey,
            registry: self.bound.clone(),
        })
    }

    pub fn is_bound(&self, hotkey: &Hotkey) -> bool {
        self.lock().contains(hotkey)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<Hotkey>> {
        match self.bound.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for HotkeyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Live hotkey binding; dropping it frees the combination.
pub struct HotkeyHandle {
    hotkey: Hotkey,
    registry: Arc<Mutex<HashSet<Hotkey>>>,
}

impl HotkeyHandle {
    pub fn hotkey(&self) -> &Hotkey {
        &self.hotkey
    }
}

impl Drop for HotkeyHandle {
    fn drop(&mut self) {
        let mut bound = match self.registry.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        bound.remove(&self.hotkey);
    }
}

/// Watches an input-event stream for a hotkey and fires engine triggers.
pub struct HotkeyWatcher;

impl HotkeyWatcher {
    /// Drive `source` and send [`EngineCommand::Trigger`] whenever the
    /// hotkey's terminal key is pressed with its modifiers held.
    pub fn spawn(
        mut source: Box<dyn InputSource>,
        hotkey: Hotkey,
        cmd_tx: mpsc::Sender<EngineCommand>,
    ) -> anyhow::Result<tokio::task::JoinHandle<()>> {
        let (tx, mut rx) = mpsc::unbounded_channel::<InputEvent>();
        source.start(tx)?;

        Ok(tokio::spawn(async move {
            // Keep the source alive for as long as the watcher runs.
            let _source = source;
            let mut ctrl = false;
            let mut shift = false;
            let mut alt = false;

            while let Some(event) = rx.recv().await {
                let EventKind::Key { symbol, action } = event.kind else {
                    continue;
                };
                let held = action == KeyAction::Press;
                match symbol {
                    KeySymbol::Control => ctrl = held,
                    KeySymbol::Shift => shift = held,
                    KeySymbol::Alt => alt = held,
                    _ if held
                        && symbol == hotkey.key
                        && ctrl == hotkey.ctrl
                        && shift == hotkey.shift
                        && alt == hotkey.alt =>
                    {
                        if cmd_tx.send(EngineCommand::Trigger).await.is_err() {
                            warn!("engine command channel closed, stopping hotkey watcher");
                            break;
                        }
                    }
                    _ => {}
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::ReplaySource;

    fn key(timestamp_us: u64, symbol: KeySymbol, action: KeyAction) -> InputEvent {
        InputEvent {
            timestamp_us,
            kind: EventKind::Key { symbol, action },
        }
    }

    #[test]
    fn duplicate_registration_conflicts() {
        let registry = HotkeyRegistry::new();
        let hotkey = Hotkey::parse("ctrl+p").unwrap();

        let handle = registry.register(hotkey.clone()).unwrap();
        assert!(matches!(
            registry.register(hotkey.clone()),
            Err(HotkeyError::HotkeyConflict(_))
        ));

        drop(handle);
        // Freed on drop, so rebinding succeeds.
        registry.register(hotkey).unwrap();
    }

    #[test]
    fn distinct_combinations_coexist() {
        let registry = HotkeyRegistry::new();
        let _a = registry.register(Hotkey::parse("ctrl+p").unwrap()).unwrap();
        let _b = registry.register(Hotkey::parse("ctrl+q").unwrap()).unwrap();
        let _c = registry.register(Hotkey::parse("p").unwrap()).unwrap();
    }

    #[test]
    fn parse_accepts_modifier_chains() {
        let hotkey = Hotkey::parse("ctrl+shift+p").unwrap();
        assert!(hotkey.ctrl && hotkey.shift && !hotkey.alt);
        assert_eq!(hotkey.key, KeySymbol::Char('p'));

        assert!(Hotkey::parse("ctrl+shift").is_err());
        assert!(Hotkey::parse("").is_err());
    }

    #[test]
    fn parse_accepts_function_keys() {
        let hotkey = Hotkey::parse("ctrl+f9").unwrap();
        assert!(hotkey.ctrl);
        // The parsed symbol matches what the hook emits for the key, so
        // the watcher can recognize the press.
        assert_eq!(hotkey.key, KeySymbol::from_rdev(rdev::Key::F9, None));

        // A bare 'f' is still the character key, and out-of-range
        // function numbers are rejected.
        assert_eq!(Hotkey::parse("f").unwrap().key, KeySymbol::Char('f'));
        assert!(Hotkey::parse("f13").is_err());
    }

    #[tokio::test]
    async fn watcher_triggers_only_on_full_combination() {
        let hotkey = Hotkey::parse("ctrl+p").unwrap();
        let events = vec![
            // Bare 'p' without ctrl held: no trigger.
            key(0, KeySymbol::Char('p'), KeyAction::Press),
            key(1, KeySymbol::Char('p'), KeyAction::Release),
            // Ctrl held, 'p' pressed: trigger.
            key(2, KeySymbol::Control, KeyAction::Press),
            key(3, KeySymbol::Char('p'), KeyAction::Press),
            key(4, KeySymbol::Char('p'), KeyAction::Release),
            key(5, KeySymbol::Control, KeyAction::Release),
            // Ctrl released again: no trigger.
            key(6, KeySymbol::Char('p'), KeyAction::Press),
        ];

        let (cmd_tx, mut cmd_rx) = mpsc::channel(8);
        let watcher = HotkeyWatcher::spawn(
            Box::new(ReplaySource::new(events)),
            hotkey,
            cmd_tx,
        )
        .unwrap();
        watcher.await.unwrap();

        let mut triggers = 0;
        while let Ok(cmd) = cmd_rx.try_recv() {
            assert!(matches!(cmd, EngineCommand::Trigger));
            triggers += 1;
        }
        assert_eq!(triggers, 1);
    }
}
