//! rdev-based global input hook source
//!
//! Works on Windows, macOS, and Linux (X11). The OS hook cannot be
//! uninstalled portably once `rdev::listen` is running, so the listener
//! thread is started at most once per process and shared state decides
//! whether events are forwarded. Stopping a source detaches its channel;
//! the hook itself stays installed but inert.

use crate::data::{EventKind, InputEvent, KeyAction, KeySymbol, MouseButton};
use crate::input::InputSource;
use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};
use std::thread;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// State shared between the hook callback and the active source.
struct HookShared {
    /// Channel of the currently recording source, if any
    tx: Option<mpsc::UnboundedSender<InputEvent>>,
    /// Session start, the zero point for timestamps
    started_at: Instant,
    /// Last observed pointer position in physical pixels; rdev button
    /// events carry no coordinates, so clicks take the tracked position
    last_x: f64,
    last_y: f64,
}

fn hook_shared() -> &'static Mutex<HookShared> {
    static SHARED: OnceLock<Mutex<HookShared>> = OnceLock::new();
    SHARED.get_or_init(|| {
        Mutex::new(HookShared {
            tx: None,
            started_at: Instant::now(),
            last_x: 0.0,
            last_y: 0.0,
        })
    })
}

static LISTENER_STARTED: AtomicBool = AtomicBool::new(false);

/// Global input hook source backed by `rdev::listen`.
pub struct RdevSource {
    attached: bool,
}

impl RdevSource {
    pub fn new() -> Self {
        Self { attached: false }
    }

    fn ensure_listener() {
        if LISTENER_STARTED.swap(true, Ordering::SeqCst) {
            return;
        }

        thread::spawn(move || {
            info!("global input hook installed");

            let callback = move |event: rdev::Event| {
                let mut shared = match hook_shared().lock() {
                    Ok(shared) => shared,
                    Err(poisoned) => poisoned.into_inner(),
                };

                let kind = match event.event_type {
                    rdev::EventType::MouseMove { x, y } => {
                        shared.last_x = x;
                        shared.last_y = y;
                        None
                    }
                    rdev::EventType::ButtonPress(button) => Some(EventKind::MouseClick {
                        button: MouseButton::from(button),
                        x: shared.last_x,
                        y: shared.last_y,
                    }),
                    rdev::EventType::KeyPress(key) => Some(EventKind::Key {
                        symbol: KeySymbol::from_rdev(key, event.name.as_deref()),
                        action: KeyAction::Press,
                    }),
                    rdev::EventType::KeyRelease(key) => Some(EventKind::Key {
                        symbol: KeySymbol::from_rdev(key, None),
                        action: KeyAction::Release,
                    }),
                    // Releases and scrolls are not part of the block model
                    rdev::EventType::ButtonRelease(_) | rdev::EventType::Wheel { .. } => None,
                };

                let Some(kind) = kind else {
                    return;
                };

                if let Some(tx) = shared.tx.as_ref() {
                    let input_event = InputEvent {
                        timestamp_us: shared.started_at.elapsed().as_micros() as u64,
                        kind,
                    };
                    if tx.send(input_event).is_err() {
                        debug!("event channel closed, detaching hook forwarding");
                        shared.tx = None;
                    }
                }
            };

            if let Err(e) = rdev::listen(callback) {
                error!("rdev listen error: {:?}", e);
                LISTENER_STARTED.store(false, Ordering::SeqCst);
            }
        });
    }
}

impl Default for RdevSource {
    fn default() -> Self {
        Self::new()
    }
}

impl InputSource for RdevSource {
    fn start(&mut self, tx: mpsc::UnboundedSender<InputEvent>) -> Result<()> {
        Self::ensure_listener();

        let mut shared = match hook_shared().lock() {
            Ok(shared) => shared,
            Err(poisoned) => poisoned.into_inner(),
        };
        shared.tx = Some(tx);
        shared.started_at = Instant::now();
        self.attached = true;

        info!("rdev input capture started");
        Ok(())
    }

    fn stop(&mut self) {
        if !self.attached {
            return;
        }
        let mut shared = match hook_shared().lock() {
            Ok(shared) => shared,
            Err(poisoned) => poisoned.into_inner(),
        };
        shared.tx = None;
        self.attached = false;
        info!("rdev input capture stopped");
    }
}
