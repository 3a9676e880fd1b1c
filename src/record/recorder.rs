//! Recording engine
//!
//! Owns the start/stop lifecycle of global input capture. The OS hook is
//! a process-wide exclusive resource, so acquisition goes through a
//! one-slot registry: a second active recorder fails fast instead of
//! queueing. ESC terminates the session from inside the event stream; the
//! teardown runs on the drain task, never on the hook callback thread.

use crate::data::{EventKind, InputEvent, KeyAction, KeySymbol};
use crate::input::InputSource;
use crate::record::RecordingSession;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::info;

/// Recording lifecycle errors. All are fatal to the call and recoverable
/// by the caller correcting state and retrying.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("a recording session is already active")]
    AlreadyRecording,

    #[error("the global input hook is held by another recorder")]
    HookUnavailable,

    #[error("the recording session is not sealed yet")]
    SessionNotSealed,

    #[error("input source failed to start: {0}")]
    Source(String),
}

/// Process-wide hook slot. At most one recorder may capture at a time.
static HOOK_SLOT: AtomicBool = AtomicBool::new(false);

struct HookGuard {
    _priv: (),
}

impl HookGuard {
    fn acquire() -> Option<Self> {
        HOOK_SLOT
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
            .then_some(HookGuard { _priv: () })
    }
}

impl Drop for HookGuard {
    fn drop(&mut self) {
        HOOK_SLOT.store(false, Ordering::SeqCst);
    }
}

/// Shared between the recorder and the drain task so whichever side stops
/// first performs the release exactly once.
struct Teardown {
    guard: Mutex<Option<HookGuard>>,
}

impl Teardown {
    fn release(&self) {
        let mut slot = match self.guard.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        slot.take();
    }
}

/// Which event classes a session keeps. ESC handling is not subject to
/// filtering; it always terminates the session.
#[derive(Debug, Clone, Copy)]
pub struct EventFilter {
    pub keyboard: bool,
    pub mouse_click: bool,
}

impl Default for EventFilter {
    fn default() -> Self {
        Self {
            keyboard: true,
            mouse_click: true,
        }
    }
}

impl EventFilter {
    fn allows(&self, kind: &EventKind) -> bool {
        match kind {
            EventKind::Key { .. } => self.keyboard,
            EventKind::MouseClick { .. } => self.mouse_click,
        }
    }
}

/// Global input recorder.
///
/// Appends captured events to a [`RecordingSession`] under its lock until
/// stopped explicitly or by an ESC press in the stream.
pub struct Recorder {
    source: Box<dyn InputSource>,
    filter: EventFilter,
    session: Option<Arc<RecordingSession>>,
    teardown: Option<Arc<Teardown>>,
    drain: Option<tokio::task::JoinHandle<()>>,
}

impl Recorder {
    pub fn new(source: Box<dyn InputSource>) -> Self {
        Self::with_filter(source, EventFilter::default())
    }

    pub fn with_filter(source: Box<dyn InputSource>, filter: EventFilter) -> Self {
        Self {
            source,
            filter,
            session: None,
            teardown: None,
            drain: None,
        }
    }

    /// Start a new recording session.
    ///
    /// Fails with [`RecordError::AlreadyRecording`] when this recorder is
    /// active, and [`RecordError::HookUnavailable`] when another recorder
    /// holds the process-wide hook slot.
    pub fn start(&mut self) -> Result<(), RecordError> {
        if self.is_recording() {
            return Err(RecordError::AlreadyRecording);
        }

        let guard = HookGuard::acquire().ok_or(RecordError::HookUnavailable)?;

        let session = Arc::new(RecordingSession::new());
        let teardown = Arc::new(Teardown {
            guard: Mutex::new(Some(guard)),
        });

        let (tx, mut rx) = mpsc::unbounded_channel::<InputEvent>();
        // A start failure drops the guard and frees the slot immediately.
        self.source
            .start(tx)
            .map_err(|e| RecordError::Source(e.to_string()))?;

        let drain_session = session.clone();
        let drain_teardown = teardown.clone();
        let filter = self.filter;
        let drain = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                // ESC terminates even when keyboard capture is off.
                if is_escape_press(&event) {
                    info!("ESC received, sealing recording session");
                    break;
                }
                if filter.allows(&event.kind) {
                    drain_session.append(event);
                }
            }
            // Runs for both the ESC path and a closed channel. The hook
            // forwarding detaches on its own once the receiver is gone.
            drain_session.seal();
            drain_teardown.release();
        });

        self.session = Some(session);
        self.teardown = Some(teardown);
        self.drain = Some(drain);
        info!("recording session started");
        Ok(())
    }

    /// Stop recording and seal the session. Idempotent; a no-op when no
    /// session is active.
    pub fn stop(&mut self) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        self.source.stop();
        session.seal();
        if let Some(teardown) = self.teardown.as_ref() {
            teardown.release();
        }
        info!("recording session stopped");
    }

    /// True while a session is active and unsealed.
    pub fn is_recording(&self) -> bool {
        self.session
            .as_ref()
            .map(|s| !s.is_sealed())
            .unwrap_or(false)
    }

    /// Snapshot copy of the sealed event sequence.
    pub fn events(&self) -> Result<Vec<InputEvent>, RecordError> {
        match self.session.as_ref() {
            None => Ok(Vec::new()),
            Some(session) => session.snapshot().ok_or(RecordError::SessionNotSealed),
        }
    }

    /// Wait for the drain task to finish (ESC or source exhaustion).
    pub async fn wait(&mut self) {
        if let Some(drain) = self.drain.take() {
            let _ = drain.await;
        }
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        self.source.stop();
        if let Some(teardown) = self.teardown.as_ref() {
            teardown.release();
        }
    }
}

fn is_escape_press(event: &InputEvent) -> bool {
    matches!(
        event.kind,
        EventKind::Key {
            symbol: KeySymbol::Escape,
            action: KeyAction::Press,
        }
    )
}
