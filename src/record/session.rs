//! Recording session state

use crate::data::InputEvent;
use std::sync::Mutex;

struct SessionInner {
    events: Vec<InputEvent>,
    sealed: bool,
}

/// One recording session: a growable, lock-guarded event sequence.
///
/// Created when recording starts, sealed (read-only) when it stops. The
/// lock is held only for the duration of a single append or snapshot.
pub struct RecordingSession {
    inner: Mutex<SessionInner>,
}

impl RecordingSession {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SessionInner {
                events: Vec::new(),
                sealed: false,
            }),
        }
    }

    /// Append one event. Timestamps are clamped so the stored sequence is
    /// always non-decreasing in emission order. Appends after sealing are
    /// dropped; late hook callbacks may still race the stop path.
    pub fn append(&self, mut event: InputEvent) {
        let mut inner = self.lock();
        if inner.sealed {
            return;
        }
        if let Some(last) = inner.events.last() {
            if event.timestamp_us < last.timestamp_us {
                event.timestamp_us = last.timestamp_us;
            }
        }
        inner.events.push(event);
    }

    /// Seal the session. Idempotent.
    pub fn seal(&self) {
        self.lock().sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.lock().sealed
    }

    /// Snapshot copy of the events; `None` while still recording.
    pub fn snapshot(&self) -> Option<Vec<InputEvent>> {
        let inner = self.lock();
        inner.sealed.then(|| inner.events.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SessionInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for RecordingSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{EventKind, KeyAction, KeySymbol};

    fn key_event(timestamp_us: u64, c: char) -> InputEvent {
        InputEvent {
            timestamp_us,
            kind: EventKind::Key {
                symbol: KeySymbol::Char(c),
                action: KeyAction::Press,
            },
        }
    }

    #[test]
    fn snapshot_requires_sealed_session() {
        let session = RecordingSession::new();
        session.append(key_event(1, 'a'));
        assert!(session.snapshot().is_none());

        session.seal();
        let events = session.snapshot().unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn appends_after_seal_are_dropped() {
        let session = RecordingSession::new();
        session.append(key_event(1, 'a'));
        session.seal();
        session.append(key_event(2, 'b'));
        assert_eq!(session.snapshot().unwrap().len(), 1);
    }

    #[test]
    fn timestamps_never_decrease() {
        let session = RecordingSession::new();
        session.append(key_event(100, 'a'));
        session.append(key_event(50, 'b'));
        session.append(key_event(200, 'c'));
        session.seal();

        let stamps: Vec<u64> = session
            .snapshot()
            .unwrap()
            .iter()
            .map(|e| e.timestamp_us)
            .collect();
        assert_eq!(stamps, vec![100, 100, 200]);
    }

    #[test]
    fn seal_is_idempotent() {
        let session = RecordingSession::new();
        session.seal();
        session.seal();
        assert!(session.is_sealed());
    }
}
