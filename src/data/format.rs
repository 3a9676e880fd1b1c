//! Event-file serialization
//!
//! An event file is a plain JSON document holding one recorded session's
//! ordered input events. It is the seam a test harness (and the `replay`
//! CLI mode) uses to feed the core without installing an OS hook.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::InputEvent;

/// A recorded session's events plus minimal provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventFile {
    /// Session identifier
    pub session_id: String,

    /// Platform the events were recorded on (windows, macos, linux)
    pub platform: String,

    /// Recorder version
    pub version: String,

    /// Ordered input events, timestamps ascending
    pub events: Vec<InputEvent>,
}

impl EventFile {
    /// Wrap a sealed event sequence for persistence.
    pub fn new(session_id: String, events: Vec<InputEvent>) -> Self {
        Self {
            session_id,
            platform: std::env::consts::OS.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            events,
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize event file")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write event file: {:?}", path))?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read event file: {:?}", path))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse event file: {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{EventKind, KeyAction, KeySymbol, MouseButton};

    fn sample_events() -> Vec<InputEvent> {
        vec![
            InputEvent {
                timestamp_us: 0,
                kind: EventKind::MouseClick {
                    button: MouseButton::Left,
                    x: 10.0,
                    y: 20.0,
                },
            },
            InputEvent {
                timestamp_us: 1500,
                kind: EventKind::Key {
                    symbol: KeySymbol::Char('a'),
                    action: KeyAction::Press,
                },
            },
        ]
    }

    #[test]
    fn event_file_round_trips_on_disk() {
        let dir = std::env::temp_dir().join(format!("macropilot-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("session.json");

        let file = EventFile::new("session-1".into(), sample_events());
        file.save(&path).unwrap();

        let loaded = EventFile::load(&path).unwrap();
        assert_eq!(loaded.session_id, "session-1");
        assert_eq!(loaded.events, sample_events());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn load_rejects_malformed_json() {
        let dir = std::env::temp_dir().join(format!("macropilot-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(EventFile::load(&path).is_err());
        std::fs::remove_dir_all(&dir).ok();
    }
}
