//! Pre-recorded event source
//!
//! Feeds a fixed event sequence through the same channel the live hook
//! uses. This is how tests and the `replay` CLI mode drive the recorder
//! without touching the OS.

use crate::data::InputEvent;
use crate::input::InputSource;
use anyhow::Result;
use tokio::sync::mpsc;

/// Input source that replays a fixed, pre-recorded sequence.
pub struct ReplaySource {
    events: Vec<InputEvent>,
}

impl ReplaySource {
    pub fn new(events: Vec<InputEvent>) -> Self {
        Self { events }
    }
}

impl InputSource for ReplaySource {
    fn start(&mut self, tx: mpsc::UnboundedSender<InputEvent>) -> Result<()> {
        // Delivery is synchronous; recipients drain at their own pace.
        for event in self.events.drain(..) {
            if tx.send(event).is_err() {
                break;
            }
        }
        Ok(())
    }

    fn stop(&mut self) {}
}
