//! Input capture source trait

use crate::data::InputEvent;
use anyhow::Result;
use tokio::sync::mpsc;

/// Trait for input capture sources.
///
/// A source produces a time-ordered stream of input events on the provided
/// channel. The live implementation wraps the global OS hook; the replay
/// implementation feeds a pre-recorded event file so the recorder can be
/// exercised without any OS dependency.
pub trait InputSource: Send {
    /// Start producing events on the channel.
    fn start(&mut self, tx: mpsc::UnboundedSender<InputEvent>) -> Result<()>;

    /// Stop producing events. Idempotent.
    fn stop(&mut self);
}
