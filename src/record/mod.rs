//! Recording engine: global input capture into a sealed session

mod recorder;
mod session;

pub use recorder::{EventFilter, RecordError, Recorder};
pub use session::RecordingSession;
