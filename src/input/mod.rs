//! Input capture sources

mod replay_source;
mod rdev_source;
mod source;

pub use rdev_source::RdevSource;
pub use replay_source::ReplaySource;
pub use source::InputSource;
