//! Screen capture and image matching

pub mod engine;
pub mod matcher;

pub use engine::{
    Capture, CaptureCode, CaptureError, CaptureStrategy, ScreenCaptureEngine, StrategyError,
};
pub use matcher::MatchError;
