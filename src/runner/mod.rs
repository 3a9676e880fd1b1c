//! Execution engine - replays macros gated on screen conditions

mod dispatch;
mod engine;
mod hotkey;

pub use dispatch::{InputDispatcher, RdevDispatcher};
pub use engine::{create_engine_channels, ExecutionEngine, ScreenSource};
pub use hotkey::{Hotkey, HotkeyError, HotkeyHandle, HotkeyRegistry, HotkeyWatcher};

/// Commands that can be sent to a running execution engine
#[derive(Debug, Clone)]
pub enum EngineCommand {
    /// The trigger hotkey fired (or a test pulled the trigger directly)
    Trigger,
    /// Abort the current run at the next poll tick
    Cancel,
    /// Shut the engine down
    Shutdown,
}

/// Execution state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// No hotkey bound, nothing running
    Idle,
    /// Hotkey bound, waiting for a trigger
    Armed,
    /// Dispatching action blocks
    Running,
    /// Polling a condition block's screen match
    WaitingOnCondition,
    /// All blocks consumed without fatal error
    Completed,
    /// User cancellation observed
    Cancelled,
    /// A block failed; remaining blocks were not executed
    Failed,
}

/// Status updates broadcast by the engine. Progress is a side-effect
/// channel for a tray-style indicator, not a blocking contract.
#[derive(Debug, Clone)]
pub enum EngineStatus {
    /// State machine transition
    State(RunState),
    /// Current block index out of the total block count
    Progress { index: usize, total: usize },
    /// A run failed; `code` comes from the fixed diagnostic taxonomy
    Failed { code: &'static str, message: String },
}
