//! Macro execution engine
//!
//! Replays a macro block by block: action blocks dispatch synthetic input
//! and advance; condition blocks poll screen capture plus image matching
//! until the region matches or the timeout elapses. The run loop owns its
//! command receiver and broadcasts status for a tray-style indicator.
//! Cancellation is observed at block and poll boundaries, never in the
//! middle of a synthetic-input dispatch.

use crate::data::{ConditionBlock, Macro, MacroBlock, Region};
use crate::runner::{
    EngineCommand, EngineStatus, Hotkey, HotkeyError, HotkeyHandle, HotkeyRegistry,
    InputDispatcher, RunState,
};
use crate::screen::{matcher, CaptureError, ScreenCaptureEngine};
use image::RgbaImage;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Screen access seam for condition evaluation.
pub trait ScreenSource: Send {
    fn capture(&self, region: Region) -> Result<RgbaImage, CaptureError>;
}

impl ScreenSource for ScreenCaptureEngine {
    fn capture(&self, region: Region) -> Result<RgbaImage, CaptureError> {
        ScreenCaptureEngine::capture(self, region).map(|capture| capture.image)
    }
}

/// Create the command/status channel pair an engine runs on.
pub fn create_engine_channels() -> (
    mpsc::Sender<EngineCommand>,
    mpsc::Receiver<EngineCommand>,
    broadcast::Sender<EngineStatus>,
) {
    let (cmd_tx, cmd_rx) = mpsc::channel(16);
    let (status_tx, _) = broadcast::channel(64);
    (cmd_tx, cmd_rx, status_tx)
}

/// Per-run mutable state, one per triggered execution.
struct ExecutionContext {
    index: usize,
    total: usize,
    started: Instant,
    last_error: Option<String>,
}

impl ExecutionContext {
    fn new(total: usize) -> Self {
        Self {
            index: 0,
            total,
            started: Instant::now(),
            last_error: None,
        }
    }
}

enum ConditionOutcome {
    Matched,
    TimedOut,
    Cancelled,
    Error(String),
}

enum RunOutcome {
    Completed,
    Cancelled,
    Failed,
}

/// The execution engine for one macro.
pub struct ExecutionEngine {
    macro_def: Macro,
    dispatcher: Box<dyn InputDispatcher>,
    screen: Box<dyn ScreenSource>,
    poll_interval: Duration,
    cmd_rx: mpsc::Receiver<EngineCommand>,
    status_tx: broadcast::Sender<EngineStatus>,
    hotkey: Option<HotkeyHandle>,
    state: RunState,
    shutdown: bool,
}

impl ExecutionEngine {
    pub fn new(
        macro_def: Macro,
        dispatcher: Box<dyn InputDispatcher>,
        screen: Box<dyn ScreenSource>,
        poll_interval: Duration,
        cmd_rx: mpsc::Receiver<EngineCommand>,
        status_tx: broadcast::Sender<EngineStatus>,
    ) -> Self {
        Self {
            macro_def,
            dispatcher,
            screen,
            poll_interval,
            cmd_rx,
            status_tx,
            hotkey: None,
            state: RunState::Idle,
            shutdown: false,
        }
    }

    /// Bind the trigger hotkey. Fails with
    /// [`HotkeyError::HotkeyConflict`] if the combination is taken.
    pub fn arm(&mut self, registry: &HotkeyRegistry, hotkey: Hotkey) -> Result<(), HotkeyError> {
        let handle = registry.register(hotkey)?;
        info!("macro {:?} armed on {}", self.macro_def.name, handle.hotkey());
        self.hotkey = Some(handle);
        self.set_state(RunState::Armed);
        Ok(())
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Run until shutdown. Each trigger executes the macro once; the
    /// engine re-arms afterwards so the hotkey can fire again.
    pub async fn run(mut self) {
        if self.hotkey.is_some() {
            self.set_state(RunState::Armed);
        }

        loop {
            let Some(cmd) = self.cmd_rx.recv().await else {
                break;
            };
            match cmd {
                EngineCommand::Shutdown => break,
                // Nothing is running; a stray cancel is a no-op.
                EngineCommand::Cancel => {}
                EngineCommand::Trigger => {
                    self.execute().await;
                    if self.shutdown {
                        break;
                    }
                    if self.hotkey.is_some() {
                        self.set_state(RunState::Armed);
                    }
                }
            }
        }
        info!("execution engine shut down");
    }

    async fn execute(&mut self) -> RunOutcome {
        let blocks = self.macro_def.blocks.clone();
        let mut ctx = ExecutionContext::new(blocks.len());
        self.set_state(RunState::Running);
        self.report_progress(&ctx);
        info!("macro {:?} triggered, {} blocks", self.macro_def.name, ctx.total);

        while ctx.index < ctx.total {
            if self.cancel_requested() {
                return self.finish_cancelled(&ctx);
            }

            match &blocks[ctx.index] {
                MacroBlock::Action { action, delay_ms } => {
                    if let Err(e) = self.dispatcher.dispatch(action) {
                        ctx.last_error = Some(e.to_string());
                        return self.finish_failed(&ctx, "DSP-001", e.to_string());
                    }
                    // No artificial delay unless the block encodes one.
                    if *delay_ms > 0 {
                        tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
                    }
                    ctx.index += 1;
                    self.report_progress(&ctx);
                }
                MacroBlock::Condition(condition) => {
                    self.set_state(RunState::WaitingOnCondition);
                    match self.await_condition(condition).await {
                        ConditionOutcome::Matched => {
                            self.set_state(RunState::Running);
                            ctx.index += 1;
                            self.report_progress(&ctx);
                        }
                        ConditionOutcome::TimedOut => {
                            // The index stays on the failed condition. No
                            // skip-ahead: later blocks assume it held.
                            let message = format!(
                                "condition at block {} never matched within {:?}",
                                ctx.index, condition.timeout
                            );
                            error!(code = "TMO-001", "{message}");
                            ctx.last_error = Some(message.clone());
                            return self.finish_failed(&ctx, "TMO-001", message);
                        }
                        ConditionOutcome::Cancelled => {
                            return self.finish_cancelled(&ctx);
                        }
                        ConditionOutcome::Error(message) => {
                            ctx.last_error = Some(message.clone());
                            return self.finish_failed(&ctx, "CAP-002", message);
                        }
                    }
                }
            }
        }

        info!(
            "macro {:?} completed in {:?}",
            self.macro_def.name,
            ctx.started.elapsed()
        );
        self.set_state(RunState::Completed);
        RunOutcome::Completed
    }

    /// Poll capture + match until success, timeout, or cancellation.
    /// Captures at the reference's rectangle so an edited live region
    /// cannot drift the comparison dimensions.
    async fn await_condition(&mut self, condition: &ConditionBlock) -> ConditionOutcome {
        let Some(reference) = condition.image.to_image() else {
            return ConditionOutcome::Error("reference image data is corrupt".to_string());
        };
        let deadline = Instant::now() + condition.timeout;

        loop {
            if self.cancel_requested() {
                return ConditionOutcome::Cancelled;
            }

            match self.screen.capture(condition.region) {
                Ok(live) => match matcher::matches(&reference, &live, condition.threshold) {
                    Ok(true) => return ConditionOutcome::Matched,
                    Ok(false) => {}
                    // Region drift is a contract violation, not a retry case.
                    Err(e) => return ConditionOutcome::Error(e.to_string()),
                },
                // The capture engine already logged its code; the run halts.
                Err(e) => return ConditionOutcome::Error(e.to_string()),
            }

            if Instant::now() >= deadline {
                return ConditionOutcome::TimedOut;
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Drain pending commands without blocking. Re-pressing the trigger
    /// during a run cancels, as does an explicit cancel.
    fn cancel_requested(&mut self) -> bool {
        loop {
            match self.cmd_rx.try_recv() {
                Ok(EngineCommand::Cancel) | Ok(EngineCommand::Trigger) => return true,
                Ok(EngineCommand::Shutdown) => {
                    self.shutdown = true;
                    return true;
                }
                Err(mpsc::error::TryRecvError::Empty) => return false,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    self.shutdown = true;
                    return true;
                }
            }
        }
    }

    fn finish_cancelled(&mut self, ctx: &ExecutionContext) -> RunOutcome {
        warn!(
            "macro {:?} cancelled at block {}/{}",
            self.macro_def.name, ctx.index, ctx.total
        );
        self.set_state(RunState::Cancelled);
        RunOutcome::Cancelled
    }

    fn finish_failed(
        &mut self,
        ctx: &ExecutionContext,
        code: &'static str,
        message: String,
    ) -> RunOutcome {
        warn!(
            "macro {:?} failed at block {}/{}: {message}",
            self.macro_def.name, ctx.index, ctx.total
        );
        let _ = self.status_tx.send(EngineStatus::Failed { code, message });
        self.set_state(RunState::Failed);
        RunOutcome::Failed
    }

    fn set_state(&mut self, state: RunState) {
        self.state = state;
        let _ = self.status_tx.send(EngineStatus::State(state));
    }

    fn report_progress(&self, ctx: &ExecutionContext) {
        let _ = self.status_tx.send(EngineStatus::Progress {
            index: ctx.index,
            total: ctx.total,
        });
    }
}
