//! macropilot
//!
//! Records global mouse and keyboard input into replayable macros, gates
//! replay on screen-region image matches, and keeps saved macros in
//! password-encrypted containers.

mod config;
mod data;
mod input;
mod logging;
mod record;
mod runner;
mod screen;
mod store;

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use tracing::{error, info, warn};
use uuid::Uuid;

use config::Config;
use data::{blocks_from_events, EventFile, Macro, MacroBlock, Region};
use input::RdevSource;
use record::{EventFilter, Recorder};
use runner::{
    create_engine_channels, EngineCommand, EngineStatus, ExecutionEngine, Hotkey, HotkeyRegistry,
    HotkeyWatcher, RdevDispatcher, RunState, ScreenSource,
};
use screen::{CaptureCode, CaptureError, ScreenCaptureEngine};
use store::MacroStore;

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = logging::init_logging()?;

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    let config = Config::load()?;

    match args[1].as_str() {
        "record" => {
            let out = flag_value(&args, "--out")
                .map(PathBuf::from)
                .context("record requires --out <events.json>")?;
            cmd_record(&config, out).await
        }
        "replay" => {
            let events = flag_value(&args, "--events")
                .map(PathBuf::from)
                .context("replay requires --events <events.json>")?;
            cmd_replay(&config, events).await
        }
        "encrypt" => {
            let events = flag_value(&args, "--events")
                .map(PathBuf::from)
                .context("encrypt requires --events <events.json>")?;
            let out = flag_value(&args, "--out")
                .map(PathBuf::from)
                .context("encrypt requires --out <macro.mpm>")?;
            let name = flag_value(&args, "--name").unwrap_or_else(|| "macro".to_string());
            let password = flag_value(&args, "--password")
                .context("encrypt requires --password <password>")?;
            cmd_encrypt(events, out, name, &password)
        }
        "run" => {
            let path = flag_value(&args, "--macro")
                .map(PathBuf::from)
                .context("run requires --macro <macro.mpm>")?;
            let password =
                flag_value(&args, "--password").context("run requires --password <password>")?;
            let hotkey = flag_value(&args, "--hotkey")
                .unwrap_or_else(|| config.execution.hotkey.clone());
            cmd_run(&config, path, &password, &hotkey).await
        }
        other => {
            print_help();
            bail!("unknown command: {other}");
        }
    }
}

/// Value following a `--flag`, if both are present.
fn flag_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

/// Capture global input until ESC, then write the session as JSON.
async fn cmd_record(config: &Config, out: PathBuf) -> Result<()> {
    let filter = EventFilter {
        keyboard: config.input.capture_keyboard,
        mouse_click: config.input.capture_mouse_click,
    };
    let mut recorder = Recorder::with_filter(Box::new(RdevSource::new()), filter);
    recorder.start()?;
    info!("recording started; press ESC to stop");

    recorder.wait().await;
    let events = recorder.events()?;

    let file = EventFile::new(Uuid::new_v4().to_string(), events);
    file.save(&out)?;
    info!("saved {} events to {:?}", file.events.len(), out);
    Ok(())
}

/// Replay a recorded event file as synthetic input, once, immediately.
async fn cmd_replay(config: &Config, events_path: PathBuf) -> Result<()> {
    let file = EventFile::load(&events_path)?;
    if file.events.is_empty() {
        bail!("event file {:?} holds no events", events_path);
    }
    info!(
        "replaying session {} ({} events, recorded on {})",
        file.session_id,
        file.events.len(),
        file.platform
    );

    let blocks = blocks_from_events(&file.events);
    let macro_def = Macro::new(file.session_id.clone(), blocks);

    // Converted blocks carry no conditions, so the engine never touches
    // the screen here; a stub keeps replay working on headless setups.
    run_once(
        config,
        macro_def,
        Box::new(RdevDispatcher::new()),
        Box::new(NoScreen),
    )
    .await
}

/// Convert a recorded event file into an encrypted macro container.
fn cmd_encrypt(events_path: PathBuf, out: PathBuf, name: String, password: &str) -> Result<()> {
    let file = EventFile::load(&events_path)?;
    let blocks = blocks_from_events(&file.events);
    let macro_def = Macro::new(name, blocks);

    let store = MacroStore::new();
    store.save(&out, password, &macro_def)?;
    info!(
        "encrypted macro {:?} ({} blocks) to {:?}",
        macro_def.name,
        macro_def.blocks.len(),
        out
    );
    Ok(())
}

/// Load an encrypted macro, arm it on a hotkey and run until Ctrl+C.
async fn cmd_run(config: &Config, path: PathBuf, password: &str, hotkey_spec: &str) -> Result<()> {
    let mut store = MacroStore::new();
    let mut macro_def = store.load(&path, password)?;
    info!(
        "loaded macro {:?} ({} blocks)",
        macro_def.name,
        macro_def.blocks.len()
    );

    // Condition blocks written without a wait budget fall back to the
    // configured default.
    for block in &mut macro_def.blocks {
        if let MacroBlock::Condition(condition) = block {
            if condition.timeout.is_zero() {
                condition.timeout = config.default_condition_timeout();
            }
        }
    }

    let hotkey = Hotkey::parse(hotkey_spec)?;
    let screen = ScreenCaptureEngine::new()?;

    let (cmd_tx, cmd_rx, status_tx) = create_engine_channels();
    let mut engine = ExecutionEngine::new(
        macro_def,
        Box::new(RdevDispatcher::new()),
        Box::new(screen),
        config.poll_interval(),
        cmd_rx,
        status_tx.clone(),
    );

    let registry = HotkeyRegistry::new();
    engine.arm(&registry, hotkey.clone())?;

    let _watcher = HotkeyWatcher::spawn(Box::new(RdevSource::new()), hotkey.clone(), cmd_tx.clone())?;
    info!("armed on {hotkey}; press Ctrl+C to exit");

    spawn_status_reporter(status_tx.subscribe());
    let engine_task = tokio::spawn(engine.run());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    info!("Ctrl+C received, shutting down");
    let _ = cmd_tx.send(EngineCommand::Shutdown).await;
    let _ = engine_task.await;

    info!("shutdown complete");
    Ok(())
}

/// Drive one triggered execution to a terminal state and shut down.
async fn run_once(
    config: &Config,
    macro_def: Macro,
    dispatcher: Box<dyn runner::InputDispatcher>,
    screen: Box<dyn ScreenSource>,
) -> Result<()> {
    let (cmd_tx, cmd_rx, status_tx) = create_engine_channels();
    let engine = ExecutionEngine::new(
        macro_def,
        dispatcher,
        screen,
        config.poll_interval(),
        cmd_rx,
        status_tx.clone(),
    );

    let mut status_rx = status_tx.subscribe();
    let engine_task = tokio::spawn(engine.run());
    cmd_tx
        .send(EngineCommand::Trigger)
        .await
        .context("execution engine exited before triggering")?;

    let outcome = loop {
        match status_rx.recv().await {
            Ok(EngineStatus::State(state)) if is_terminal(state) => break state,
            Ok(EngineStatus::Progress { index, total }) => {
                info!("block {index}/{total}");
            }
            Ok(EngineStatus::Failed { code, message }) => {
                error!("run failed [{code}]: {message}");
            }
            Ok(EngineStatus::State(_)) => {}
            Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
            Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                bail!("execution engine exited without a terminal state")
            }
        }
    };

    let _ = cmd_tx.send(EngineCommand::Shutdown).await;
    let _ = engine_task.await;

    match outcome {
        RunState::Completed => Ok(()),
        RunState::Cancelled => bail!("replay was cancelled"),
        _ => bail!("replay failed; see log for the diagnostic code"),
    }
}

fn is_terminal(state: RunState) -> bool {
    matches!(
        state,
        RunState::Completed | RunState::Cancelled | RunState::Failed
    )
}

/// Log engine status broadcasts. This is the user-facing run indicator
/// for a headless CLI.
fn spawn_status_reporter(mut status_rx: tokio::sync::broadcast::Receiver<EngineStatus>) {
    tokio::spawn(async move {
        loop {
            match status_rx.recv().await {
                Ok(EngineStatus::State(state)) => info!("engine state: {state:?}"),
                Ok(EngineStatus::Progress { index, total }) => info!("block {index}/{total}"),
                Ok(EngineStatus::Failed { code, message }) => {
                    error!("run failed [{code}]: {message}")
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("status reporter lagged, {skipped} updates dropped");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

/// Screen stub for modes whose macros cannot contain condition blocks.
struct NoScreen;

impl ScreenSource for NoScreen {
    fn capture(&self, _region: Region) -> Result<image::RgbaImage, CaptureError> {
        Err(CaptureError {
            code: CaptureCode::Cap004,
            message: "screen capture is not available in replay mode".to_string(),
        })
    }
}

fn print_help() {
    println!("macropilot - hotkey-triggered input macro recorder and runner");
    println!();
    println!("USAGE:");
    println!("    macropilot <COMMAND> [OPTIONS]");
    println!();
    println!("COMMANDS:");
    println!("    record   Capture global input until ESC");
    println!("                 --out <events.json>");
    println!("    replay   Replay a recorded event file once");
    println!("                 --events <events.json>");
    println!("    encrypt  Build an encrypted macro from an event file");
    println!("                 --events <events.json> --out <macro.mpm>");
    println!("                 --password <password> [--name <name>]");
    println!("    run      Arm an encrypted macro on a hotkey");
    println!("                 --macro <macro.mpm> --password <password>");
    println!("                 [--hotkey <spec>]  (default from config, e.g. ctrl+m)");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help    Print this help message");
    println!();
    println!("ENVIRONMENT:");
    println!("    RUST_LOG              Set log level (e.g., debug, info, warn)");
    println!("    MACROPILOT_LOG_PATH   Override the log directory");
}
