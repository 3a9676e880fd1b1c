//! Screen capture engine
//!
//! Captures a screen region at native pixel resolution through an explicit
//! ordered chain of strategies: the monitor-direct path first, then a
//! coarser desktop-blit fallback. Each attempt is classified on failure
//! and logged with its diagnostic code; those codes are the only
//! troubleshooting surface the end user sees, so logging is mandatory.

use crate::data::Region;
use image::RgbaImage;
use std::fmt;
use thiserror::Error;
use tracing::{error, warn};

/// Fixed diagnostic code taxonomy for capture failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureCode {
    /// Engine initialization failure (no display, enumeration denied)
    Cap001,
    /// Runtime capture error, including empty or zero-size frames
    Cap002,
    /// OS screen-recording permission denied
    Cap003,
    /// No capture device available
    Cap004,
}

impl CaptureCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureCode::Cap001 => "CAP-001",
            CaptureCode::Cap002 => "CAP-002",
            CaptureCode::Cap003 => "CAP-003",
            CaptureCode::Cap004 => "CAP-004",
        }
    }
}

impl fmt::Display for CaptureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A capture failure after the full strategy chain has been exhausted.
#[derive(Debug, Error)]
#[error("[{code}] {message}")]
pub struct CaptureError {
    pub code: CaptureCode,
    pub message: String,
}

/// Per-attempt failure, classified by the strategy that produced it.
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("no capture device: {0}")]
    NoDevice(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("capture failed: {0}")]
    Failed(String),

    #[error("capture produced an empty frame")]
    EmptyFrame,
}

impl StrategyError {
    fn code(&self) -> CaptureCode {
        match self {
            StrategyError::NoDevice(_) => CaptureCode::Cap004,
            StrategyError::PermissionDenied(_) => CaptureCode::Cap003,
            StrategyError::Failed(_) | StrategyError::EmptyFrame => CaptureCode::Cap002,
        }
    }
}

/// One successful capture: a frame plus the region and strategy it came from.
#[derive(Debug, Clone)]
pub struct Capture {
    pub image: RgbaImage,
    pub region: Region,
    /// Which strategy produced the frame; functionally irrelevant but kept
    /// for diagnostics
    pub strategy: &'static str,
}

/// A single capture path tried as part of the ordered chain.
pub trait CaptureStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn capture(&self, region: Region) -> Result<RgbaImage, StrategyError>;
}

/// Screen capture engine with an explicit fallback chain.
pub struct ScreenCaptureEngine {
    strategies: Vec<Box<dyn CaptureStrategy>>,
}

impl ScreenCaptureEngine {
    /// Build the engine with the platform strategy chain, verifying that
    /// at least one display can be enumerated.
    pub fn new() -> Result<Self, CaptureError> {
        let monitors = xcap::Monitor::all().map_err(|e| {
            let err = CaptureError {
                code: CaptureCode::Cap001,
                message: format!("display enumeration failed: {e}"),
            };
            error!(code = err.code.as_str(), "screen capture init failed: {e}");
            err
        })?;

        if monitors.is_empty() {
            let err = CaptureError {
                code: CaptureCode::Cap001,
                message: "no displays available".to_string(),
            };
            error!(code = err.code.as_str(), "screen capture init failed: no displays");
            return Err(err);
        }

        Ok(Self::with_strategies(vec![
            Box::new(MonitorDirect),
            Box::new(DesktopBlit),
        ]))
    }

    /// Build with an explicit chain. Strategies are tried in order, one
    /// attempt each.
    pub fn with_strategies(strategies: Vec<Box<dyn CaptureStrategy>>) -> Self {
        Self { strategies }
    }

    /// Capture a region, falling through the strategy chain on failure.
    pub fn capture(&self, region: Region) -> Result<Capture, CaptureError> {
        if !region.is_valid() {
            let err = CaptureError {
                code: CaptureCode::Cap002,
                message: format!("invalid capture region: {region:?}"),
            };
            error!(code = err.code.as_str(), "{}", err.message);
            return Err(err);
        }

        let mut permission_denied = false;
        let mut all_no_device = true;

        for strategy in &self.strategies {
            match strategy.capture(region) {
                Ok(frame) => {
                    if frame.width() == 0 || frame.height() == 0 {
                        warn!(
                            code = CaptureCode::Cap002.as_str(),
                            strategy = strategy.name(),
                            "capture produced a zero-size frame"
                        );
                        all_no_device = false;
                        continue;
                    }
                    return Ok(Capture {
                        image: frame,
                        region,
                        strategy: strategy.name(),
                    });
                }
                Err(e) => {
                    let code = e.code();
                    warn!(
                        code = code.as_str(),
                        strategy = strategy.name(),
                        "capture attempt failed: {e}"
                    );
                    match e {
                        StrategyError::NoDevice(_) => {}
                        StrategyError::PermissionDenied(_) => {
                            permission_denied = true;
                            all_no_device = false;
                        }
                        _ => all_no_device = false,
                    }
                }
            }
        }

        let code = if permission_denied {
            CaptureCode::Cap003
        } else if all_no_device && !self.strategies.is_empty() {
            CaptureCode::Cap004
        } else {
            CaptureCode::Cap002
        };
        let err = CaptureError {
            code,
            message: format!("all capture strategies failed for region {region:?}"),
        };
        error!(code = err.code.as_str(), "{}", err.message);
        Err(err)
    }
}

/// Classify an xcap error message into a strategy error.
fn classify(message: String) -> StrategyError {
    let lower = message.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not allowed") {
        StrategyError::PermissionDenied(message)
    } else if lower.contains("no monitor") || lower.contains("no display") {
        StrategyError::NoDevice(message)
    } else {
        StrategyError::Failed(message)
    }
}

fn crop_from_monitor(
    frame: RgbaImage,
    monitor_x: i32,
    monitor_y: i32,
    region: Region,
) -> Result<RgbaImage, StrategyError> {
    let rel_x = region.x - monitor_x;
    let rel_y = region.y - monitor_y;
    if rel_x < 0
        || rel_y < 0
        || rel_x as u32 + region.width > frame.width()
        || rel_y as u32 + region.height > frame.height()
    {
        return Err(StrategyError::Failed(format!(
            "region {region:?} exceeds captured frame {}x{}",
            frame.width(),
            frame.height()
        )));
    }
    Ok(image::imageops::crop_imm(&frame, rel_x as u32, rel_y as u32, region.width, region.height)
        .to_image())
}

/// Primary path: capture the monitor containing the region at its native
/// resolution and crop.
struct MonitorDirect;

impl CaptureStrategy for MonitorDirect {
    fn name(&self) -> &'static str {
        "monitor-direct"
    }

    fn capture(&self, region: Region) -> Result<RgbaImage, StrategyError> {
        let monitors = xcap::Monitor::all().map_err(|e| classify(e.to_string()))?;
        if monitors.is_empty() {
            return Err(StrategyError::NoDevice("no monitors enumerated".into()));
        }

        let monitor = monitors
            .into_iter()
            .find(|m| {
                let bounds = Region::new(m.x(), m.y(), m.width(), m.height());
                bounds.contains(region.x, region.y)
            })
            .ok_or_else(|| {
                StrategyError::Failed(format!("region {region:?} is outside every display"))
            })?;

        let frame = monitor
            .capture_image()
            .map_err(|e| classify(e.to_string()))?;
        if frame.width() == 0 || frame.height() == 0 {
            return Err(StrategyError::EmptyFrame);
        }

        crop_from_monitor(frame, monitor.x(), monitor.y(), region)
    }
}

/// Fallback path: grab the whole primary display and crop the region out,
/// the low-level copy used when the direct path cannot deliver.
struct DesktopBlit;

impl CaptureStrategy for DesktopBlit {
    fn name(&self) -> &'static str {
        "desktop-blit"
    }

    fn capture(&self, region: Region) -> Result<RgbaImage, StrategyError> {
        let monitors = xcap::Monitor::all().map_err(|e| classify(e.to_string()))?;
        let monitor = monitors
            .into_iter()
            .find(|m| m.is_primary())
            .ok_or_else(|| StrategyError::NoDevice("no primary monitor".into()))?;

        let frame = monitor
            .capture_image()
            .map_err(|e| classify(e.to_string()))?;
        if frame.width() == 0 || frame.height() == 0 {
            return Err(StrategyError::EmptyFrame);
        }

        crop_from_monitor(frame, monitor.x(), monitor.y(), region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingStrategy {
        name: &'static str,
        calls: Arc<AtomicUsize>,
        outcome: fn(Region) -> Result<RgbaImage, StrategyError>,
    }

    impl CaptureStrategy for CountingStrategy {
        fn name(&self) -> &'static str {
            self.name
        }

        fn capture(&self, region: Region) -> Result<RgbaImage, StrategyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.outcome)(region)
        }
    }

    fn strategy(
        name: &'static str,
        outcome: fn(Region) -> Result<RgbaImage, StrategyError>,
    ) -> (Box<dyn CaptureStrategy>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Box::new(CountingStrategy {
                name,
                calls: calls.clone(),
                outcome,
            }),
            calls,
        )
    }

    fn solid_frame(region: Region) -> Result<RgbaImage, StrategyError> {
        Ok(RgbaImage::from_pixel(
            region.width,
            region.height,
            image::Rgba([9, 9, 9, 255]),
        ))
    }

    fn runtime_failure(_region: Region) -> Result<RgbaImage, StrategyError> {
        Err(StrategyError::Failed("boom".into()))
    }

    fn region() -> Region {
        Region::new(0, 0, 8, 8)
    }

    #[test]
    fn primary_success_skips_fallback() {
        let (primary, primary_calls) = strategy("primary", solid_frame);
        let (fallback, fallback_calls) = strategy("fallback", solid_frame);
        let engine = ScreenCaptureEngine::with_strategies(vec![primary, fallback]);

        let capture = engine.capture(region()).unwrap();
        assert_eq!(capture.strategy, "primary");
        assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn fallback_attempted_exactly_once_after_primary_failure() {
        let (primary, primary_calls) = strategy("primary", runtime_failure);
        let (fallback, fallback_calls) = strategy("fallback", solid_frame);
        let engine = ScreenCaptureEngine::with_strategies(vec![primary, fallback]);

        let capture = engine.capture(region()).unwrap();
        assert_eq!(capture.strategy, "fallback");
        assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn both_paths_failing_yields_cap_002() {
        let (primary, primary_calls) = strategy("primary", runtime_failure);
        let (fallback, fallback_calls) = strategy("fallback", runtime_failure);
        let engine = ScreenCaptureEngine::with_strategies(vec![primary, fallback]);

        let err = engine.capture(region()).unwrap_err();
        assert_eq!(err.code, CaptureCode::Cap002);
        assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn permission_denied_yields_cap_003() {
        let (primary, _) = strategy("primary", |_| {
            Err(StrategyError::PermissionDenied("screen recording".into()))
        });
        let (fallback, _) = strategy("fallback", runtime_failure);
        let engine = ScreenCaptureEngine::with_strategies(vec![primary, fallback]);

        let err = engine.capture(region()).unwrap_err();
        assert_eq!(err.code, CaptureCode::Cap003);
    }

    #[test]
    fn no_device_anywhere_yields_cap_004() {
        let (primary, _) = strategy("primary", |_| {
            Err(StrategyError::NoDevice("unplugged".into()))
        });
        let (fallback, _) = strategy("fallback", |_| {
            Err(StrategyError::NoDevice("unplugged".into()))
        });
        let engine = ScreenCaptureEngine::with_strategies(vec![primary, fallback]);

        let err = engine.capture(region()).unwrap_err();
        assert_eq!(err.code, CaptureCode::Cap004);
    }

    #[test]
    fn empty_frame_triggers_fallback() {
        let (primary, _) = strategy("primary", |_| Ok(RgbaImage::new(0, 0)));
        let (fallback, fallback_calls) = strategy("fallback", solid_frame);
        let engine = ScreenCaptureEngine::with_strategies(vec![primary, fallback]);

        let capture = engine.capture(region()).unwrap();
        assert_eq!(capture.strategy, "fallback");
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn invalid_region_is_rejected_up_front() {
        let (primary, primary_calls) = strategy("primary", solid_frame);
        let engine = ScreenCaptureEngine::with_strategies(vec![primary]);

        let err = engine.capture(Region::new(0, 0, 0, 10)).unwrap_err();
        assert_eq!(err.code, CaptureCode::Cap002);
        assert_eq!(primary_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn crop_bounds_are_enforced() {
        let frame = RgbaImage::new(10, 10);
        let result = crop_from_monitor(frame, 0, 0, Region::new(5, 5, 10, 10));
        assert!(result.is_err());
    }

    #[test]
    fn crop_uses_monitor_relative_coordinates() {
        let mut frame = RgbaImage::new(10, 10);
        frame.put_pixel(5, 5, image::Rgba([1, 2, 3, 255]));

        // Monitor origin at (100, 100); region targets the marked pixel.
        let cropped = crop_from_monitor(frame, 100, 100, Region::new(105, 105, 2, 2)).unwrap();
        assert_eq!(cropped.get_pixel(0, 0), &image::Rgba([1, 2, 3, 255]));
    }
}
