//! Macro block data structures
//!
//! A macro is an ordered list of blocks. Action blocks replay one input
//! event; condition blocks gate execution on a screen-region image match.

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use super::events::{EventKind, InputEvent, KeyAction, KeySymbol, MouseButton};

/// A rectangular screen region in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// A region is usable only with positive dimensions.
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x
            && x < self.x + self.width as i32
            && y >= self.y
            && y < self.y + self.height as i32
    }
}

/// A stored screenshot region a condition block compares against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceImage {
    pub width: u32,
    pub height: u32,
    /// Raw RGBA pixel data, row-major
    pub pixels: Vec<u8>,
}

impl ReferenceImage {
    /// Capture an owned copy of an image buffer.
    pub fn from_image(image: &RgbaImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            pixels: image.as_raw().clone(),
        }
    }

    /// Rebuild the image buffer; `None` if the pixel data does not match
    /// the recorded dimensions (corrupt container).
    pub fn to_image(&self) -> Option<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
    }
}

/// One replayable input directive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActionBlock {
    MouseClick {
        button: MouseButton,
        x: f64,
        y: f64,
    },
    Key {
        symbol: KeySymbol,
        action: KeyAction,
    },
}

/// A screen-match gate: execution pauses here until the captured region
/// matches the reference image, or the timeout elapses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionBlock {
    pub image: ReferenceImage,
    /// Rectangle the reference was captured from; re-captured at run time
    pub region: Region,
    /// Similarity floor in 0.0..=1.0
    pub threshold: f64,
    /// Wait budget before the run fails
    pub timeout: Duration,
}

/// One step of a macro.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MacroBlock {
    Action {
        action: ActionBlock,
        /// Explicit pause after dispatch; no delay unless recorded
        #[serde(default)]
        delay_ms: u64,
    },
    Condition(ConditionBlock),
}

/// A complete recorded macro. Block order is execution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Macro {
    pub id: Uuid,
    pub name: String,
    /// Unix seconds at creation
    pub created_at: u64,
    pub blocks: Vec<MacroBlock>,
}

impl Macro {
    pub fn new(name: impl Into<String>, blocks: Vec<MacroBlock>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            created_at: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
            blocks,
        }
    }
}

/// Turn a recorded event stream into action blocks, preserving the
/// inter-event gaps as post-dispatch delays. The final block carries no
/// delay.
pub fn blocks_from_events(events: &[InputEvent]) -> Vec<MacroBlock> {
    events
        .iter()
        .enumerate()
        .map(|(i, event)| {
            let delay_ms = events
                .get(i + 1)
                .map(|next| (next.timestamp_us.saturating_sub(event.timestamp_us)) / 1_000)
                .unwrap_or(0);
            let action = match event.kind {
                EventKind::MouseClick { button, x, y } => ActionBlock::MouseClick { button, x, y },
                EventKind::Key { symbol, action } => ActionBlock::Key { symbol, action },
            };
            MacroBlock::Action { action, delay_ms }
        })
        .collect()
}
