//! Core data model: input events, macro blocks, event files

pub mod blocks;
pub mod events;
pub mod format;

pub use blocks::{
    blocks_from_events, ActionBlock, ConditionBlock, Macro, MacroBlock, ReferenceImage, Region,
};
pub use events::{EventKind, InputEvent, KeyAction, KeySymbol, MouseButton};
pub use format::EventFile;
