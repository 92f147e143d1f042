//! Runtime-tunable configuration for the volkey engine.
//!
//! Two pieces of shared, externally-edited state live here:
//! - [`Thresholds`] behind a [`ThresholdHandle`]: long-press durations the
//!   recognizer reads fresh every time it arms a timer, so edits take effect
//!   on the next press rather than the current one.
//! - [`CustomKeybind`] definitions behind a [`KeybindRegistry`]: the ordered
//!   keybind list the sequence matcher consults fresh on every event.
//!
//! The core never enforces bounds on thresholds; pathological values are the
//! caller's prerogative and the engine floors them only at the point of use.

mod keybind;
mod thresholds;

pub use keybind::{CustomKeybind, KeybindRegistry, KeybindStep, PressType};
pub use thresholds::{ThresholdHandle, Thresholds};
