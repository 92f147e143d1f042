//! Ordered keybind sequence matching over the raw key event stream.
//!
//! Purely observational: the matcher sees every transition the recognizer
//! sees, never consumes anything, and reports completed sequences by id.

mod matcher;

pub use matcher::{SIMULTANEOUS_WINDOW_MS, SequenceMatcher, StepInput};
