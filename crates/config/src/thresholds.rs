//! Long-press duration configuration.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use volkey_protocol::HardwareKey;

/// Default long-press threshold for a single key, in milliseconds.
pub const DEFAULT_LONG_PRESS_MS: u64 = 500;
/// Default combo long-press threshold, in milliseconds.
pub const DEFAULT_COMBO_LONG_PRESS_MS: u64 = 500;

/// Long-press durations in milliseconds. No bounds are enforced here; the
/// engine floors non-positive values at the point of use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Hold duration after which a lone volume-up press counts as long.
    pub volume_up_long_press_ms: u64,
    /// Hold duration after which a lone volume-down press counts as long.
    pub volume_down_long_press_ms: u64,
    /// Hold duration after which both keys held together count as a combo.
    pub combo_long_press_ms: u64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            volume_up_long_press_ms: DEFAULT_LONG_PRESS_MS,
            volume_down_long_press_ms: DEFAULT_LONG_PRESS_MS,
            combo_long_press_ms: DEFAULT_COMBO_LONG_PRESS_MS,
        }
    }
}

impl Thresholds {
    /// The single-key long-press threshold for `key`.
    pub fn long_press_ms(&self, key: HardwareKey) -> u64 {
        match key {
            HardwareKey::VolumeUp => self.volume_up_long_press_ms,
            HardwareKey::VolumeDown => self.volume_down_long_press_ms,
        }
    }
}

/// Cloneable shared handle to the current thresholds.
///
/// The recognizer holds one of these and calls [`ThresholdHandle::snapshot`]
/// at the moment it arms a timer; values are never cached across a press
/// cycle.
#[derive(Debug, Clone, Default)]
pub struct ThresholdHandle {
    inner: Arc<RwLock<Thresholds>>,
}

impl ThresholdHandle {
    /// Create a handle seeded with the given thresholds.
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            inner: Arc::new(RwLock::new(thresholds)),
        }
    }

    /// Copy out the current thresholds.
    pub fn snapshot(&self) -> Thresholds {
        *self.inner.read()
    }

    /// Replace the thresholds wholesale.
    pub fn set(&self, thresholds: Thresholds) {
        *self.inner.write() = thresholds;
    }

    /// Edit the thresholds in place.
    pub fn update(&self, f: impl FnOnce(&mut Thresholds)) {
        f(&mut self.inner.write());
    }
}
