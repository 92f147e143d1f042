//! User-defined keybind sequences and the shared registry handle.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use volkey_protocol::{HardwareKey, KeybindId};

use crate::thresholds::DEFAULT_LONG_PRESS_MS;

/// How long a step's press must be held to qualify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PressType {
    /// Released before the step's long-press threshold.
    Short,
    /// Held at least the step's long-press threshold.
    Long,
}

/// One step of a keybind sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeybindStep {
    /// Which key this step expects.
    pub key: HardwareKey,
    /// Short or long press.
    pub press: PressType,
    /// Threshold separating short from long for this step, in milliseconds.
    #[serde(default = "default_step_threshold")]
    pub long_press_threshold_ms: u64,
    /// Maximum gap allowed between this step's release and the next step's
    /// release, in milliseconds. Zero selects the fixed simultaneous window.
    #[serde(default)]
    pub max_delay_after_ms: u64,
}

fn default_step_threshold() -> u64 {
    DEFAULT_LONG_PRESS_MS
}

impl KeybindStep {
    /// A step expecting a short press of `key` with default timing.
    pub fn short(key: HardwareKey) -> Self {
        Self {
            key,
            press: PressType::Short,
            long_press_threshold_ms: default_step_threshold(),
            max_delay_after_ms: 0,
        }
    }

    /// A step expecting a long press of `key` with default timing.
    pub fn long(key: HardwareKey) -> Self {
        Self {
            key,
            press: PressType::Long,
            long_press_threshold_ms: default_step_threshold(),
            max_delay_after_ms: 0,
        }
    }

    /// Set the gap allowed before the next step.
    pub fn delay_after(mut self, ms: u64) -> Self {
        self.max_delay_after_ms = ms;
        self
    }

    /// Set this step's short/long threshold.
    pub fn threshold(mut self, ms: u64) -> Self {
        self.long_press_threshold_ms = ms;
        self
    }
}

/// A user-defined chorded sequence mapped to an action.
///
/// `action` and `haptic` are opaque to the engine; executing them is the
/// consumer's job once `KeybindMatched` is emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomKeybind {
    /// Stable identifier reported in `KeybindMatched`.
    pub id: KeybindId,
    /// Human-readable label.
    pub name: String,
    /// Disabled keybinds never seed new match candidates.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Ordered steps; one to four in practice. Empty sequences are ignored.
    pub steps: Vec<KeybindStep>,
    /// Opaque action identifier for the consumer.
    pub action: String,
    /// Opaque haptic pattern identifier for the consumer.
    #[serde(default)]
    pub haptic: Option<String>,
}

fn default_enabled() -> bool {
    true
}

/// Cloneable shared handle to the ordered keybind list.
///
/// The matcher takes a fresh snapshot on every event, so edits made between
/// two events are always visible to the next matching pass.
#[derive(Debug, Clone, Default)]
pub struct KeybindRegistry {
    inner: Arc<RwLock<Vec<CustomKeybind>>>,
}

impl KeybindRegistry {
    /// Create a registry seeded with the given keybinds.
    pub fn new(keybinds: Vec<CustomKeybind>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(keybinds)),
        }
    }

    /// Copy out the current keybind list, in registry order.
    pub fn snapshot(&self) -> Vec<CustomKeybind> {
        self.inner.read().clone()
    }

    /// Replace the whole list.
    pub fn set(&self, keybinds: Vec<CustomKeybind>) {
        *self.inner.write() = keybinds;
    }

    /// Insert a keybind, or replace the one with the same id in place.
    pub fn upsert(&self, keybind: CustomKeybind) {
        let mut list = self.inner.write();
        match list.iter_mut().find(|k| k.id == keybind.id) {
            Some(slot) => *slot = keybind,
            None => list.push(keybind),
        }
    }

    /// Remove a keybind by id. Returns true if one was removed.
    pub fn remove(&self, id: &KeybindId) -> bool {
        let mut list = self.inner.write();
        let before = list.len();
        list.retain(|k| &k.id != id);
        list.len() != before
    }

    /// Flip a keybind's enabled flag. Returns false if the id is unknown.
    pub fn set_enabled(&self, id: &KeybindId, enabled: bool) -> bool {
        let mut list = self.inner.write();
        match list.iter_mut().find(|k| &k.id == id) {
            Some(k) => {
                k.enabled = enabled;
                true
            }
            None => false,
        }
    }
}
