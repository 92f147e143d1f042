//! Shared plain-data types for the volkey gesture engine.
//!
//! This crate carries no logic beyond small accessors: the physical key
//! identities, raw key transitions as delivered by the event source, and the
//! classified events the engine emits. Both the engine and its consumers
//! depend on it; nothing here is async or fallible.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The two physical keys the engine tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HardwareKey {
    /// The volume-up rocker half.
    VolumeUp,
    /// The volume-down rocker half.
    VolumeDown,
}

/// Number of tracked key identities; sizes the fixed per-key state arrays.
pub const KEY_COUNT: usize = 2;

impl HardwareKey {
    /// Both key identities, in slot order.
    pub const ALL: [Self; KEY_COUNT] = [Self::VolumeUp, Self::VolumeDown];

    /// The other half of the rocker.
    pub fn other(self) -> Self {
        match self {
            Self::VolumeUp => Self::VolumeDown,
            Self::VolumeDown => Self::VolumeUp,
        }
    }

    /// Stable index into fixed two-slot state arrays.
    pub fn slot(self) -> usize {
        match self {
            Self::VolumeUp => 0,
            Self::VolumeDown => 1,
        }
    }
}

impl fmt::Display for HardwareKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VolumeUp => write!(f, "volume_up"),
            Self::VolumeDown => write!(f, "volume_down"),
        }
    }
}

/// Direction of a physical key transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyEdge {
    /// Key went down (or the OS auto-repeated a held key).
    Down,
    /// Key was released.
    Up,
}

/// One raw transition from the key event source.
///
/// Timestamps are monotonic milliseconds from an arbitrary origin; the engine
/// only ever subtracts them. `repeat` marks OS auto-repeat DOWN events, which
/// must not re-arm timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyTransition {
    /// Which key moved.
    pub key: HardwareKey,
    /// Down or up edge.
    pub edge: KeyEdge,
    /// Monotonic timestamp in milliseconds.
    pub timestamp_ms: u64,
    /// True for OS auto-repeat DOWN events.
    pub repeat: bool,
}

impl KeyTransition {
    /// A first (non-repeat) DOWN edge.
    pub fn down(key: HardwareKey, timestamp_ms: u64) -> Self {
        Self {
            key,
            edge: KeyEdge::Down,
            timestamp_ms,
            repeat: false,
        }
    }

    /// An auto-repeat DOWN edge.
    pub fn repeat(key: HardwareKey, timestamp_ms: u64) -> Self {
        Self {
            key,
            edge: KeyEdge::Down,
            timestamp_ms,
            repeat: true,
        }
    }

    /// An UP edge.
    pub fn up(key: HardwareKey, timestamp_ms: u64) -> Self {
        Self {
            key,
            edge: KeyEdge::Up,
            timestamp_ms,
            repeat: false,
        }
    }
}

/// Identifier of a user-defined keybind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeybindId(pub String);

impl KeybindId {
    /// Construct from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeybindId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for KeybindId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A classified outcome emitted by the engine.
///
/// Side effects (volume passthrough, mapped actions, haptics) are the
/// consumer's job; the engine only classifies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GestureEvent {
    /// A press released before its long-press threshold; the consumer should
    /// perform the default volume adjustment.
    ShortPress(HardwareKey),
    /// A single key held past its configured threshold.
    LongPress(HardwareKey),
    /// Both keys held together past the combo threshold.
    ComboLongPress,
    /// Two consecutive presses lost their release events; the host OS is
    /// likely intercepting the keys.
    SystemInterception,
    /// A custom keybind sequence completed.
    KeybindMatched(KeybindId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn other_key_is_involutive() {
        for key in HardwareKey::ALL {
            assert_eq!(key.other().other(), key);
            assert_ne!(key.other(), key);
        }
    }

    #[test]
    fn slots_are_distinct_and_in_range() {
        let slots: Vec<usize> = HardwareKey::ALL.iter().map(|k| k.slot()).collect();
        assert_eq!(slots, vec![0, 1]);
    }
}
