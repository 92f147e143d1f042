//! One-shot cancellable timers for the gesture recognizer.
//!
//! Each logical timer occupies a fixed slot. Arming a slot always cancels its
//! predecessor, and a firing is delivered as a message on the engine queue
//! rather than run inline, so a timer callback and an incoming key event
//! never interleave. A generation counter guards the race where a firing is
//! already queued when its slot is cancelled or re-armed: stale firings fail
//! the generation check and are dropped.

use std::time::Duration;

use tokio::{sync::mpsc::UnboundedSender, time};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use volkey_protocol::{HardwareKey, KEY_COUNT};

/// Identifies one of the recognizer's deferred timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerSlot {
    /// Single-key long-press timer for one key.
    Single(HardwareKey),
    /// Combo long-press timer, shared by both keys.
    Combo,
    /// Missing-release watchdog covering the whole press cycle.
    Watchdog,
}

/// Total number of timer slots.
const SLOT_COUNT: usize = KEY_COUNT + 2;

impl TimerSlot {
    /// Fixed index into the slot array.
    fn index(self) -> usize {
        match self {
            Self::Single(key) => key.slot(),
            Self::Combo => KEY_COUNT,
            Self::Watchdog => KEY_COUNT + 1,
        }
    }
}

/// A timer firing posted to the engine queue.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TimerFired {
    /// Which slot fired.
    pub(crate) slot: TimerSlot,
    /// The arming this firing belongs to.
    pub(crate) generation: u64,
}

/// Bookkeeping for one armed slot.
struct Armed {
    /// Generation assigned when the slot was armed.
    generation: u64,
    /// Cancels the sleeping task.
    token: CancellationToken,
}

/// Fixed-slot one-shot timers feeding the engine queue.
pub(crate) struct Timers {
    /// Queue firings are posted to.
    tx: UnboundedSender<TimerFired>,
    /// Current arming per slot, if any.
    slots: [Option<Armed>; SLOT_COUNT],
    /// Monotonic generation source shared by all slots.
    next_generation: u64,
}

impl Timers {
    /// Create a timer set posting firings to `tx`.
    pub(crate) fn new(tx: UnboundedSender<TimerFired>) -> Self {
        Self {
            tx,
            slots: Default::default(),
            next_generation: 0,
        }
    }

    /// Arm `slot` to fire after `delay`, replacing any prior arming.
    pub(crate) fn arm(&mut self, slot: TimerSlot, delay: Duration) {
        self.cancel(slot);
        self.next_generation += 1;
        let generation = self.next_generation;
        let token = CancellationToken::new();
        let cancel = token.clone();
        let tx = self.tx.clone();
        trace!(?slot, delay_ms = delay.as_millis() as u64, "timer armed");
        tokio::spawn(async move {
            tokio::select! {
                _ = time::sleep(delay) => {
                    let _ = tx.send(TimerFired { slot, generation });
                }
                _ = cancel.cancelled() => {}
            }
        });
        self.slots[slot.index()] = Some(Armed { generation, token });
    }

    /// Cancel `slot` if armed.
    pub(crate) fn cancel(&mut self, slot: TimerSlot) {
        if let Some(armed) = self.slots[slot.index()].take() {
            armed.token.cancel();
            trace!(?slot, "timer cancelled");
        }
    }

    /// Cancel every armed slot.
    pub(crate) fn cancel_all(&mut self) {
        for slot in [
            TimerSlot::Single(HardwareKey::VolumeUp),
            TimerSlot::Single(HardwareKey::VolumeDown),
            TimerSlot::Combo,
            TimerSlot::Watchdog,
        ] {
            self.cancel(slot);
        }
    }

    /// Validate a queued firing against the slot's current arming. Disarms
    /// the slot and returns true when it is current; stale firings from a
    /// cancelled or replaced arming return false.
    pub(crate) fn accept(&mut self, fired: TimerFired) -> bool {
        let entry = &mut self.slots[fired.slot.index()];
        match entry {
            Some(armed) if armed.generation == fired.generation => {
                *entry = None;
                true
            }
            _ => {
                trace!(slot = ?fired.slot, "stale timer firing dropped");
                false
            }
        }
    }
}
