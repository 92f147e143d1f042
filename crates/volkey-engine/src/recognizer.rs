//! The gesture recognizer state machine.
//!
//! Classifies the raw two-key transition stream into short presses, single
//! long presses and combo long presses, and self-heals when an expected
//! release never arrives. Per key the state is the three-phase enum
//! {Idle, Armed, Fired}; a press cycle runs Idle -> Armed -> {Fired |
//! released} -> Idle, with the watchdog providing the orthogonal forced
//! transition back to Idle.
//!
//! Nothing here is fatal: every anomaly (missing release, out-of-order
//! release, pathological threshold values) resolves by resetting towards
//! idle rather than surfacing an error.

use std::{sync::Arc, time::Duration};

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, trace, warn};

use config::ThresholdHandle;
use volkey_protocol::{GestureEvent, HardwareKey, KEY_COUNT, KeyEdge, KeyTransition};

use crate::{
    timer::{TimerFired, TimerSlot, Timers},
    wake::{WakeGuard, WakeSource},
};

/// Fixed missing-release watchdog timeout. Deliberately independent of the
/// user-configured thresholds so recovery works even when those are zero.
pub(crate) const WATCHDOG_TIMEOUT: Duration = Duration::from_millis(3000);

/// Consecutive watchdog detections that signal host-OS interception.
const INTERCEPTION_STREAK: u8 = 2;

/// Per-key press phase for the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum PressPhase {
    /// Key is up.
    #[default]
    Idle,
    /// Key is down, no action resolved yet.
    Armed,
    /// Key is down and an action (long press or combo) already fired.
    Fired,
}

/// Recognizes gestures on the two-key transition stream.
pub(crate) struct Recognizer {
    /// Long-press thresholds, read fresh at every timer arming.
    thresholds: ThresholdHandle,
    /// Deferred one-shot timers.
    timers: Timers,
    /// Wake token held while any key is pressed.
    wake: WakeGuard,
    /// Classified event sink.
    events: UnboundedSender<GestureEvent>,
    /// Press phase per key slot.
    phases: [PressPhase; KEY_COUNT],
    /// True once a combo fired for the current both-pressed stretch.
    combo_fired: bool,
    /// Consecutive watchdog detections with no intervening real release.
    missed_release_streak: u8,
}

impl Recognizer {
    /// Create an idle recognizer.
    pub(crate) fn new(
        thresholds: ThresholdHandle,
        wake: Arc<dyn WakeSource>,
        timer_tx: UnboundedSender<TimerFired>,
        events: UnboundedSender<GestureEvent>,
    ) -> Self {
        Self {
            thresholds,
            timers: Timers::new(timer_tx),
            wake: WakeGuard::new(wake),
            events,
            phases: [PressPhase::Idle; KEY_COUNT],
            combo_fired: false,
            missed_release_streak: 0,
        }
    }

    /// Whether `key` is currently marked pressed.
    fn pressed(&self, key: HardwareKey) -> bool {
        self.phases[key.slot()] != PressPhase::Idle
    }

    /// Process one transition, returning the consume decision. Both
    /// identities are tracked keys, so every DOWN and UP is consumed.
    pub(crate) fn on_transition(&mut self, transition: &KeyTransition) -> bool {
        match transition.edge {
            KeyEdge::Down => self.on_down(transition),
            KeyEdge::Up => self.on_up(transition),
        }
        true
    }

    /// Handle a DOWN edge.
    fn on_down(&mut self, transition: &KeyTransition) {
        let key = transition.key;
        if transition.repeat {
            // Auto-repeat: consumed, but must not re-arm timers or touch the
            // watchdog.
            trace!(%key, "auto-repeat down ignored");
            return;
        }

        if !self.pressed(key) && !self.pressed(key.other()) {
            self.wake.acquire();
        }
        self.phases[key.slot()] = PressPhase::Armed;

        // A fresh press cycle gets a fresh watchdog; arming replaces any
        // pending one.
        self.timers.arm(TimerSlot::Watchdog, WATCHDOG_TIMEOUT);

        let thresholds = self.thresholds.snapshot();
        if self.pressed(key.other()) {
            // Both keys down: single-key interpretation is off the table.
            self.timers.cancel(TimerSlot::Single(key));
            self.timers.cancel(TimerSlot::Single(key.other()));
            self.timers.arm(
                TimerSlot::Combo,
                floor_ms(thresholds.combo_long_press_ms),
            );
            debug!(%key, ms = thresholds.combo_long_press_ms, "combo timer armed");
        } else {
            let ms = thresholds.long_press_ms(key);
            self.timers.arm(TimerSlot::Single(key), floor_ms(ms));
            debug!(%key, ms, "long-press timer armed");
        }
    }

    /// Handle an UP edge.
    fn on_up(&mut self, transition: &KeyTransition) {
        let key = transition.key;
        if !self.pressed(key) {
            // Out-of-order or post-reset release: consumed, no state change.
            trace!(%key, "release without matching press");
            return;
        }

        self.missed_release_streak = 0;
        self.timers.cancel(TimerSlot::Watchdog);
        self.timers.cancel(TimerSlot::Single(key));

        let fired = self.phases[key.slot()] == PressPhase::Fired;
        self.phases[key.slot()] = PressPhase::Idle;
        if !fired {
            debug!(%key, "short press passthrough");
            self.emit(GestureEvent::ShortPress(key));
        }

        if !self.pressed(key.other()) {
            self.timers.cancel(TimerSlot::Combo);
            self.combo_fired = false;
            self.wake.release();
        }
    }

    /// Validate a queued timer firing; stale ones are dropped.
    pub(crate) fn accept(&mut self, fired: TimerFired) -> bool {
        self.timers.accept(fired)
    }

    /// Handle an accepted timer firing.
    pub(crate) fn on_timer(&mut self, slot: TimerSlot) {
        match slot {
            TimerSlot::Single(key) => {
                if self.phases[key.slot()] == PressPhase::Armed
                    && !self.combo_fired
                    && !self.pressed(key.other())
                {
                    self.phases[key.slot()] = PressPhase::Fired;
                    debug!(%key, "long press fired");
                    self.emit(GestureEvent::LongPress(key));
                }
            }
            TimerSlot::Combo => {
                if self.pressed(HardwareKey::VolumeUp)
                    && self.pressed(HardwareKey::VolumeDown)
                    && !self.combo_fired
                {
                    self.combo_fired = true;
                    for phase in &mut self.phases {
                        *phase = PressPhase::Fired;
                    }
                    debug!("combo long press fired");
                    self.emit(GestureEvent::ComboLongPress);
                }
            }
            TimerSlot::Watchdog => self.on_watchdog(),
        }
    }

    /// The watchdog expired with at least one key still marked pressed: the
    /// release was lost, most likely to the host OS. Silently reset to idle
    /// and track the detection streak.
    fn on_watchdog(&mut self) {
        if !self.pressed(HardwareKey::VolumeUp) && !self.pressed(HardwareKey::VolumeDown) {
            return;
        }
        warn!("release event never arrived; resetting press state");
        self.timers.cancel_all();
        self.phases = [PressPhase::Idle; KEY_COUNT];
        self.combo_fired = false;
        self.wake.release();

        self.missed_release_streak += 1;
        if self.missed_release_streak >= INTERCEPTION_STREAK {
            self.missed_release_streak = 0;
            warn!("consecutive missing releases; keys appear intercepted");
            self.emit(GestureEvent::SystemInterception);
        }
    }

    /// Send a classified event; a closed receiver is logged, not fatal.
    pub(crate) fn emit(&self, event: GestureEvent) {
        if self.events.send(event).is_err() {
            warn!("gesture event dropped; receiver closed");
        }
    }
}

/// Timer delays floor non-positive configured values to 1 ms; the watchdog
/// guarantees recovery regardless.
fn floor_ms(ms: u64) -> Duration {
    Duration::from_millis(ms.max(1))
}
