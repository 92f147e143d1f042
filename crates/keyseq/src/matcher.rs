//! The sequence matching pass and its in-flight candidate set.

use config::{CustomKeybind, KeybindStep, PressType};
use tracing::trace;
use volkey_protocol::{HardwareKey, KEY_COUNT, KeyEdge, KeyTransition, KeybindId};

/// Window used between steps whose `max_delay_after_ms` is zero, meaning the
/// next release must land effectively together with the previous one.
pub const SIMULTANEOUS_WINDOW_MS: u64 = 120;

/// One completed press, derived from a DOWN/UP pair at UP time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepInput {
    /// Which key was pressed.
    pub key: HardwareKey,
    /// Hold duration in milliseconds.
    pub duration_ms: u64,
    /// The UP timestamp; all inter-step gaps are measured between UPs.
    pub timestamp_ms: u64,
}

/// A partially-matched keybind sequence.
///
/// Steps are cloned out of the registry when the candidate is seeded, so a
/// keybind edited or disabled mid-sequence keeps matching under the
/// definition it started with; the registry is only consulted for seeding.
#[derive(Debug, Clone)]
struct Candidate {
    /// Id reported on completion.
    id: KeybindId,
    /// The owning keybind's steps, frozen at seed time.
    steps: Vec<KeybindStep>,
    /// Index of the next step that must match.
    next_step: usize,
    /// UP timestamp of the most recently matched step.
    last_step_ts: u64,
}

/// Matches the key event stream against the registry of custom keybinds.
///
/// Feed it every transition via [`SequenceMatcher::on_event`]; it tracks one
/// DOWN timestamp per key and runs a matching pass on each UP. It holds no
/// timers: stale candidates are discarded lazily when the next input arrives
/// outside their window.
#[derive(Debug, Default)]
pub struct SequenceMatcher {
    /// Pending DOWN timestamp per key slot.
    down_ts: [Option<u64>; KEY_COUNT],
    /// In-flight candidates, rebuilt on every pass.
    candidates: Vec<Candidate>,
}

impl SequenceMatcher {
    /// Create an idle matcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe one transition. Returns ids of keybinds completed by it.
    ///
    /// DOWN records the per-key timestamp (auto-repeats are ignored so the
    /// original DOWN time survives); UP closes the press and runs one
    /// matching pass. An UP with no recorded DOWN is a no-op.
    pub fn on_event(
        &mut self,
        transition: &KeyTransition,
        keybinds: &[CustomKeybind],
    ) -> Vec<KeybindId> {
        match transition.edge {
            KeyEdge::Down => {
                if !transition.repeat {
                    self.down_ts[transition.key.slot()] = Some(transition.timestamp_ms);
                }
                Vec::new()
            }
            KeyEdge::Up => match self.down_ts[transition.key.slot()].take() {
                Some(down_ms) => {
                    let input = StepInput {
                        key: transition.key,
                        duration_ms: transition.timestamp_ms.saturating_sub(down_ms),
                        timestamp_ms: transition.timestamp_ms,
                    };
                    self.run_pass(input, keybinds)
                }
                None => Vec::new(),
            },
        }
    }

    /// Drop all in-flight candidates and pending DOWN timestamps.
    pub fn reset(&mut self) {
        self.down_ts = [None; KEY_COUNT];
        self.candidates.clear();
    }

    /// One matching pass: advance survivors, then seed first-step matches,
    /// then replace the candidate set with the union of the two.
    fn run_pass(&mut self, input: StepInput, keybinds: &[CustomKeybind]) -> Vec<KeybindId> {
        let mut matched = Vec::new();
        let mut survivors = Vec::new();

        for candidate in self.candidates.drain(..) {
            let prev = &candidate.steps[candidate.next_step - 1];
            let window = if prev.max_delay_after_ms == 0 {
                SIMULTANEOUS_WINDOW_MS
            } else {
                prev.max_delay_after_ms
            };
            let elapsed = input.timestamp_ms.saturating_sub(candidate.last_step_ts);
            if elapsed > window {
                trace!(id = %candidate.id, elapsed, window, "candidate expired");
                continue;
            }
            if !step_matches(&candidate.steps[candidate.next_step], input) {
                trace!(id = %candidate.id, step = candidate.next_step, "candidate mismatched");
                continue;
            }
            if candidate.next_step + 1 == candidate.steps.len() {
                matched.push(candidate.id);
            } else {
                survivors.push(Candidate {
                    next_step: candidate.next_step + 1,
                    last_step_ts: input.timestamp_ms,
                    ..candidate
                });
            }
        }

        for keybind in keybinds {
            if !keybind.enabled || keybind.steps.is_empty() {
                continue;
            }
            if !step_matches(&keybind.steps[0], input) {
                continue;
            }
            if keybind.steps.len() == 1 {
                matched.push(keybind.id.clone());
            } else {
                trace!(id = %keybind.id, "candidate seeded");
                survivors.push(Candidate {
                    id: keybind.id.clone(),
                    steps: keybind.steps.clone(),
                    next_step: 1,
                    last_step_ts: input.timestamp_ms,
                });
            }
        }

        self.candidates = survivors;
        matched
    }
}

/// A step matches when the key agrees and the press classifies to the step's
/// type. Non-positive thresholds are floored to 1 ms here, so a zero
/// threshold classifies every press of nonzero duration as long.
fn step_matches(step: &KeybindStep, input: StepInput) -> bool {
    if step.key != input.key {
        return false;
    }
    let classified = if input.duration_ms < step.long_press_threshold_ms.max(1) {
        PressType::Short
    } else {
        PressType::Long
    };
    classified == step.press
}
