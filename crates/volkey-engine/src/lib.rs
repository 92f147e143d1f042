//! Volkey Engine
//!
//! The engine turns the raw volume-key transition stream into classified
//! [`GestureEvent`]s:
//! - short presses (volume passthrough), single long presses, and combo
//!   long presses from the gesture recognizer
//! - completed custom keybind sequences from the sequence matcher
//!
//! Both consumers see every transition; they never talk to each other. All
//! mutable state lives in one actor task, and timer firings arrive on the
//! same queue as key events, so event processing and timer callbacks are
//! strictly serialized without locks.
//!
//! Public API: [`Engine`] plus the wake seam ([`WakeSource`], [`NullWake`],
//! [`WakeError`]). Everything else is crate-private implementation detail.

mod error;
mod recognizer;
mod timer;
mod wake;

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{trace, warn};

use config::{KeybindRegistry, ThresholdHandle};
use keyseq::SequenceMatcher;
use volkey_protocol::{GestureEvent, KeyTransition};

pub use error::{Error, Result};
pub use wake::{NullWake, WAKE_SAFETY_CEILING, WakeError, WakeSource};

use recognizer::Recognizer;
use timer::TimerFired;

/// One key transition awaiting processing, with a reply slot for the
/// consume decision.
struct KeyMsg {
    /// The raw transition.
    transition: KeyTransition,
    /// Receives the recognizer's consume decision.
    consumed: oneshot::Sender<bool>,
}

/// Handle to the engine actor.
///
/// Construct with [`Engine::new`] (or [`Engine::with_wake`] to wire in a
/// platform wake source), then feed transitions through
/// [`Engine::dispatch`]. Classified events arrive on the channel supplied at
/// construction. Cloning shares the same actor; the actor exits when the
/// last handle is dropped.
#[derive(Clone)]
pub struct Engine {
    /// Queue into the actor task.
    tx: mpsc::UnboundedSender<KeyMsg>,
}

impl Engine {
    /// Create an engine with no wake integration.
    ///
    /// Must be called within a tokio runtime; the actor task is spawned
    /// immediately.
    pub fn new(
        thresholds: ThresholdHandle,
        registry: KeybindRegistry,
        events: mpsc::UnboundedSender<GestureEvent>,
    ) -> Self {
        Self::with_wake(thresholds, registry, events, Arc::new(NullWake))
    }

    /// Create an engine holding `wake` tokens across press cycles.
    pub fn with_wake(
        thresholds: ThresholdHandle,
        registry: KeybindRegistry,
        events: mpsc::UnboundedSender<GestureEvent>,
        wake: Arc<dyn WakeSource>,
    ) -> Self {
        let (key_tx, key_rx) = mpsc::unbounded_channel();
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        let recognizer = Recognizer::new(thresholds, wake, timer_tx, events);
        tokio::spawn(run_loop(key_rx, timer_rx, recognizer, registry));
        Self { tx: key_tx }
    }

    /// Feed one transition and await the consume decision.
    ///
    /// The transition has fully run to completion (state updated, timers
    /// armed or cancelled, events emitted) by the time this returns, so
    /// callers can deliver the next event immediately afterwards.
    pub async fn dispatch(&self, transition: KeyTransition) -> Result<bool> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(KeyMsg {
                transition,
                consumed: reply_tx,
            })
            .map_err(|_| Error::EngineStopped)?;
        reply_rx.await.map_err(|_| Error::EngineStopped)
    }
}

/// The actor: owns the recognizer and matcher, serializes key events and
/// timer firings on one queue discipline.
async fn run_loop(
    mut key_rx: mpsc::UnboundedReceiver<KeyMsg>,
    mut timer_rx: mpsc::UnboundedReceiver<TimerFired>,
    mut recognizer: Recognizer,
    registry: KeybindRegistry,
) {
    let mut matcher = SequenceMatcher::new();
    loop {
        tokio::select! {
            msg = key_rx.recv() => {
                let Some(KeyMsg { transition, consumed }) = msg else {
                    trace!("engine handles dropped; stopping");
                    break;
                };
                trace!(?transition, "key event");
                let consume = recognizer.on_transition(&transition);

                // The matcher observes the same stream with a fresh registry
                // snapshot; it never affects the consume decision.
                for id in matcher.on_event(&transition, &registry.snapshot()) {
                    recognizer.emit(GestureEvent::KeybindMatched(id));
                }

                if consumed.send(consume).is_err() {
                    warn!("dispatch caller went away before consume reply");
                }
            }
            fired = timer_rx.recv() => {
                // The recognizer holds the only sender, so this arm stays
                // live exactly as long as the loop does.
                if let Some(fired) = fired
                    && recognizer.accept(fired)
                {
                    recognizer.on_timer(fired.slot);
                }
            }
        }
    }
}
