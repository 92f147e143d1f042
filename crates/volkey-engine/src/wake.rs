//! Wake-prevention token held for the lifetime of a pending gesture.
//!
//! Deferred timers are only guaranteed to fire while the device is awake, so
//! the engine acquires a wake token on the first DOWN of a press cycle and
//! releases it once neither key is pressed. The platform integration lives
//! behind [`WakeSource`]; failures are logged and swallowed, never allowed to
//! disturb gesture processing.

use std::{sync::Arc, time::Duration};

use thiserror::Error;
use tracing::{debug, warn};

/// Safety ceiling passed to every acquire: the platform must drop the token
/// after this long even if the engine never releases it. Independent of the
/// user-configured thresholds.
pub const WAKE_SAFETY_CEILING: Duration = Duration::from_secs(5);

/// Failure reported by a wake source implementation.
#[derive(Debug, Error)]
pub enum WakeError {
    /// The platform refused or lost the wake token.
    #[error("wake token unavailable: {0}")]
    Unavailable(String),
}

/// Platform seam for the wake-preventing token.
pub trait WakeSource: Send + Sync {
    /// Acquire the token. `ceiling` bounds how long the platform may hold it
    /// regardless of what the engine does afterwards.
    fn acquire(&self, ceiling: Duration) -> Result<(), WakeError>;

    /// Release the token.
    fn release(&self) -> Result<(), WakeError>;
}

/// Wake source that does nothing; the default when no platform is wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullWake;

impl WakeSource for NullWake {
    fn acquire(&self, _ceiling: Duration) -> Result<(), WakeError> {
        Ok(())
    }

    fn release(&self) -> Result<(), WakeError> {
        Ok(())
    }
}

/// Tracks whether the engine currently holds the token and enforces the
/// acquire/release pairing. Source failures leave the guard unheld so the
/// next press cycle retries.
pub(crate) struct WakeGuard {
    /// Platform implementation.
    source: Arc<dyn WakeSource>,
    /// True while the engine holds the token.
    held: bool,
}

impl WakeGuard {
    /// Wrap a platform wake source.
    pub(crate) fn new(source: Arc<dyn WakeSource>) -> Self {
        Self {
            source,
            held: false,
        }
    }

    /// Acquire the token if not already held. Failures are logged only.
    pub(crate) fn acquire(&mut self) {
        if self.held {
            return;
        }
        match self.source.acquire(WAKE_SAFETY_CEILING) {
            Ok(()) => {
                debug!("wake token acquired");
                self.held = true;
            }
            Err(e) => warn!("wake token acquire failed: {}", e),
        }
    }

    /// Release the token if held. Failures are logged only.
    pub(crate) fn release(&mut self) {
        if !self.held {
            return;
        }
        self.held = false;
        match self.source.release() {
            Ok(()) => debug!("wake token released"),
            Err(e) => warn!("wake token release failed: {}", e),
        }
    }
}
