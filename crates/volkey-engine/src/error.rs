use std::result::Result as StdResult;

use thiserror::Error;

/// Convenient result type for the engine crate.
pub type Result<T> = StdResult<T, Error>;

/// Unified error type for the volkey engine.
///
/// Per the failure policy nothing inside the engine is fatal; this type only
/// covers the API edge, where the engine task itself has gone away.
#[derive(Debug, Error)]
pub enum Error {
    /// The engine task has stopped and can no longer accept events.
    #[error("engine stopped")]
    EngineStopped,

    /// Failure reported by a wake source implementation.
    #[error("wake source error: {0}")]
    Wake(#[from] crate::wake::WakeError),
}
