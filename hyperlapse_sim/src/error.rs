//! Error types for the simulation harness.

use hyperlapse_core::HyperlapseError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    /// The tokio runtime for a scenario could not be built
    #[error("Failed to start simulation runtime: {0}")]
    Runtime(#[source] std::io::Error),

    /// A scenario check did not hold
    #[error("Invariant violated: {0}")]
    Invariant(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Hyperlapse(#[from] HyperlapseError),
}

impl SimError {
    pub fn invariant(msg: impl Into<String>) -> Self {
        SimError::Invariant(msg.into())
    }
}

/// Returns an invariant error with `msg` unless `condition` holds.
pub fn ensure(condition: bool, msg: impl FnOnce() -> String) -> Result<(), SimError> {
    if condition {
        Ok(())
    } else {
        Err(SimError::Invariant(msg()))
    }
}
