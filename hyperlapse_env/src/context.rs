//! Core environment context trait for the hyperlapse engines.

use async_trait::async_trait;
use std::time::{Duration, SystemTime};

/// The clock the animation loop runs on.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time`
/// - **Simulation**: `SimContext` - virtual clock advanced by `sleep`
///
/// # Determinism
///
/// Playback only ever learns about elapsed time through this trait, so a
/// simulated clock makes frame timing fully reproducible.
#[async_trait]
pub trait HyperlapseContext: Send + Sync + 'static {
    /// Returns the current monotonic time since context creation.
    ///
    /// The animation driver diffs successive values to feed the playback
    /// accumulator.
    fn now(&self) -> Duration;

    /// Returns the wall-clock time (used for log lines and exports).
    fn system_time(&self) -> SystemTime;

    /// Suspends execution for the given duration.
    ///
    /// In production: wraps `tokio::time::sleep`
    /// In simulation: advances virtual clock
    async fn sleep(&self, duration: Duration);

    /// Returns the context's seed (for logging/debugging).
    ///
    /// In production, returns 0 (not seeded).
    fn seed(&self) -> u64;
}
