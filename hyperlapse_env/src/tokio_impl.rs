//! Wall-clock [`HyperlapseContext`] on the Tokio timer.
//!
//! Monotonic time comes from `tokio::time::Instant`, so a runtime started
//! with paused time (`start_paused`) drives playback exactly like the
//! simulator's virtual clock does.

use crate::HyperlapseContext;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::time::Instant;

/// Production clock for live playback.
#[derive(Debug, Clone, Copy)]
pub struct TokioContext {
    origin: Instant,

    /// Wall time at `origin`; `system_time` advances with the monotonic clock
    wall_origin: SystemTime,
}

impl TokioContext {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            wall_origin: SystemTime::now(),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for TokioContext {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HyperlapseContext for TokioContext {
    fn now(&self) -> Duration {
        Instant::now().saturating_duration_since(self.origin)
    }

    fn system_time(&self) -> SystemTime {
        self.wall_origin + self.now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    /// Live runs draw no randomness from the context.
    fn seed(&self) -> u64 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_paused_clock_advances_by_sleeps() {
        let ctx = TokioContext::new();
        assert_eq!(ctx.now(), Duration::ZERO);

        ctx.sleep(Duration::from_millis(16)).await;
        ctx.sleep(Duration::from_millis(34)).await;

        assert_eq!(ctx.now(), Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wall_time_follows_monotonic_time() {
        let ctx = TokioContext::new();
        let before = ctx.system_time();

        ctx.sleep(Duration::from_secs(3)).await;

        let moved = ctx.system_time().duration_since(before).unwrap();
        assert_eq!(moved, Duration::from_secs(3));
        assert_eq!(ctx.seed(), 0);
    }
}
