//! Simulation context implementing HyperlapseContext for deterministic testing.

use async_trait::async_trait;
use hyperlapse_env::HyperlapseContext;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Simulation context backed by a virtual clock.
///
/// This implements `HyperlapseContext` using:
/// - A virtual clock that only moves when someone sleeps (or advances it)
/// - A master seed from which every RNG in the run is derived
pub struct SimContext {
    /// Master seed for this simulation
    seed: u64,

    /// Current virtual time (nanoseconds since simulation start)
    virtual_time_ns: Arc<Mutex<u64>>,

    /// Epoch offset (virtual time 0 maps to this wall-clock time)
    epoch: SystemTime,
}

impl SimContext {
    /// Creates a new SimContext with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            virtual_time_ns: Arc::new(Mutex::new(0)),
            epoch: UNIX_EPOCH + Duration::from_secs(1704067200), // 2024-01-01 00:00:00 UTC
        }
    }

    /// Creates an Arc-wrapped context for sharing.
    pub fn shared(seed: u64) -> Arc<Self> {
        Arc::new(Self::new(seed))
    }

    /// Advances virtual time by the given duration.
    pub fn advance_time(&self, duration: Duration) {
        if let Ok(mut time) = self.virtual_time_ns.lock() {
            *time += duration.as_nanos() as u64;
        }
    }

    /// Returns the current virtual time in nanoseconds.
    pub fn time_ns(&self) -> u64 {
        self.virtual_time_ns.lock().map(|time| *time).unwrap_or(0)
    }

    /// Derives an independent RNG stream from the master seed.
    ///
    /// Each subsystem (road layout, capture noise, terrain, failures) takes
    /// its own stream so that changing one never shifts another.
    pub fn derive_rng(&self, stream: u64) -> ChaCha8Rng {
        let combined_seed = self.seed.wrapping_mul(0x517cc1b727220a95) ^ stream;
        ChaCha8Rng::seed_from_u64(combined_seed)
    }
}

impl Clone for SimContext {
    fn clone(&self) -> Self {
        Self {
            seed: self.seed,
            virtual_time_ns: Arc::clone(&self.virtual_time_ns),
            epoch: self.epoch,
        }
    }
}

#[async_trait]
impl HyperlapseContext for SimContext {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.time_ns())
    }

    fn system_time(&self) -> SystemTime {
        self.epoch + self.now()
    }

    async fn sleep(&self, duration: Duration) {
        // Advance virtual time, then let other tasks on the runtime observe it
        self.advance_time(duration);
        tokio::task::yield_now().await;
    }

    fn seed(&self) -> u64 {
        self.seed
    }
}
