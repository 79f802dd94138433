//! Cooperative cancellation flags.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Flags {
    active: AtomicBool,
    requested: AtomicBool,
}

/// Cancellation flag shared between a running pass and whoever may stop it.
///
/// A request only sticks while the pass is active; the pass polls it at
/// await boundaries, so in-flight service calls always complete and their
/// results are simply ignored.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    inner: Arc<Flags>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Returns false (and does nothing) when no pass
    /// is running.
    pub fn request(&self) -> bool {
        if !self.is_active() {
            return false;
        }
        self.inner.requested.store(true, Ordering::SeqCst);
        true
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    pub fn is_requested(&self) -> bool {
        self.inner.requested.load(Ordering::SeqCst)
    }

    /// Marks a pass as started with no pending request.
    pub(crate) fn activate(&self) {
        self.inner.requested.store(false, Ordering::SeqCst);
        self.inner.active.store(true, Ordering::SeqCst);
    }

    /// Marks the pass as finished and drops any pending request.
    pub(crate) fn finish(&self) {
        self.inner.active.store(false, Ordering::SeqCst);
        self.inner.requested.store(false, Ordering::SeqCst);
    }
}

/// Cancels whichever pass of a hyperlapse is running.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    pub(crate) sequencing: CancelFlag,
    pub(crate) loading: CancelFlag,
}

impl CancelHandle {
    /// Returns true if a running pass accepted the request.
    pub fn cancel(&self) -> bool {
        let sequencing = self.sequencing.request();
        let loading = self.loading.request();
        sequencing || loading
    }
}
