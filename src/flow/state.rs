//! Flow running and cancellation flags

use std::sync::atomic::{AtomicBool, Ordering};

/// Process-wide flow flags. At most one flow runs at a time; cancellation
/// is a request the running flow observes between steps.
#[derive(Debug, Default)]
pub struct FlowState {
    running: AtomicBool,
    cancel_requested: AtomicBool,
}

impl FlowState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the running slot. `None` when a flow is already in progress.
    /// A successful claim resets any stale cancellation request.
    pub fn try_start(&self) -> Option<FlowGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()?;
        self.cancel_requested.store(false, Ordering::SeqCst);
        Some(FlowGuard { state: self })
    }

    pub fn request_cancel(&self) {
        self.cancel_requested.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_requested.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Holds the running slot. Dropping it clears both flags whatever way the
/// flow ends.
#[derive(Debug)]
pub struct FlowGuard<'a> {
    state: &'a FlowState,
}

impl Drop for FlowGuard<'_> {
    fn drop(&mut self) {
        self.state.cancel_requested.store(false, Ordering::SeqCst);
        self.state.running.store(false, Ordering::SeqCst);
    }
}
