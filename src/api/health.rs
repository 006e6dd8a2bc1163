//! Shared health state for the /health endpoint.
//! Updated by the poller task, read by the API.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

#[derive(Default)]
pub struct HealthState {
    /// True when the last feed fetch succeeded.
    pub feed_ok: AtomicBool,
    /// Unix seconds of the last completed poll cycle (0 = none yet).
    pub last_poll_at: AtomicI64,
    /// Poll cycles completed since process start.
    pub polls_completed: AtomicU64,
    /// Settlement runs triggered since process start (detector transitions
    /// plus operator corrections).
    pub quarters_settled: AtomicU64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_feed_ok(&self, v: bool) {
        self.feed_ok.store(v, Ordering::Relaxed);
    }

    pub fn record_poll(&self, at_secs: i64) {
        self.last_poll_at.store(at_secs, Ordering::Relaxed);
        self.polls_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_quarters_settled(&self) {
        self.quarters_settled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn feed_ok(&self) -> bool {
        self.feed_ok.load(Ordering::Relaxed)
    }

    pub fn last_poll_at(&self) -> i64 {
        self.last_poll_at.load(Ordering::Relaxed)
    }

    pub fn polls_completed(&self) -> u64 {
        self.polls_completed.load(Ordering::Relaxed)
    }

    pub fn quarters_settled(&self) -> u64 {
        self.quarters_settled.load(Ordering::Relaxed)
    }
}
