use std::time::Duration;

use tokio::time::Instant;

use crate::{
    config::RefreshConfig,
    timeline::{earliest, TimerSlot},
};

/// Token for "parameters changed, rebuild pending".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RefreshRequest {
    generation: u64,
}

impl RefreshRequest {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Coalesces bursts of change notifications into one delayed refresh.
///
/// Each [`notify_changed`](Self::notify_changed) replaces the live request and
/// restarts the quiet period. When the quiet period elapses [`poll`](Self::poll)
/// hands the live request out exactly once and raises the refreshing flag until
/// the settle delay has passed.
#[derive(Debug)]
pub struct RefreshDebouncer {
    quiet_period: Duration,
    settle_delay: Duration,
    pending: TimerSlot,
    settle: TimerSlot,
    live: Option<RefreshRequest>,
    issued: u64,
    last_fired: Option<RefreshRequest>,
    refreshing: bool,
}

impl RefreshDebouncer {
    pub fn new(config: &RefreshConfig) -> Self {
        Self {
            quiet_period: config.quiet_period(),
            settle_delay: config.settle_delay(),
            pending: TimerSlot::new(),
            settle: TimerSlot::new(),
            live: None,
            issued: 0,
            last_fired: None,
            refreshing: false,
        }
    }

    /// Supersedes any live request and restarts the quiet period from `now`.
    pub fn notify_changed(&mut self, now: Instant) -> RefreshRequest {
        self.issued += 1;
        let request = RefreshRequest {
            generation: self.issued,
        };
        self.live = Some(request);
        self.pending.arm_once(now, self.quiet_period);
        request
    }

    /// Returns the request whose quiet period has elapsed, if any.
    pub fn poll(&mut self, now: Instant) -> Option<RefreshRequest> {
        if self.settle.take_due(now) {
            self.refreshing = false;
        }
        if !self.pending.take_due(now) {
            return None;
        }

        let request = self.live.take()?;
        self.fire(request, now);
        Some(request)
    }

    /// Issues a request and fires it at once, skipping the quiet period.
    /// Used for the initial load.
    pub fn fire_now(&mut self, now: Instant) -> RefreshRequest {
        let request = self.notify_changed(now);
        self.cancel();
        self.fire(request, now);
        request
    }

    /// Drops the live request without firing it. Safe when nothing is pending.
    pub fn cancel(&mut self) {
        self.pending.cancel();
        self.live = None;
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        earliest(self.pending.deadline(), self.settle.deadline())
    }

    /// Request that has been issued but not yet fired or cancelled.
    pub fn live(&self) -> Option<RefreshRequest> {
        self.live
    }

    /// Whether `request` is still the newest refresh to have fired.
    pub fn is_current(&self, request: RefreshRequest) -> bool {
        self.last_fired == Some(request)
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing
    }

    fn fire(&mut self, request: RefreshRequest, now: Instant) {
        self.last_fired = Some(request);
        self.refreshing = true;
        self.settle.arm_once(now, self.settle_delay);
    }
}
