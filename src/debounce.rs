//! Restart-on-change timer for the layout auto-save.
//!
//! Every change pushes the deadline out to `now + quiet`; the timer fires
//! once, when the event loop polls it after the deadline has passed without
//! another change. A drag that keeps moving therefore never fires it.

use std::time::{Duration, Instant};

/// Quiet period after the last change before the layout is written
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(1000);

/// Longest quiet period a debouncer accepts
pub const MAX_QUIET_PERIOD: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
pub struct Debouncer {
    quiet: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    /// Quiet periods beyond [`MAX_QUIET_PERIOD`] are capped
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet: quiet.min(MAX_QUIET_PERIOD),
            deadline: None,
        }
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet
    }

    /// Record a change, (re)arming the deadline
    pub fn notify(&mut self, now: Instant) {
        self.deadline = Some(now.checked_add(self.quiet).unwrap_or(now));
    }

    /// Fire if the deadline has passed. Fires at most once per arming.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Drop a pending deadline without firing
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// When the pending deadline will fire, for sleeping the event loop
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_QUIET_PERIOD)
    }
}
