//! Quiet-period scheduling for filter recomputation

use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    Scheduled { due: Instant },
}

/// Cancel-and-reschedule timer driven by explicit `Instant`s.
///
/// Every `schedule` pushes the deadline out by the full quiet period, so a
/// burst of mutations results in a single recompute once the burst ends.
#[derive(Clone, Debug)]
pub struct Debouncer {
    delay: Duration,
    state: DebounceState,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            state: DebounceState::Idle,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn state(&self) -> DebounceState {
        self.state
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, DebounceState::Scheduled { .. })
    }

    /// Cancel any pending deadline and start a new quiet period at `now`
    pub fn schedule(&mut self, now: Instant) {
        self.state = DebounceState::Scheduled {
            due: now + self.delay,
        };
    }

    pub fn cancel(&mut self) {
        self.state = DebounceState::Idle;
    }

    /// Returns true exactly once when the deadline has passed
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.state {
            DebounceState::Scheduled { due } if now >= due => {
                self.state = DebounceState::Idle;
                true
            }
            _ => false,
        }
    }
}
