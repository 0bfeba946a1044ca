use std::time::{Duration, Instant};

use super::ComputationHandler;

/// Ways of specifying a timeout.
#[derive(Debug, Clone, Copy, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub enum Timer {
    /// Aborts after the given duration, measured from the `started` call.
    SingleTimeout(Duration),
    /// Aborts at the given point in time.
    FixedEnd(Instant),
}

/// A handler which aborts a computation after a timeout.
///
/// The normalization orchestrator checks its handler at conjunct granularity:
/// a run may be abandoned between conjuncts, but a conjunct already in
/// progress is not interrupted mid-transform.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct TimeoutHandler {
    timer: Timer,
    checkpoint: Instant,
}

impl TimeoutHandler {
    /// Constructs a new timeout handler.
    pub fn new(timer: Timer) -> Self {
        Self { timer, checkpoint: Instant::now() }
    }
}

impl ComputationHandler for TimeoutHandler {
    fn started(&mut self) {
        self.checkpoint = Instant::now();
    }

    fn aborted(&self) -> bool {
        match self.timer {
            Timer::SingleTimeout(timeout) => self.checkpoint.elapsed() >= timeout,
            Timer::FixedEnd(end) => Instant::now() >= end,
        }
    }
}
