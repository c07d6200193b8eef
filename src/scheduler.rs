use std::time::Duration;

/// Adaptive tick cadence: the next tick is delayed by whatever is left of the
/// target interval after processing, but never less than the floor.
#[derive(Debug, Clone)]
pub struct Cadence {
    target: Duration,
    floor: Duration,
    total_ticks: u64,
    deadline_misses: u64,
    worst_case: Duration,
}

impl Cadence {
    pub fn new(target: Duration, floor: Duration) -> Self {
        Self {
            target,
            floor,
            total_ticks: 0,
            deadline_misses: 0,
            worst_case: Duration::ZERO,
        }
    }

    /// Records one tick's processing time and returns the delay before the next tick
    pub fn next_delay(&mut self, processing: Duration) -> Duration {
        self.total_ticks += 1;
        if processing > self.target {
            self.deadline_misses += 1;
        }
        if processing > self.worst_case {
            self.worst_case = processing;
        }

        self.target.saturating_sub(processing).max(self.floor)
    }

    pub fn target(&self) -> Duration {
        self.target
    }

    pub fn total_ticks(&self) -> u64 {
        self.total_ticks
    }

    pub fn deadline_misses(&self) -> u64 {
        self.deadline_misses
    }

    pub fn worst_case(&self) -> Duration {
        self.worst_case
    }
}

/// Capped exponential delay between reconnection attempts.
///
/// It only stretches the time between attempts; there is no attempt limit.
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    initial: Duration,
    max: Duration,
    failures: u32,
}

impl ReconnectBackoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max: max.max(initial),
            failures: 0,
        }
    }

    /// Registers a failed attempt and returns the minimum wait before the next one
    pub fn on_failure(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        let exponent = (self.failures - 1).min(16);
        self.initial.saturating_mul(1 << exponent).min(self.max)
    }

    pub fn reset(&mut self) {
        self.failures = 0;
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }
}
