use std::time::Duration;

/// Exponential reconnect delay: 1, 2, 4, ... units, clamped to `cap` units.
#[derive(Debug, Clone)]
pub struct Backoff {
    unit: Duration,
    cap: u32,
    attempts: u32,
}

impl Backoff {
    pub fn new(unit: Duration, cap: u32) -> Self {
        Self {
            unit,
            cap: cap.max(1),
            attempts: 0,
        }
    }

    /// Delay before the next attempt, counted as one more attempt.
    pub fn next_delay(&mut self) -> Duration {
        let units = self.current_units();
        self.attempts = self.attempts.saturating_add(1);
        self.unit * units
    }

    /// Units the next call to `next_delay` will wait.
    pub fn current_units(&self) -> u32 {
        1u32.checked_shl(self.attempts)
            .unwrap_or(u32::MAX)
            .min(self.cap)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    pub fn set_unit(&mut self, unit: Duration, cap: u32) {
        self.unit = unit;
        self.cap = cap.max(1);
    }
}
