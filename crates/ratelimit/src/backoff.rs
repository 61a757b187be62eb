use std::time::Duration;

/// Source of successive retry delays.
pub trait Backoff: Send {
    fn next_delay(&mut self) -> Duration;
    fn reset(&mut self);
    fn current_attempt(&self) -> u32;
}

/// Delays grow by a fixed step: `step, 2·step, 3·step, ...`, capped at `max`.
#[derive(Debug, Clone)]
pub struct LinearBackoff {
    step: Duration,
    max: Duration,
    current_attempt: u32,
}

impl LinearBackoff {
    pub fn new(step: Duration, max: Duration) -> Self {
        Self {
            step,
            max,
            current_attempt: 0,
        }
    }
}

impl Backoff for LinearBackoff {
    fn next_delay(&mut self) -> Duration {
        self.current_attempt += 1;
        self.step
            .checked_mul(self.current_attempt)
            .unwrap_or(self.max)
            .min(self.max)
    }

    fn reset(&mut self) {
        self.current_attempt = 0;
    }

    fn current_attempt(&self) -> u32 {
        self.current_attempt
    }
}

impl Default for LinearBackoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), Duration::from_secs(60))
    }
}

#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    current_attempt: u32,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            multiplier: 2.0,
            current_attempt: 0,
        }
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }
}

impl Backoff for ExponentialBackoff {
    fn next_delay(&mut self) -> Duration {
        let delay = if self.current_attempt == 0 {
            self.initial.min(self.max)
        } else {
            let multiplier = self.multiplier.powi(self.current_attempt as i32);
            let delay_ms = self.initial.as_millis() as f64 * multiplier;
            let delay_ms = delay_ms.min(self.max.as_millis() as f64);
            Duration::from_millis(delay_ms as u64)
        };

        self.current_attempt += 1;
        delay
    }

    fn reset(&mut self) {
        self.current_attempt = 0;
    }

    fn current_attempt(&self) -> u32 {
        self.current_attempt
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), Duration::from_secs(30))
    }
}
