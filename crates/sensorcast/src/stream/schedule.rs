use std::time::Duration;

use crate::config::{PollingConfig, RetryStrategy};

/// When a stream polls next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    interval: Duration,
    retry: RetryStrategy,
    max_interval: Duration,
}

impl PollSchedule {
    /// Poll every `interval`, retrying failures at the same pace forever.
    pub fn fixed(interval: Duration) -> Self {
        Self {
            interval,
            retry: RetryStrategy::Fixed,
            max_interval: interval,
        }
    }

    /// Poll every `interval`, doubling the wait per consecutive failure up to `max_interval`.
    pub fn exponential(interval: Duration, max_interval: Duration) -> Self {
        Self {
            interval,
            retry: RetryStrategy::Exponential,
            max_interval: max_interval.max(interval),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait before the next poll given the current run of failures.
    ///
    /// The first retry always waits one interval.
    pub fn delay_after(&self, consecutive_failures: u32) -> Duration {
        match self.retry {
            RetryStrategy::Fixed => self.interval,
            RetryStrategy::Exponential if consecutive_failures <= 1 => self.interval,
            RetryStrategy::Exponential => {
                let factor = 1u32.checked_shl(consecutive_failures - 1).unwrap_or(u32::MAX);
                self.interval
                    .checked_mul(factor)
                    .map_or(self.max_interval, |d| d.min(self.max_interval))
            }
        }
    }
}

impl From<&PollingConfig> for PollSchedule {
    fn from(config: &PollingConfig) -> Self {
        match config.retry {
            RetryStrategy::Fixed => Self::fixed(config.interval()),
            RetryStrategy::Exponential => {
                Self::exponential(config.interval(), config.max_interval())
            }
        }
    }
}
