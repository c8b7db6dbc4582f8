//! Configuration and statistics for garbage collection.

use crate::error::{Error, Result};
use std::time::Duration;

/// Default upper bound on the scheduler sleep between collection ticks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default floor below which the adaptive scheduler will not shrink its poll interval.
pub const MINIMUM_POLL_INTERVAL: Duration = Duration::from_nanos(500);

/// Configuration for the background collection thread.
#[derive(Clone, Copy, Debug)]
pub struct Configuration {
    /// Longest sleep the scheduler may take between ticks. The adaptive policy decays toward
    /// this bound while the heap is quiet.
    pub poll_interval: Duration,
    /// Shortest sleep the scheduler may take between ticks, approached under allocation
    /// pressure.
    pub minimum_poll_interval: Duration,
}

impl Configuration {
    /// Creates a configuration with the given poll interval and the default floor.
    #[must_use]
    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            minimum_poll_interval: MINIMUM_POLL_INTERVAL,
        }
    }

    /// Validates the interval bounds before the scheduler thread is started.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(Error::InvalidConfiguration(
                "poll interval must be non-zero".to_string(),
            ));
        }
        if self.minimum_poll_interval > self.poll_interval {
            return Err(Error::InvalidConfiguration(format!(
                "minimum poll interval {:?} exceeds poll interval {:?}",
                self.minimum_poll_interval, self.poll_interval
            )));
        }
        Ok(())
    }
}

impl Default for Configuration {
    /// Creates a default configuration:
    /// - `poll_interval` of 100 milliseconds
    /// - `minimum_poll_interval` of 500 nanoseconds
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            minimum_poll_interval: MINIMUM_POLL_INTERVAL,
        }
    }
}

/// Statistics about collector activity
#[derive(Clone, Debug, Default)]
pub struct Statistics {
    pub objects_allocated: usize,
    pub objects_swept: usize,
    pub marks_completed: usize,
    pub sweeps_completed: usize,
    /// Number of nodes newly discovered by the most recent mark.
    pub last_marked: usize,
    /// Most recent sleep interval chosen by the adaptive scheduler, if it has run.
    pub last_poll_interval: Option<Duration>,
}
