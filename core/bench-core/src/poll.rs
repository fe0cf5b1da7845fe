//! Bounded polling for state that changes outside this process.
//!
//! Nothing in the reconciliation path may block without a deadline. Anything
//! that waits on an external effect (a window appearing, a tab report
//! arriving) goes through [`poll_until`].

use std::thread;
use std::time::{Duration, Instant};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollConfig {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    pub fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    Ready(T),
    TimedOut { attempts: u32 },
}

impl<T> PollOutcome<T> {
    pub fn ready(self) -> Option<T> {
        match self {
            PollOutcome::Ready(value) => Some(value),
            PollOutcome::TimedOut { .. } => None,
        }
    }
}

/// Calls `probe` until it yields a value or the timeout elapses.
///
/// The probe always runs at least once, and once more after the deadline
/// passes so an effect that landed during the last sleep is not missed.
/// Errors from the probe abort the poll immediately.
pub fn poll_until<T, F>(config: PollConfig, mut probe: F) -> Result<PollOutcome<T>>
where
    F: FnMut() -> Result<Option<T>>,
{
    let deadline = Instant::now() + config.timeout;
    let mut attempts = 0u32;

    loop {
        attempts = attempts.saturating_add(1);
        if let Some(value) = probe()? {
            return Ok(PollOutcome::Ready(value));
        }

        let now = Instant::now();
        if now >= deadline {
            return Ok(PollOutcome::TimedOut { attempts });
        }
        thread::sleep(config.interval.min(deadline - now));
    }
}
