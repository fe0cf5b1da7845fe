use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use bench_protocol::TabReport;
use tracing::{debug, warn};

use super::TabSource;
use crate::config::TabSyncConfig;
use crate::error::{BenchError, Result};
use crate::poll::{poll_until, PollConfig, PollOutcome};

/// Meeting point between the HTTP server (which records pushes) and the
/// engine (which waits for a fresh one).
#[derive(Clone)]
pub struct TabHub {
    shared: Arc<Shared>,
    poll: PollConfig,
    freshness: Duration,
}

struct Shared {
    latest: Mutex<Option<Received>>,
    pushes: AtomicU64,
}

struct Received {
    seq: u64,
    at: Instant,
    report: TabReport,
}

impl TabHub {
    pub fn new(poll: PollConfig, freshness: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                latest: Mutex::new(None),
                pushes: AtomicU64::new(0),
            }),
            poll,
            freshness,
        }
    }

    pub fn from_config(config: &TabSyncConfig) -> Self {
        Self::new(config.poll(), config.freshness())
    }

    /// Stores a push from the companion extension.
    pub fn record_push(&self, report: TabReport) {
        let seq = self.shared.pushes.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(seq, windows = report.window_count(), "Tab report received");
        let mut latest = self
            .shared
            .latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *latest = Some(Received {
            seq,
            at: Instant::now(),
            report,
        });
    }

    pub fn pushes_received(&self) -> u64 {
        self.shared.pushes.load(Ordering::SeqCst)
    }

    /// Forgets the last report; returns the push count at the moment of reset.
    fn reset(&self) -> u64 {
        let mut latest = self
            .shared
            .latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *latest = None;
        self.shared.pushes.load(Ordering::SeqCst)
    }

    fn take_fresh(&self, baseline: u64) -> Option<TabReport> {
        let latest = self
            .shared
            .latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let received = latest.as_ref()?;
        if received.seq <= baseline {
            return None;
        }
        if received.at.elapsed() > self.freshness {
            debug!(seq = received.seq, "Discarding stale tab report");
            return None;
        }
        Some(received.report.clone())
    }
}

impl TabSource for TabHub {
    fn fresh_tabs(&self) -> Result<TabReport> {
        let baseline = self.reset();
        match poll_until(self.poll, || Ok(self.take_fresh(baseline)))? {
            PollOutcome::Ready(report) => Ok(report),
            PollOutcome::TimedOut { attempts } => {
                let waited_ms = self.poll.timeout_ms();
                warn!(waited_ms, attempts, "Companion extension sent no tab report");
                Err(BenchError::SyncTimeout { waited_ms })
            }
        }
    }
}
