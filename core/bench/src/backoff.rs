//! Restart throttling for `bench daemon`.
//!
//! When a supervisor keeps restarting a crashing daemon, each start past the
//! free allowance waits before serving. Start times live in
//! `<root>/daemon/backoff.json`.

use std::path::Path;
use std::time::Duration;

use bench_core::store::write_atomic;
use bench_core::{BenchError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Starts older than this no longer count.
const RESTART_WINDOW_SECS: i64 = 120;
const FREE_RESTARTS: usize = 3;
const DELAY_PER_RESTART: Duration = Duration::from_secs(10);
const DELAY_CAP: Duration = Duration::from_secs(60);

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
struct StartHistory {
    starts: Vec<DateTime<Utc>>,
}

impl StartHistory {
    fn read(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs_err::read_to_string(path)
            .map_err(|err| BenchError::io("failed to read daemon start history", err))?;
        serde_json::from_str(&content).map_err(|source| BenchError::Json {
            context: format!("parsing {}", path.display()),
            source,
        })
    }

    fn write(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self).map_err(|source| BenchError::Json {
            context: "serializing daemon start history".to_string(),
            source,
        })?;
        write_atomic(path, &content)
    }

    /// Adds a start at `now`, forgets starts outside the window and returns
    /// the delay this start owes.
    fn note_start(&mut self, now: DateTime<Utc>) -> Duration {
        let window = chrono::Duration::seconds(RESTART_WINDOW_SECS);
        self.starts.retain(|start| now - *start <= window);
        self.starts.push(now);

        let over = self.starts.len().saturating_sub(FREE_RESTARTS);
        let over = u32::try_from(over).unwrap_or(u32::MAX);
        DELAY_PER_RESTART.saturating_mul(over).min(DELAY_CAP)
    }
}

/// Records this start and sleeps for whatever it owes. State problems are
/// logged and never stop the daemon.
pub fn apply_startup_backoff(path: &Path) {
    let mut history = StartHistory::read(path).unwrap_or_else(|err| {
        warn!(error = %err, "Daemon start history unreadable; starting fresh");
        StartHistory::default()
    });
    let delay = history.note_start(Utc::now());
    if let Err(err) = history.write(path) {
        warn!(error = %err, "Could not save daemon start history");
    }

    if !delay.is_zero() {
        warn!(
            recent_starts = history.starts.len(),
            delay_secs = delay.as_secs(),
            "Daemon restarting too often; delaying startup"
        );
        std::thread::sleep(delay);
    }
}
