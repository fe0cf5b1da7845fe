//! Browser tab capture through the companion extension.
//!
//! The extension pushes its full `{window id → urls}` mapping on its own
//! timer. Nothing here ever pulls: a caller that wants fresh data resets the
//! last report and waits, bounded, for the next push.

mod hub;
mod server;

use bench_protocol::TabReport;
use tracing::warn;

use crate::config::TabSyncConfig;
use crate::error::Result;

pub use hub::TabHub;
pub use server::{router, spawn_server, ServerHandle};

pub trait TabSource: Send + Sync {
    /// Waits for a report pushed after this call started.
    ///
    /// Fails with [`crate::BenchError::SyncTimeout`] when none arrives in
    /// time; callers treat that as "unknown", never as "no tabs".
    fn fresh_tabs(&self) -> Result<TabReport>;
}

/// A hub with a server feeding it, for commands that need tab data.
pub struct TabSync {
    pub hub: TabHub,
    pub server: ServerHandle,
}

impl TabSync {
    /// Starts the server unless tab sync is disabled or the port is taken
    /// (usually by a running daemon). Either way the caller continues
    /// without tab data.
    pub fn start(config: &TabSyncConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let hub = TabHub::from_config(config);
        match spawn_server(&config.bind, hub.clone()) {
            Ok(server) => Some(Self { hub, server }),
            Err(err) => {
                warn!(
                    bind = %config.bind,
                    error = %err,
                    "Tab sync unavailable; continuing without tab data"
                );
                None
            }
        }
    }

    pub fn source(&self) -> &dyn TabSource {
        &self.hub
    }
}
