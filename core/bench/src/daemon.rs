//! `bench daemon`: owns the tab-sync port and keeps the focused bench's
//! browser urls current.

use std::sync::Arc;

use bench_core::tabsync::spawn_server;
use bench_core::{BenchConfig, BenchEngine, EntityStore, Result, StorageConfig, TabHub};
use tracing::{info, warn};

use crate::backoff;

pub fn run(storage: &StorageConfig, config: &BenchConfig) -> Result<()> {
    backoff::apply_startup_backoff(&storage.daemon_backoff_file());

    let mut engine = BenchEngine::from_config(EntityStore::new(storage.clone()), config);
    let server = if config.tab_sync.enabled {
        let hub = TabHub::from_config(&config.tab_sync);
        let server = spawn_server(&config.tab_sync.bind, hub.clone())?;
        engine = engine.with_tab_source(Arc::new(hub));
        Some(server)
    } else {
        warn!("Tab sync disabled; browser urls will not be synced");
        None
    };

    info!(
        addr = ?server.as_ref().map(|server| server.addr()),
        interval_ms = config.daemon.sync_interval_ms,
        "Bench daemon started"
    );
    let iterations = engine.run_sync_loop(config.daemon.sync_interval(), || false);
    info!(iterations, "Bench daemon stopped");
    Ok(())
}
