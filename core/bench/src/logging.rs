//! Tracing setup for the `bench` binary.
//!
//! Everything goes to stderr, and to a daily log file under `<root>/logs`
//! when that directory can be created. The returned guard flushes the file
//! writer on drop, so `main` holds it for the life of the process.

use std::env;
use std::io;

use bench_core::StorageConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEBUG_ENV: &str = "BENCH_DEBUG_LOG";
const LOG_FILE_PREFIX: &str = "bench.log";

pub fn init(storage: &StorageConfig) -> Option<WorkerGuard> {
    let stderr_layer = fmt::layer().with_writer(io::stderr).with_target(false);
    let logs_dir = storage.logs_dir();

    if let Err(err) = fs_err::create_dir_all(&logs_dir) {
        let _ = tracing_subscriber::registry()
            .with(filter())
            .with(stderr_layer)
            .try_init();
        tracing::warn!(error = %err, "Failed to create log directory; logging to stderr only");
        return None;
    }

    let appender = tracing_appender::rolling::daily(&logs_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let file_layer = fmt::layer().with_writer(writer).with_ansi(false);

    let _ = tracing_subscriber::registry()
        .with(filter())
        .with(stderr_layer)
        .with(file_layer)
        .try_init();
    Some(guard)
}

fn filter() -> EnvFilter {
    if debug_enabled() {
        return EnvFilter::new("debug");
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn debug_enabled() -> bool {
    env::var(DEBUG_ENV)
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false)
}
