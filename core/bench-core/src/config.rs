//! Runtime configuration loaded from `<root>/config.toml`.
//!
//! Every field has a default, so a missing file or a partial file is valid.
//! Application overrides are kept as `Option`s and resolved against the
//! per-kind defaults in [`crate::tools`].

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::error::{BenchError, Result};
use crate::poll::PollConfig;
use crate::storage::StorageConfig;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct BenchConfig {
    pub window_manager: WindowManagerConfig,
    pub apps: AppsConfig,
    pub discovery: DiscoveryConfig,
    pub tab_sync: TabSyncConfig,
    pub daemon: DaemonConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WindowManagerConfig {
    /// IPC client used for tree queries and commands (`swaymsg` or `i3-msg`).
    pub program: String,
}

impl Default for WindowManagerConfig {
    fn default() -> Self {
        Self {
            program: "swaymsg".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppsConfig {
    pub browser: AppConfig,
    pub terminal: AppConfig,
    pub note: AppConfig,
}

/// Per-application overrides. Unset fields fall back to the kind's defaults.
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub program: Option<String>,
    pub args: Option<Vec<String>>,
    /// Regular expressions matched against a window's app_id or class.
    pub window_patterns: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub interval_ms: u64,
    pub timeout_ms: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            interval_ms: 200,
            timeout_ms: 15_000,
        }
    }
}

impl DiscoveryConfig {
    pub fn poll(&self) -> PollConfig {
        PollConfig::new(
            Duration::from_millis(self.interval_ms),
            Duration::from_millis(self.timeout_ms),
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TabSyncConfig {
    pub enabled: bool,
    pub bind: String,
    pub poll_interval_ms: u64,
    pub wait_timeout_ms: u64,
    /// A report older than this is never attributed to a request.
    pub freshness_ms: u64,
}

impl Default for TabSyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: bench_protocol::DEFAULT_BIND.to_string(),
            poll_interval_ms: 100,
            wait_timeout_ms: 5_000,
            freshness_ms: 3_000,
        }
    }
}

impl TabSyncConfig {
    pub fn poll(&self) -> PollConfig {
        PollConfig::new(
            Duration::from_millis(self.poll_interval_ms),
            Duration::from_millis(self.wait_timeout_ms),
        )
    }

    pub fn freshness(&self) -> Duration {
        Duration::from_millis(self.freshness_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub sync_interval_ms: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            sync_interval_ms: 1_000,
        }
    }
}

impl DaemonConfig {
    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms)
    }
}

impl BenchConfig {
    /// Reads the config file, returning defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(BenchConfig::default());
        }

        let content = fs_err::read_to_string(path)
            .map_err(|err| BenchError::io("failed to read config", err))?;
        toml::from_str::<BenchConfig>(&content).map_err(|err| BenchError::ConfigMalformed {
            path: path.to_path_buf(),
            details: err.to_string(),
        })
    }

    /// Loads the config for a storage root, falling back to defaults with a
    /// warning when the file is unreadable.
    pub fn load_or_default(storage: &StorageConfig) -> Self {
        match Self::load(&storage.config_file()) {
            Ok(config) => config,
            Err(err) => {
                warn!(error = %err, "Failed to load bench config; using defaults");
                BenchConfig::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_defaults_when_file_missing() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let config = BenchConfig::load(&temp_dir.path().join("missing.toml")).expect("load");
        assert_eq!(config.window_manager.program, "swaymsg");
        assert_eq!(config.discovery.interval_ms, 200);
        assert_eq!(config.tab_sync.bind, bench_protocol::DEFAULT_BIND);
        assert_eq!(config.daemon.sync_interval(), Duration::from_secs(1));
        assert_eq!(config.apps.browser, AppConfig::default());
    }

    #[test]
    fn load_parses_partial_sections() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("config.toml");
        fs_err::write(
            &path,
            r#"
[window_manager]
program = "i3-msg"

[apps.terminal]
program = "foot"

[discovery]
timeout_ms = 3000

[tab_sync]
enabled = false
"#,
        )
        .expect("write config");

        let config = BenchConfig::load(&path).expect("load");
        assert_eq!(config.window_manager.program, "i3-msg");
        assert_eq!(config.apps.terminal.program.as_deref(), Some("foot"));
        assert!(config.apps.terminal.args.is_none());
        assert_eq!(config.discovery.timeout_ms, 3000);
        assert_eq!(config.discovery.interval_ms, 200);
        assert!(!config.tab_sync.enabled);
        assert_eq!(config.tab_sync.wait_timeout_ms, 5_000);
    }

    #[test]
    fn load_rejects_malformed_toml() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("config.toml");
        fs_err::write(&path, "[discovery\ninterval_ms = ").expect("write config");

        let err = BenchConfig::load(&path).unwrap_err();
        assert!(matches!(err, BenchError::ConfigMalformed { .. }));
    }
}
