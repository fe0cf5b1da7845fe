//! Storage configuration and path management for bench data.
//!
//! All path decisions live here so the store, the config loader and the CLI
//! agree on the on-disk layout:
//!
//! ```text
//! <root>/
//!   config.toml
//!   focused-bench                 # plain-text marker
//!   benches/<name>.yml            # user-authored bench specs
//!   tools/<name>.yml              # tool specs + assembled state
//!   assembled-benches/<name>.json # runtime layout snapshots
//!   daemon/backoff.json
//!   logs/
//! ```
//!
//! Production code uses `StorageConfig::default()`; tests use
//! `StorageConfig::with_root(temp_dir)` for isolation.

use std::path::{Path, PathBuf};

/// Overrides the data root for every bench command.
pub const ROOT_ENV: &str = "BENCH_HOME";

#[derive(Debug, Clone)]
pub struct StorageConfig {
    root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        if let Some(root) = std::env::var_os(ROOT_ENV).filter(|value| !value.is_empty()) {
            return Self {
                root: PathBuf::from(root),
            };
        }
        let base = dirs::data_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".local").join("share")))
            .unwrap_or_else(std::env::temp_dir);
        Self {
            root: base.join("bench"),
        }
    }
}

impl StorageConfig {
    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Global Files
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    /// Path to the marker naming the focused bench.
    pub fn focused_bench_file(&self) -> PathBuf {
        self.root.join("focused-bench")
    }

    pub fn daemon_backoff_file(&self) -> PathBuf {
        self.root.join("daemon").join("backoff.json")
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Directories
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn benches_dir(&self) -> PathBuf {
        self.root.join("benches")
    }

    pub fn tools_dir(&self) -> PathBuf {
        self.root.join("tools")
    }

    pub fn assembled_benches_dir(&self) -> PathBuf {
        self.root.join("assembled-benches")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Per-Entity Paths
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn bench_file(&self, name: &str) -> PathBuf {
        self.benches_dir()
            .join(format!("{}.yml", Self::encode_name(name)))
    }

    pub fn tool_file(&self, name: &str) -> PathBuf {
        self.tools_dir().join(format!("{}.yml", Self::encode_name(name)))
    }

    pub fn assembled_bench_file(&self, name: &str) -> PathBuf {
        self.assembled_benches_dir()
            .join(format!("{}.json", Self::encode_name(name)))
    }

    /// Encodes an entity name for use as a file stem.
    /// Path separators become `_` so a name can never escape its directory.
    pub fn encode_name(name: &str) -> String {
        let encoded: String = name
            .chars()
            .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
            .collect();
        match encoded.as_str() {
            "." | ".." => encoded.replace('.', "_"),
            _ => encoded,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Directory Creation
    // ─────────────────────────────────────────────────────────────────────────────

    /// Ensures the root directory and standard subdirectories exist.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        fs_err::create_dir_all(&self.root)?;
        fs_err::create_dir_all(self.benches_dir())?;
        fs_err::create_dir_all(self.tools_dir())?;
        fs_err::create_dir_all(self.assembled_benches_dir())?;
        Ok(())
    }
}
