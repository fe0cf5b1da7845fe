//! File-backed persistence for benches, tools and assembled snapshots.
//!
//! Benches and tools are YAML so they stay hand-editable; assembled snapshots
//! are JSON since only this crate writes them. Every write goes through a
//! temp file in the target directory followed by a rename, so a crash never
//! leaves a half-written record behind.
//!
//! A corrupt snapshot is treated as absent: snapshots are allowed to be stale
//! and are rebuilt from the live tree. A corrupt bench or tool is an error,
//! since it is user-authored and silently dropping it would lose data.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{BenchError, EntityKind, Result};
use crate::model::{AssembledBench, Bench, Tool};
use crate::storage::StorageConfig;

#[derive(Debug, Clone)]
pub struct EntityStore {
    storage: StorageConfig,
}

impl EntityStore {
    pub fn new(storage: StorageConfig) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Benches
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn bench_exists(&self, name: &str) -> bool {
        self.storage.bench_file(name).exists()
    }

    pub fn load_bench(&self, name: &str) -> Result<Bench> {
        let path = self.storage.bench_file(name);
        if !path.exists() {
            return Err(BenchError::bench_not_found(name));
        }
        read_yaml(&path)
    }

    pub fn save_bench(&self, bench: &Bench) -> Result<()> {
        write_yaml(&self.storage.bench_file(&bench.name), bench)
    }

    /// Removes a bench and its snapshot. Tools are shared and stay.
    pub fn delete_bench(&self, name: &str) -> Result<()> {
        let path = self.storage.bench_file(name);
        if !path.exists() {
            return Err(BenchError::bench_not_found(name));
        }
        remove_file(&path)?;
        let snapshot = self.storage.assembled_bench_file(name);
        if snapshot.exists() {
            remove_file(&snapshot)?;
        }
        Ok(())
    }

    pub fn list_benches(&self) -> Result<Vec<Bench>> {
        let mut benches: Vec<Bench> = list_yaml(&self.storage.benches_dir(), EntityKind::Bench)?;
        benches.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(benches)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Tools
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn tool_exists(&self, name: &str) -> bool {
        self.storage.tool_file(name).exists()
    }

    pub fn load_tool(&self, name: &str) -> Result<Tool> {
        let path = self.storage.tool_file(name);
        if !path.exists() {
            return Err(BenchError::tool_not_found(name));
        }
        read_yaml(&path)
    }

    pub fn save_tool(&self, tool: &Tool) -> Result<()> {
        write_yaml(&self.storage.tool_file(&tool.name), tool)
    }

    pub fn list_tools(&self) -> Result<Vec<Tool>> {
        let mut tools: Vec<Tool> = list_yaml(&self.storage.tools_dir(), EntityKind::Tool)?;
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tools)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Assembled Snapshots
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn load_assembled(&self, bench: &str) -> Result<Option<AssembledBench>> {
        let path = self.storage.assembled_bench_file(bench);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs_err::read_to_string(&path)
            .map_err(|err| BenchError::io("failed to read assembled bench", err))?;
        match serde_json::from_str::<AssembledBench>(&content) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "Corrupt assembled bench snapshot; ignoring it"
                );
                Ok(None)
            }
        }
    }

    pub fn save_assembled(&self, snapshot: &AssembledBench) -> Result<()> {
        let content = serde_json::to_string_pretty(snapshot).map_err(|source| BenchError::Json {
            context: format!("failed to serialize snapshot for {}", snapshot.bench),
            source,
        })?;
        write_atomic(&self.storage.assembled_bench_file(&snapshot.bench), &content)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Focused Marker
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn read_focused_marker(&self) -> Result<Option<String>> {
        let path = self.storage.focused_bench_file();
        if !path.exists() {
            return Ok(None);
        }
        let content = fs_err::read_to_string(&path)
            .map_err(|err| BenchError::io("failed to read focused marker", err))?;
        let name = content.trim();
        Ok((!name.is_empty()).then(|| name.to_string()))
    }

    pub fn write_focused_marker(&self, bench: &str) -> Result<()> {
        write_atomic(&self.storage.focused_bench_file(), &format!("{}\n", bench))
    }

    pub fn clear_focused_marker(&self) -> Result<()> {
        let path = self.storage.focused_bench_file();
        if path.exists() {
            remove_file(&path)?;
        }
        Ok(())
    }
}

fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs_err::read_to_string(path)
        .map_err(|err| BenchError::io(format!("failed to read {}", path.display()), err))?;
    serde_yaml::from_str(&content).map_err(|source| BenchError::Yaml {
        context: format!("failed to parse {}", path.display()),
        source,
    })
}

fn write_yaml<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_yaml::to_string(value).map_err(|source| BenchError::Yaml {
        context: format!("failed to serialize {}", path.display()),
        source,
    })?;
    write_atomic(path, &content)
}

/// Loads every `*.yml` record in `dir`. Unparseable files are skipped with a
/// warning so one bad file does not hide the rest from listings.
fn list_yaml<T: DeserializeOwned>(dir: &Path, kind: EntityKind) -> Result<Vec<T>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut paths: Vec<PathBuf> = fs_err::read_dir(dir)
        .map_err(|err| BenchError::io(format!("failed to list {}", dir.display()), err))?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "yml" || ext == "yaml"))
        .collect();
    paths.sort();

    let mut records = Vec::with_capacity(paths.len());
    for path in paths {
        match read_yaml(&path) {
            Ok(record) => records.push(record),
            Err(err) => warn!(%kind, path = %path.display(), error = %err, "Skipping unreadable record"),
        }
    }
    Ok(records)
}

/// Replaces `path` with `content` in one step, creating parent directories.
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let parent = path.parent().ok_or_else(|| {
        BenchError::io(
            format!("{} has no parent directory", path.display()),
            std::io::Error::from(std::io::ErrorKind::InvalidInput),
        )
    })?;
    fs_err::create_dir_all(parent)
        .map_err(|err| BenchError::io("failed to create data directory", err))?;

    let mut temp_file = NamedTempFile::new_in(parent)
        .map_err(|err| BenchError::io("failed to create temp file", err))?;
    temp_file
        .write_all(content.as_bytes())
        .map_err(|err| BenchError::io("failed to write temp file", err))?;
    temp_file
        .flush()
        .map_err(|err| BenchError::io("failed to flush temp file", err))?;
    temp_file
        .persist(path)
        .map_err(|err| BenchError::io(format!("failed to write {}", path.display()), err.error))?;

    debug!(path = %path.display(), "Wrote record");
    Ok(())
}

fn remove_file(path: &Path) -> Result<()> {
    fs_err::remove_file(path)
        .map_err(|err| BenchError::io(format!("failed to remove {}", path.display()), err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AssembledTool, Bay, ToolKind};
    use tempfile::TempDir;

    fn store() -> (TempDir, EntityStore) {
        let temp = TempDir::new().unwrap();
        let store = EntityStore::new(StorageConfig::with_root(temp.path().to_path_buf()));
        (temp, store)
    }

    #[test]
    fn bench_persists_across_loads() {
        let (_temp, store) = store();
        let mut bench = Bench::new("home");
        bench.bays.push(Bay::with_tools("1: Home", &["home-browser"]));
        store.save_bench(&bench).unwrap();

        let loaded = store.load_bench("home").unwrap();
        assert_eq!(loaded, bench);
        assert!(store.bench_exists("home"));
    }

    #[test]
    fn missing_records_are_not_found() {
        let (_temp, store) = store();
        assert!(store.load_bench("nope").unwrap_err().is_not_found());
        assert!(store.load_tool("nope").unwrap_err().is_not_found());
        assert!(store.delete_bench("nope").unwrap_err().is_not_found());
    }

    #[test]
    fn tool_keeps_assembled_state() {
        let (_temp, store) = store();
        let mut tool = Tool::craft(ToolKind::Terminal, "code-term");
        let mut assembled = AssembledTool::new("42".to_string());
        assembled.browser_window_id = None;
        tool.assembled = Some(assembled);
        store.save_tool(&tool).unwrap();

        let loaded = store.load_tool("code-term").unwrap();
        assert_eq!(loaded.window_id(), Some("42"));
    }

    #[test]
    fn listing_skips_unparseable_files() {
        let (_temp, store) = store();
        store.save_tool(&Tool::craft(ToolKind::Note, "notes")).unwrap();
        store.save_tool(&Tool::craft(ToolKind::Browser, "browser")).unwrap();
        fs_err::write(store.storage().tools_dir().join("broken.yml"), "name: [").unwrap();

        let names: Vec<String> = store.list_tools().unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["browser".to_string(), "notes".to_string()]);
    }

    #[test]
    fn listing_an_empty_root_is_empty() {
        let (_temp, store) = store();
        assert!(store.list_benches().unwrap().is_empty());
    }

    #[test]
    fn corrupt_snapshot_reads_as_absent() {
        let (_temp, store) = store();
        let path = store.storage().assembled_bench_file("home");
        fs_err::create_dir_all(path.parent().unwrap()).unwrap();
        fs_err::write(&path, "{ not json").unwrap();

        assert_eq!(store.load_assembled("home").unwrap(), None);
    }

    #[test]
    fn delete_bench_removes_its_snapshot() {
        let (_temp, store) = store();
        store.save_bench(&Bench::new("home")).unwrap();
        let mut snapshot = AssembledBench::new("home");
        snapshot.place("1", "10");
        store.save_assembled(&snapshot).unwrap();

        store.delete_bench("home").unwrap();
        assert!(!store.bench_exists("home"));
        assert_eq!(store.load_assembled("home").unwrap(), None);
    }

    #[test]
    fn focused_marker_round_trip() {
        let (_temp, store) = store();
        assert_eq!(store.read_focused_marker().unwrap(), None);
        store.write_focused_marker("home").unwrap();
        assert_eq!(store.read_focused_marker().unwrap().as_deref(), Some("home"));
        store.clear_focused_marker().unwrap();
        assert_eq!(store.read_focused_marker().unwrap(), None);
    }
}
