//! Reconciliation engine.
//!
//! Owns the working copy of benches and tools for the duration of one
//! operation and reconciles it against the live window tree. Every operation
//! is synchronous and runs to completion; launches happen one at a time.
//!
//! - `focus.rs`: focus, assemble, stow and the dry-run plan
//! - `layout.rs`: layout capture, sync-layout, sync-tool-state, daemon loop

mod focus;
mod layout;


use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::config::BenchConfig;
use crate::discovery::WindowDiscovery;
use crate::error::{BenchError, EntityKind, Result};
use crate::model::{AssembledBench, AssembledTool, Bay, Bench, Tool, ToolKind};
use crate::poll::PollConfig;
use crate::store::EntityStore;
use crate::tabsync::TabSource;
use crate::tools::{CommandSpawner, ToolRegistry};
use crate::wm::{live_window_ids, windows, SwayMsgAdapter, WindowInfo, WindowManager};

pub use focus::{FocusMode, FocusPhase, FocusPlan, FocusReport, StowReport};
pub use layout::{compute_layout, LayoutDiff, ToolSyncOutcome, ToolSyncReport};

/// Where one tool of a bench stands against the live tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolStatus {
    pub name: String,
    pub kind: ToolKind,
    pub bay: Option<String>,
    pub window_id: Option<String>,
    pub workspace: Option<String>,
    pub live: bool,
    /// Whether this operation launched the tool.
    pub launched: bool,
}

#[derive(Debug, Clone)]
pub struct BenchInfo {
    pub bench: Bench,
    pub focused: bool,
    pub tools: Vec<ToolStatus>,
    /// Every referenced tool has a live window.
    pub assembled: bool,
    pub snapshot: Option<AssembledBench>,
}

pub struct BenchEngine {
    store: EntityStore,
    wm: Arc<dyn WindowManager>,
    registry: ToolRegistry,
    tabs: Option<Arc<dyn TabSource>>,
    discovery_poll: PollConfig,
}

impl BenchEngine {
    pub fn new(
        store: EntityStore,
        wm: Arc<dyn WindowManager>,
        registry: ToolRegistry,
        discovery_poll: PollConfig,
    ) -> Self {
        Self {
            store,
            wm,
            registry,
            tabs: None,
            discovery_poll,
        }
    }

    /// Production wiring: the configured window-manager client and real
    /// process spawning.
    pub fn from_config(store: EntityStore, config: &BenchConfig) -> Self {
        let wm = Arc::new(SwayMsgAdapter::new(config.window_manager.program.clone()));
        let registry = ToolRegistry::new(config.apps.clone(), Arc::new(CommandSpawner));
        Self::new(store, wm, registry, config.discovery.poll())
    }

    pub fn with_tab_source(mut self, tabs: Arc<dyn TabSource>) -> Self {
        self.tabs = Some(tabs);
        self
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Benches
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn create_bench(&self, name: &str) -> Result<Bench> {
        validate_name(EntityKind::Bench, name)?;
        if self.store.bench_exists(name) {
            return Err(BenchError::AlreadyExists {
                kind: EntityKind::Bench,
                name: name.to_string(),
            });
        }
        self.ensure_dirs()?;
        let bench = Bench::new(name);
        self.store.save_bench(&bench)?;
        info!(bench = %name, "Created bench");
        Ok(bench)
    }

    pub fn delete_bench(&self, name: &str) -> Result<()> {
        self.store.delete_bench(name)?;
        if self.store.read_focused_marker()?.as_deref() == Some(name) {
            self.store.clear_focused_marker()?;
        }
        info!(bench = %name, "Deleted bench");
        Ok(())
    }

    pub fn list_benches(&self) -> Result<Vec<Bench>> {
        self.store.list_benches()
    }

    /// Puts `tool` into `bay` of `bench`, creating the bay when needed.
    pub fn add_tool(&self, bench_name: &str, bay_name: &str, tool_name: &str) -> Result<Bench> {
        validate_name(EntityKind::Bay, bay_name)?;
        let mut bench = self.store.load_bench(bench_name)?;
        if !self.store.tool_exists(tool_name) {
            return Err(BenchError::tool_not_found(tool_name));
        }
        if let Some(existing) = bench
            .bays
            .iter()
            .find(|bay| bay.tool_names.iter().any(|t| t == tool_name))
        {
            return Err(BenchError::DuplicateTool {
                tool: tool_name.to_string(),
                bay: existing.name.clone(),
            });
        }

        match bench.bay_mut(bay_name) {
            Some(bay) => bay.tool_names.push(tool_name.to_string()),
            None => bench.bays.push(Bay::with_tools(bay_name, &[tool_name])),
        }
        self.store.save_bench(&bench)?;
        info!(bench = %bench_name, bay = %bay_name, tool = %tool_name, "Added tool to bench");
        Ok(bench)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Tools
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn craft_tool(&self, kind: ToolKind, name: &str) -> Result<Tool> {
        validate_name(EntityKind::Tool, name)?;
        if self.store.tool_exists(name) {
            return Err(BenchError::AlreadyExists {
                kind: EntityKind::Tool,
                name: name.to_string(),
            });
        }
        self.ensure_dirs()?;
        let tool = Tool::craft(kind, name);
        self.store.save_tool(&tool)?;
        info!(tool = %name, %kind, "Crafted tool");
        Ok(tool)
    }

    pub fn list_tools(&self) -> Result<Vec<Tool>> {
        self.store.list_tools()
    }

    /// Makes sure one tool has a live window, optionally moving it onto
    /// `workspace`.
    pub fn assemble_tool(&self, name: &str, workspace: Option<&str>) -> Result<ToolStatus> {
        let mut tool = self.store.load_tool(name)?;
        let mut live = live_window_ids(&self.wm.tree()?);
        let (window_id, launched) = self.ensure_assembled(&mut tool, &mut live)?;

        if let Some(workspace) = workspace {
            self.wm.move_to_workspace(&window_id, workspace)?;
        }

        let current = windows(&self.wm.tree()?);
        let mut status = status_for(&tool, None, &current);
        status.launched = launched;
        Ok(status)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────────

    /// Name in the focused-bench marker.
    pub fn active(&self) -> Result<Option<String>> {
        self.store.read_focused_marker()
    }

    pub fn info(&self, name: &str) -> Result<BenchInfo> {
        let bench = self.store.load_bench(name)?;
        let current = windows(&self.wm.tree()?);
        let focused = self.focused_bench_name()?.as_deref() == Some(name);

        let mut tools = Vec::new();
        for bay in &bench.bays {
            for tool_name in &bay.tool_names {
                match self.store.load_tool(tool_name) {
                    Ok(tool) => tools.push(status_for(&tool, Some(bay.name.as_str()), &current)),
                    Err(err) if err.is_not_found() => {
                        warn!(bench = %name, tool = %tool_name, "Bench references a missing tool");
                    }
                    Err(err) => return Err(err),
                }
            }
        }
        let assembled = !tools.is_empty()
            && tools.len() == bench.tool_names().len()
            && tools.iter().all(|status| status.live);

        Ok(BenchInfo {
            snapshot: self.store.load_assembled(name)?,
            bench,
            focused,
            tools,
            assembled,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Shared helpers
    // ─────────────────────────────────────────────────────────────────────────────

    fn ensure_dirs(&self) -> Result<()> {
        self.store
            .storage()
            .ensure_dirs()
            .map_err(|err| BenchError::io("failed to create data directories", err))
    }

    /// The focused bench: the marker when it names an existing bench,
    /// otherwise whichever bench carries the focused flag.
    fn focused_bench_name(&self) -> Result<Option<String>> {
        if let Some(name) = self.store.read_focused_marker()? {
            if self.store.bench_exists(&name) {
                return Ok(Some(name));
            }
            warn!(bench = %name, "Focused marker names a missing bench");
        }
        Ok(self
            .store
            .list_benches()?
            .into_iter()
            .find(|bench| bench.focused)
            .map(|bench| bench.name))
    }

    fn require_focused(&self) -> Result<String> {
        self.focused_bench_name()?.ok_or(BenchError::NoFocusedBench)
    }

    /// Every tool the bench references. Fails before any side effect when one
    /// is missing.
    fn load_bench_tools(&self, bench: &Bench) -> Result<BTreeMap<String, Tool>> {
        let mut tools = BTreeMap::new();
        for bay in &bench.bays {
            for tool_name in &bay.tool_names {
                if tools.contains_key(tool_name) {
                    continue;
                }
                let tool = self.store.load_tool(tool_name).map_err(|err| {
                    if err.is_not_found() {
                        err.in_assembly(&bench.name, &bay.name, tool_name)
                    } else {
                        err
                    }
                })?;
                tools.insert(tool_name.clone(), tool);
            }
        }
        Ok(tools)
    }

    /// Like [`Self::load_bench_tools`] but skips missing tools, for
    /// operations that only observe.
    fn load_bench_tools_lenient(&self, bench: &Bench) -> Result<BTreeMap<String, Tool>> {
        let mut tools = BTreeMap::new();
        for tool_name in bench.tool_names() {
            match self.store.load_tool(tool_name) {
                Ok(tool) => {
                    tools.insert(tool_name.to_string(), tool);
                }
                Err(err) if err.is_not_found() => {
                    warn!(bench = %bench.name, tool = %tool_name, "Skipping missing tool");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(tools)
    }

    /// Window ids other benches hold: windows tracked by their tools and
    /// windows in their snapshots. Tools shared with `bench` do not count.
    fn windows_claimed_elsewhere(&self, bench: &Bench) -> Result<HashSet<String>> {
        let own: HashSet<&str> = bench.tool_names().into_iter().collect();
        let mut claimed = HashSet::new();
        for other in self.store.list_benches()? {
            if other.name == bench.name {
                continue;
            }
            for tool_name in other.tool_names() {
                if own.contains(tool_name) {
                    continue;
                }
                match self.store.load_tool(tool_name) {
                    Ok(tool) => claimed.extend(tool.window_id().map(str::to_string)),
                    Err(err) if err.is_not_found() => {}
                    Err(err) => return Err(err),
                }
            }
            if let Some(snapshot) = self.store.load_assembled(&other.name)? {
                claimed.extend(snapshot.all_windows());
            }
        }
        Ok(claimed)
    }

    /// Reuses the tool's tracked window when it is in `live`, otherwise
    /// launches and discovers a new one. The new assembled state is
    /// persisted right away so a failure later in the same operation does
    /// not orphan the window.
    fn ensure_assembled(&self, tool: &mut Tool, live: &mut HashSet<String>) -> Result<(String, bool)> {
        if let Some(window_id) = tool.window_id() {
            if live.contains(window_id) {
                return Ok((window_id.to_string(), false));
            }
            info!(tool = %tool.name, window_id, "Tracked window is gone; relaunching");
        }

        let discovery = WindowDiscovery::new(
            self.wm.as_ref(),
            &self.registry,
            self.tabs.as_deref(),
            self.discovery_poll,
        );
        let discovered = discovery.launch_and_discover(tool)?;

        tool.assembled = Some(AssembledTool {
            window_id: discovered.window_id.clone(),
            browser_window_id: discovered.browser_window_id,
            last_assembled_at: Utc::now(),
        });
        self.store.save_tool(tool)?;
        live.insert(discovered.window_id.clone());
        Ok((discovered.window_id, true))
    }
}

fn validate_name(kind: EntityKind, name: &str) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed != name || name.chars().any(char::is_control) {
        return Err(BenchError::InvalidName {
            kind,
            name: name.to_string(),
        });
    }
    Ok(())
}

fn status_for(tool: &Tool, bay: Option<&str>, current: &[WindowInfo]) -> ToolStatus {
    let window = tool
        .window_id()
        .and_then(|id| current.iter().find(|window| window.id == id));
    ToolStatus {
        name: tool.name.clone(),
        kind: tool.kind(),
        bay: bay.map(str::to_string),
        window_id: tool.window_id().map(str::to_string),
        workspace: window.and_then(|window| window.workspace.clone()),
        live: window.is_some(),
        launched: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeSpawner, FakeWindowManager};
    use crate::storage::StorageConfig;
    use std::time::Duration;
    use tempfile::TempDir;

    fn engine() -> (TempDir, Arc<FakeWindowManager>, BenchEngine) {
        let temp = TempDir::new().unwrap();
        let store = EntityStore::new(StorageConfig::with_root(temp.path().to_path_buf()));
        let wm = Arc::new(FakeWindowManager::new());
        let registry = ToolRegistry::new(
            Default::default(),
            Arc::new(FakeSpawner::opening(wm.clone())),
        );
        let poll = PollConfig::new(Duration::from_millis(1), Duration::from_millis(50));
        let engine = BenchEngine::new(store, wm.clone(), registry, poll);
        (temp, wm, engine)
    }

    #[test]
    fn create_bench_rejects_duplicates_and_bad_names() {
        let (_temp, _wm, engine) = engine();
        engine.create_bench("home").unwrap();
        assert!(matches!(
            engine.create_bench("home").unwrap_err(),
            BenchError::AlreadyExists { kind: EntityKind::Bench, .. }
        ));
        assert!(matches!(
            engine.create_bench(" padded ").unwrap_err(),
            BenchError::InvalidName { .. }
        ));
        assert!(matches!(engine.create_bench("").unwrap_err(), BenchError::InvalidName { .. }));
    }

    #[test]
    fn add_tool_creates_bay_and_rejects_duplicates() {
        let (_temp, _wm, engine) = engine();
        engine.create_bench("work").unwrap();
        engine.craft_tool(ToolKind::Terminal, "term").unwrap();
        engine.craft_tool(ToolKind::Note, "notes").unwrap();

        engine.add_tool("work", "2: Code", "term").unwrap();
        let bench = engine.add_tool("work", "2: Code", "notes").unwrap();
        assert_eq!(bench.bays.len(), 1);
        assert_eq!(bench.bays[0].tool_names, vec!["term", "notes"]);

        match engine.add_tool("work", "3: Other", "term").unwrap_err() {
            BenchError::DuplicateTool { bay, .. } => assert_eq!(bay, "2: Code"),
            other => panic!("expected duplicate, got {:?}", other),
        }
        assert!(engine.add_tool("work", "2: Code", "missing").unwrap_err().is_not_found());
        assert!(engine.add_tool("nope", "2: Code", "term").unwrap_err().is_not_found());
    }

    #[test]
    fn craft_tool_writes_kind_defaults() {
        let (_temp, _wm, engine) = engine();
        let tool = engine.craft_tool(ToolKind::Browser, "home-browser").unwrap();
        assert_eq!(tool.kind(), ToolKind::Browser);
        assert!(engine.craft_tool(ToolKind::Note, "home-browser").is_err());
        let names: Vec<String> = engine.list_tools().unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["home-browser"]);
    }

    #[test]
    fn assemble_tool_reuses_live_window() {
        let (_temp, wm, engine) = engine();
        engine.craft_tool(ToolKind::Terminal, "term").unwrap();

        let first = engine.assemble_tool("term", Some("5")).unwrap();
        assert!(first.launched);
        assert_eq!(first.workspace.as_deref(), Some("5"));

        let second = engine.assemble_tool("term", None).unwrap();
        assert!(!second.launched);
        assert_eq!(second.window_id, first.window_id);
        assert_eq!(wm.workspace_names().len(), 2);
    }

    #[test]
    fn delete_focused_bench_clears_marker() {
        let (_temp, _wm, engine) = engine();
        engine.create_bench("home").unwrap();
        engine.store().write_focused_marker("home").unwrap();

        engine.delete_bench("home").unwrap();
        assert_eq!(engine.active().unwrap(), None);
        assert!(engine.list_benches().unwrap().is_empty());
    }

    #[test]
    fn info_reports_liveness_per_tool() {
        let (_temp, wm, engine) = engine();
        engine.create_bench("work").unwrap();
        engine.craft_tool(ToolKind::Terminal, "term").unwrap();
        engine.craft_tool(ToolKind::Note, "notes").unwrap();
        engine.add_tool("work", "1", "term").unwrap();
        engine.add_tool("work", "2", "notes").unwrap();

        let status = engine.assemble_tool("term", None).unwrap();
        let info = engine.info("work").unwrap();
        assert!(!info.assembled);
        assert!(!info.focused);
        assert_eq!(info.tools.len(), 2);
        assert!(info.tools[0].live);
        assert_eq!(info.tools[0].bay.as_deref(), Some("1"));
        assert!(!info.tools[1].live);

        wm.close_window(status.window_id.as_deref().unwrap());
        assert!(!engine.info("work").unwrap().tools[0].live);
    }
}
