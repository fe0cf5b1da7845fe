//! In-memory stand-ins for the window manager, process spawner and tab
//! source, shared by unit and scenario tests.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

use bench_protocol::TabReport;

use crate::error::{BenchError, Result};
use crate::model::BayLayout;
use crate::tabsync::TabSource;
use crate::tools::{LaunchSpec, ProcessSpawner};
use crate::wm::{TreeNode, WindowManager, SCRATCHPAD_WORKSPACE};

pub fn tab_report(windows: &[(&str, &[&str])]) -> TabReport {
    let windows: BTreeMap<String, Vec<String>> = windows
        .iter()
        .map(|(id, urls)| (id.to_string(), urls.iter().map(|u| u.to_string()).collect()))
        .collect();
    TabReport::new(windows)
}

// ─────────────────────────────────────────────────────────────────────────────
// Window manager
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WmCall {
    Move { window: String, workspace: String },
    Scratchpad { window: String },
    Rename { old: String, new: String },
    Focus { workspace: String },
    Layout { window: String, layout: BayLayout },
}

#[derive(Debug, Clone)]
struct FakeWindow {
    id: i64,
    app_id: String,
}

#[derive(Debug, Default)]
struct FakeWmState {
    workspaces: Vec<(String, Vec<FakeWindow>)>,
    calls: Vec<WmCall>,
    next_id: i64,
    unreachable: bool,
}

impl FakeWmState {
    fn workspace_mut(&mut self, name: &str) -> &mut Vec<FakeWindow> {
        let index = match self.workspaces.iter().position(|(ws, _)| ws == name) {
            Some(index) => index,
            None => {
                self.workspaces.push((name.to_string(), Vec::new()));
                self.workspaces.len() - 1
            }
        };
        &mut self.workspaces[index].1
    }

    fn take_window(&mut self, id: &str) -> Option<FakeWindow> {
        for (_, windows) in &mut self.workspaces {
            if let Some(pos) = windows.iter().position(|w| w.id.to_string() == id) {
                return Some(windows.remove(pos));
            }
        }
        None
    }
}

/// A window manager whose tree is a flat list of workspaces. Commands mutate
/// the tree the way sway would and are recorded in order.
#[derive(Debug)]
pub struct FakeWindowManager {
    state: Mutex<FakeWmState>,
}

impl Default for FakeWindowManager {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeWindowManager {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeWmState {
                next_id: 100,
                ..FakeWmState::default()
            }),
        }
    }

    pub fn open_window(&self, app_id: &str, workspace: &str) -> String {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id;
        state.next_id += 1;
        state.workspace_mut(workspace).push(FakeWindow {
            id,
            app_id: app_id.to_string(),
        });
        id.to_string()
    }

    pub fn close_window(&self, id: &str) {
        self.state.lock().unwrap().take_window(id);
    }

    pub fn workspace_of(&self, id: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state
            .workspaces
            .iter()
            .find(|(_, windows)| windows.iter().any(|w| w.id.to_string() == id))
            .map(|(ws, _)| ws.clone())
    }

    pub fn workspace_names(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.workspaces.iter().map(|(ws, _)| ws.clone()).collect()
    }

    pub fn calls(&self) -> Vec<WmCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unwrap().unreachable = unreachable;
    }

    fn record(&self, call: WmCall) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.unreachable {
            return Err(unreachable());
        }
        state.calls.push(call);
        Ok(())
    }
}

fn unreachable() -> BenchError {
    BenchError::Adapter {
        command: "fake".to_string(),
        details: "window manager unreachable".to_string(),
    }
}

impl WindowManager for FakeWindowManager {
    fn tree(&self) -> Result<TreeNode> {
        let state = self.state.lock().unwrap();
        if state.unreachable {
            return Err(unreachable());
        }
        let workspaces = state
            .workspaces
            .iter()
            .enumerate()
            .map(|(index, (name, windows))| TreeNode {
                id: 10 + index as i64,
                name: Some(name.clone()),
                node_type: Some("workspace".to_string()),
                nodes: windows
                    .iter()
                    .map(|window| TreeNode {
                        id: window.id,
                        name: Some(format!("{} {}", window.app_id, window.id)),
                        node_type: Some("con".to_string()),
                        app_id: Some(window.app_id.clone()),
                        ..TreeNode::default()
                    })
                    .collect(),
                ..TreeNode::default()
            })
            .collect();
        Ok(TreeNode {
            id: 1,
            name: Some("root".to_string()),
            node_type: Some("root".to_string()),
            nodes: workspaces,
            ..TreeNode::default()
        })
    }

    fn move_to_workspace(&self, window_id: &str, workspace: &str) -> Result<()> {
        self.record(WmCall::Move {
            window: window_id.to_string(),
            workspace: workspace.to_string(),
        })?;
        let mut state = self.state.lock().unwrap();
        if let Some(window) = state.take_window(window_id) {
            state.workspace_mut(workspace).push(window);
        }
        Ok(())
    }

    fn move_to_scratchpad(&self, window_id: &str) -> Result<()> {
        self.record(WmCall::Scratchpad {
            window: window_id.to_string(),
        })?;
        let mut state = self.state.lock().unwrap();
        if let Some(window) = state.take_window(window_id) {
            state.workspace_mut(SCRATCHPAD_WORKSPACE).push(window);
        }
        Ok(())
    }

    fn rename_workspace(&self, old: &str, new: &str) -> Result<()> {
        self.record(WmCall::Rename {
            old: old.to_string(),
            new: new.to_string(),
        })?;
        let mut state = self.state.lock().unwrap();
        if state.workspaces.iter().any(|(ws, _)| ws == new) {
            return Ok(());
        }
        if let Some(entry) = state.workspaces.iter_mut().find(|(ws, _)| ws == old) {
            entry.0 = new.to_string();
        }
        Ok(())
    }

    fn focus_workspace(&self, workspace: &str) -> Result<()> {
        self.record(WmCall::Focus {
            workspace: workspace.to_string(),
        })
    }

    fn apply_layout(&self, window_id: &str, layout: BayLayout) -> Result<()> {
        self.record(WmCall::Layout {
            window: window_id.to_string(),
            layout,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Spawner
// ─────────────────────────────────────────────────────────────────────────────

enum SpawnBehavior {
    Detached,
    Failing,
    Opens {
        wm: Arc<FakeWindowManager>,
        windows: usize,
    },
}

/// Records launches. Depending on construction it also opens windows in a
/// [`FakeWindowManager`], named after the launched program.
pub struct FakeSpawner {
    behavior: SpawnBehavior,
    spawned: Mutex<Vec<LaunchSpec>>,
}

impl FakeSpawner {
    fn with(behavior: SpawnBehavior) -> Self {
        Self {
            behavior,
            spawned: Mutex::new(Vec::new()),
        }
    }

    /// Spawns succeed but no window ever appears.
    pub fn detached() -> Self {
        Self::with(SpawnBehavior::Detached)
    }

    pub fn failing() -> Self {
        Self::with(SpawnBehavior::Failing)
    }

    pub fn opening(wm: Arc<FakeWindowManager>) -> Self {
        Self::opening_many(wm, 1)
    }

    pub fn opening_many(wm: Arc<FakeWindowManager>, windows: usize) -> Self {
        Self::with(SpawnBehavior::Opens { wm, windows })
    }

    pub fn spawned(&self) -> Vec<LaunchSpec> {
        self.spawned.lock().unwrap().clone()
    }
}

impl ProcessSpawner for FakeSpawner {
    fn spawn(&self, spec: &LaunchSpec) -> std::io::Result<u32> {
        if let SpawnBehavior::Failing = self.behavior {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "program not found",
            ));
        }
        self.spawned.lock().unwrap().push(spec.clone());
        if let SpawnBehavior::Opens { wm, windows } = &self.behavior {
            for _ in 0..*windows {
                wm.open_window(&spec.program, "1");
            }
        }
        Ok(4242)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tab source
// ─────────────────────────────────────────────────────────────────────────────

/// Answers from a queue of reports, then from a sticky report, then times
/// out.
#[derive(Default)]
pub struct FakeTabSource {
    queued: Mutex<VecDeque<TabReport>>,
    sticky: Mutex<Option<TabReport>>,
    requests: Mutex<usize>,
}

impl FakeTabSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&self, report: TabReport) {
        self.queued.lock().unwrap().push_back(report);
    }

    pub fn respond(&self, windows: &[(&str, &[&str])]) {
        *self.sticky.lock().unwrap() = Some(tab_report(windows));
    }

    pub fn requests(&self) -> usize {
        *self.requests.lock().unwrap()
    }
}

impl TabSource for FakeTabSource {
    fn fresh_tabs(&self) -> Result<TabReport> {
        *self.requests.lock().unwrap() += 1;
        if let Some(report) = self.queued.lock().unwrap().pop_front() {
            return Ok(report);
        }
        self.sticky
            .lock()
            .unwrap()
            .clone()
            .ok_or(BenchError::SyncTimeout { waited_ms: 0 })
    }
}
