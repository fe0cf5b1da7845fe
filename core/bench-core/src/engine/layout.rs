use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::BenchEngine;
use crate::error::{BenchError, Result};
use crate::model::{AssembledBench, Bench, DeclaredState, Tool};
use crate::tools::{SyncOutcome, TabSnapshot};
use crate::wm::{windows, WindowInfo};

/// Placement changes between two snapshots, as `(bay, window id)` pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayoutDiff {
    pub added: Vec<(String, String)>,
    pub removed: Vec<(String, String)>,
}

impl LayoutDiff {
    pub fn between(previous: Option<&AssembledBench>, current: &AssembledBench) -> Self {
        let pairs = |snapshot: &AssembledBench| -> Vec<(String, String)> {
            snapshot
                .bay_windows
                .iter()
                .flat_map(|(bay, ids)| ids.iter().map(move |id| (bay.clone(), id.clone())))
                .collect()
        };
        let before = previous.map(pairs).unwrap_or_default();
        let after = pairs(current);
        Self {
            added: after.iter().filter(|pair| !before.contains(pair)).cloned().collect(),
            removed: before.iter().filter(|pair| !after.contains(pair)).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolSyncOutcome {
    Updated { urls: usize },
    Unchanged,
    Unknown,
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSyncReport {
    pub tool: String,
    pub outcome: ToolSyncOutcome,
}

/// Recomputes which live windows belong to which bay of `bench`.
///
/// A window sitting on a bay's workspace belongs to that bay, tracked or not.
/// A known window (tracked by a tool or in `previous`) elsewhere keeps its
/// previous bay, falling back to its tool's declared bay. Stowed windows
/// that nobody knows about are ignored.
///
/// Windows in `claimed_elsewhere` belong to other benches and are never
/// adopted, unless one of this bench's own tools tracks them. Benches may
/// share workspace names, so a bay's workspace can hold another bench's
/// windows.
pub fn compute_layout(
    bench: &Bench,
    tools: &BTreeMap<String, Tool>,
    previous: Option<&AssembledBench>,
    current: &[WindowInfo],
    claimed_elsewhere: &HashSet<String>,
) -> AssembledBench {
    let mut declared_bay: BTreeMap<&str, &str> = BTreeMap::new();
    for bay in &bench.bays {
        for tool_name in &bay.tool_names {
            if let Some(window_id) = tools.get(tool_name).and_then(Tool::window_id) {
                declared_bay.entry(window_id).or_insert(bay.name.as_str());
            }
        }
    }

    let mut layout = AssembledBench::new(&bench.name);
    for window in current {
        let own = declared_bay.contains_key(window.id.as_str());
        if !own && claimed_elsewhere.contains(&window.id) {
            continue;
        }
        let on_bay = window
            .workspace
            .as_deref()
            .filter(|_| !window.is_stowed())
            .and_then(|workspace| bench.bay_for_workspace(workspace))
            .map(|bay| bay.name.as_str());
        let known = previous
            .and_then(|previous| previous.bay_of(&window.id))
            .or_else(|| declared_bay.get(window.id.as_str()).copied());

        if let Some(bay) = on_bay.or(known) {
            layout.place(bay, &window.id);
        }
    }
    layout
}

impl BenchEngine {
    /// Captures the live layout of the focused bench into its snapshot.
    pub fn sync_layout(&self) -> Result<LayoutDiff> {
        let name = self.require_focused()?;
        let bench = self.store.load_bench(&name)?;
        let diff = self.capture_layout(&bench)?;
        info!(
            bench = %name,
            added = diff.added.len(),
            removed = diff.removed.len(),
            "Synced layout"
        );
        Ok(diff)
    }

    pub(super) fn capture_layout(&self, bench: &Bench) -> Result<LayoutDiff> {
        let tools = self.load_bench_tools_lenient(bench)?;
        let previous = self.store.load_assembled(&bench.name)?;
        let current = windows(&self.wm.tree()?);
        let claimed = self.windows_claimed_elsewhere(bench)?;

        let mut layout = compute_layout(bench, &tools, previous.as_ref(), &current, &claimed);
        layout.captured_at = Some(Utc::now());
        let diff = LayoutDiff::between(previous.as_ref(), &layout);
        self.store.save_assembled(&layout)?;
        debug!(bench = %bench.name, diff = ?diff, "Captured layout");
        Ok(diff)
    }

    /// Pulls live state into the declared state of every tool of the
    /// focused bench. Only browsers have anything to pull; a browser whose
    /// tabs could not be observed keeps its declared urls. A browser with no
    /// known browser window id gets one from the report when exactly one
    /// unclaimed window shows its declared urls.
    pub fn sync_tool_state(&self) -> Result<Vec<ToolSyncReport>> {
        let name = self.require_focused()?;
        let bench = self.store.load_bench(&name)?;
        let tools = self.load_bench_tools_lenient(&bench)?;
        let linked = self
            .store
            .list_tools()?
            .into_iter()
            .filter_map(|tool| tool.assembled.and_then(|assembled| assembled.browser_window_id));
        let mut tabs = TabSnapshot::new(self.tabs.as_deref()).with_linked(linked);

        let mut reports = Vec::new();
        for tool_name in bench.tool_names() {
            let Some(tool) = tools.get(tool_name) else {
                continue;
            };
            let outcome = match self.registry.sync(tool, &mut tabs) {
                SyncOutcome::Patched(urls) => self.apply_urls(tool, urls)?,
                SyncOutcome::Relinked {
                    browser_window_id,
                    urls,
                } => {
                    let mut linked = tool.clone();
                    if let Some(assembled) = linked.assembled.as_mut() {
                        assembled.browser_window_id = Some(browser_window_id);
                    }
                    self.store.save_tool(&linked)?;
                    self.apply_urls(&linked, urls)?
                }
                SyncOutcome::Unknown => ToolSyncOutcome::Unknown,
                SyncOutcome::Unsupported => ToolSyncOutcome::Unsupported,
            };
            reports.push(ToolSyncReport {
                tool: tool_name.to_string(),
                outcome,
            });
        }
        Ok(reports)
    }

    fn apply_urls(&self, tool: &Tool, urls: Vec<String>) -> Result<ToolSyncOutcome> {
        let mut updated = tool.clone();
        let DeclaredState::Browser(state) = &mut updated.state else {
            return Ok(ToolSyncOutcome::Unsupported);
        };
        if state.urls == urls {
            return Ok(ToolSyncOutcome::Unchanged);
        }
        let count = urls.len();
        state.urls = urls;
        self.store.save_tool(&updated)?;
        info!(tool = %tool.name, urls = count, "Updated browser urls");
        Ok(ToolSyncOutcome::Updated { urls: count })
    }

    /// Runs sync-tool-state every `interval` until `should_stop` says so.
    ///
    /// Iterations never overlap. Errors are logged and the loop goes on; no
    /// focused bench simply means there is nothing to do this round.
    pub fn run_sync_loop<F>(&self, interval: Duration, mut should_stop: F) -> usize
    where
        F: FnMut() -> bool,
    {
        let mut iterations = 0;
        while !should_stop() {
            iterations += 1;
            match self.sync_tool_state() {
                Ok(reports) => {
                    let updated = reports
                        .iter()
                        .filter(|report| matches!(report.outcome, ToolSyncOutcome::Updated { .. }))
                        .count();
                    debug!(iteration = iterations, updated, "Sync iteration finished");
                }
                Err(BenchError::NoFocusedBench) => {
                    debug!(iteration = iterations, "No focused bench; nothing to sync");
                }
                Err(err) => warn!(iteration = iterations, error = %err, "Sync iteration failed"),
            }
            std::thread::sleep(interval);
        }
        iterations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AssembledTool, Bay, ToolKind};
    use crate::wm::SCRATCHPAD_WORKSPACE;

    fn window(id: &str, workspace: &str) -> WindowInfo {
        WindowInfo {
            id: id.to_string(),
            app_id: Some("kitty".to_string()),
            class: None,
            title: None,
            workspace: Some(workspace.to_string()),
        }
    }

    fn tracked(name: &str, window_id: &str) -> (String, Tool) {
        let mut tool = Tool::craft(ToolKind::Terminal, name);
        tool.assembled = Some(AssembledTool::new(window_id.to_string()));
        (name.to_string(), tool)
    }

    fn bench() -> Bench {
        let mut bench = Bench::new("work");
        bench.bays.push(Bay::with_tools("1: Web", &["web"]));
        let mut code = Bay::with_tools("2: Code", &["term"]);
        code.window_title = "2: Code (work)".to_string();
        bench.bays.push(code);
        bench
    }

    #[test]
    fn windows_on_bay_workspaces_are_adopted() {
        let tools = BTreeMap::from([tracked("term", "20")]);
        let current = vec![window("20", "2: Code (work)"), window("30", "1: Web"), window("40", "9")];

        let layout = compute_layout(&bench(), &tools, None, &current, &HashSet::new());
        assert_eq!(layout.windows("2: Code"), &["20".to_string()]);
        assert_eq!(layout.windows("1: Web"), &["30".to_string()]);
        assert_eq!(layout.bay_of("40"), None);
    }

    #[test]
    fn known_windows_elsewhere_keep_their_bay() {
        let tools = BTreeMap::from([tracked("web", "10"), tracked("term", "20")]);
        let mut previous = AssembledBench::new("work");
        previous.place("2: Code", "10");
        let current = vec![window("10", "7"), window("20", SCRATCHPAD_WORKSPACE)];

        let layout = compute_layout(&bench(), &tools, Some(&previous), &current, &HashSet::new());
        assert_eq!(layout.bay_of("10"), Some("2: Code"));
        assert_eq!(layout.bay_of("20"), Some("2: Code"));
    }

    #[test]
    fn windows_of_other_benches_are_not_adopted() {
        let tools = BTreeMap::from([tracked("term", "20")]);
        let current = vec![
            window("20", "1: Web"),
            window("50", "1: Web"),
            window("60", "1: Web"),
        ];
        let claimed = HashSet::from(["20".to_string(), "50".to_string()]);

        let layout = compute_layout(&bench(), &tools, None, &current, &claimed);
        // 20 is tracked by our own tool, so the claim does not apply.
        assert_eq!(layout.windows("1: Web"), &["20".to_string(), "60".to_string()]);
        assert_eq!(layout.bay_of("50"), None);
    }

    #[test]
    fn dead_windows_drop_out() {
        let mut previous = AssembledBench::new("work");
        previous.place("1: Web", "10");
        previous.place("1: Web", "11");
        let current = vec![window("11", "1: Web")];

        let layout = compute_layout(&bench(), &BTreeMap::new(), Some(&previous), &current, &HashSet::new());
        let diff = LayoutDiff::between(Some(&previous), &layout);
        assert_eq!(layout.all_windows(), vec!["11".to_string()]);
        assert_eq!(diff.removed, vec![("1: Web".to_string(), "10".to_string())]);
        assert!(diff.added.is_empty());
    }

    #[test]
    fn diff_reports_moves_as_remove_and_add() {
        let mut previous = AssembledBench::new("work");
        previous.place("1: Web", "10");
        let mut current = AssembledBench::new("work");
        current.place("2: Code", "10");

        let diff = LayoutDiff::between(Some(&previous), &current);
        assert_eq!(diff.added, vec![("2: Code".to_string(), "10".to_string())]);
        assert_eq!(diff.removed, vec![("1: Web".to_string(), "10".to_string())]);
        assert!(LayoutDiff::between(Some(&current), &current).is_empty());
    }
}
