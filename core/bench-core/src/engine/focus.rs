use std::collections::{BTreeMap, HashSet};
use std::fmt;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::{status_for, BenchEngine, ToolStatus};
use crate::error::Result;
use crate::model::{AssembledBench, Bay, Bench, Tool};
use crate::wm::{live_window_ids, windows, workspace_names, WindowInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPhase {
    Idle,
    Stowing,
    Assembling,
    Restoring,
    Focused,
}

impl fmt::Display for FocusPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FocusPhase::Idle => "idle",
            FocusPhase::Stowing => "stowing",
            FocusPhase::Assembling => "assembling",
            FocusPhase::Restoring => "restoring",
            FocusPhase::Focused => "focused",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusMode {
    /// Move the previously focused bench's windows to the scratchpad.
    #[default]
    Stow,
    /// Leave other windows where they are.
    NoStow,
}

#[derive(Debug, Clone)]
pub struct FocusReport {
    pub bench: String,
    pub phase: FocusPhase,
    /// The bench that lost focus, if any.
    pub previous: Option<String>,
    pub stowed_windows: Vec<String>,
    pub tools: Vec<ToolStatus>,
    pub snapshot: AssembledBench,
}

impl FocusReport {
    pub fn launched(&self) -> usize {
        self.tools.iter().filter(|tool| tool.launched).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StowReport {
    pub bench: String,
    pub stowed_windows: Vec<String>,
}

/// What a focus would do, computed without side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusPlan {
    pub bench: String,
    /// `(tool, window id)` pairs that would be reused.
    pub reuse: Vec<(String, String)>,
    /// Tools that would be launched.
    pub launch: Vec<String>,
    pub previous: Option<String>,
    pub stow: Vec<WindowInfo>,
    /// Windows each bay would hold afterwards.
    pub placement: BTreeMap<String, usize>,
}

impl BenchEngine {
    /// Makes `name` the visible bench.
    ///
    /// Runs Idle → Stowing → Assembling → Restoring → Focused. A failure
    /// stops the sequence where it is; tools launched before the failure stay
    /// tracked, so running focus again picks up from there.
    pub fn focus(&self, name: &str, mode: FocusMode) -> Result<FocusReport> {
        let mut phase = FocusPhase::Idle;

        let mut bench = self.store.load_bench(name)?;
        let mut tools = self.load_bench_tools(&bench)?;
        let previous = self
            .focused_bench_name()?
            .filter(|previous| previous != name);

        let mut stowed_windows = Vec::new();
        if let Some(previous) = &previous {
            enter(&mut phase, FocusPhase::Stowing, name);
            stowed_windows = self.leave_bench(previous, mode)?;
        }

        enter(&mut phase, FocusPhase::Assembling, name);
        let (statuses, snapshot) = self.assemble(&bench, &mut tools)?;

        enter(&mut phase, FocusPhase::Restoring, name);
        self.restore(&bench, &snapshot)?;

        let now = Utc::now();
        bench.focused = true;
        bench.last_focused_at = Some(now);
        self.store.save_bench(&bench)?;
        let mut snapshot = snapshot;
        snapshot.captured_at = Some(now);
        self.store.save_assembled(&snapshot)?;
        self.store.write_focused_marker(name)?;
        self.clear_other_focus_flags(name)?;
        enter(&mut phase, FocusPhase::Focused, name);

        let current = windows(&self.wm.tree()?);
        let tools = statuses
            .into_iter()
            .map(|status| {
                let workspace = status.window_id.as_ref().and_then(|id| {
                    current
                        .iter()
                        .find(|window| &window.id == id)
                        .and_then(|window| window.workspace.clone())
                });
                ToolStatus { workspace, ..status }
            })
            .collect();

        Ok(FocusReport {
            bench: name.to_string(),
            phase,
            previous,
            stowed_windows,
            tools,
            snapshot,
        })
    }

    /// Launches or reuses every tool of the bench and records the result,
    /// without stowing anything or changing focus.
    pub fn assemble_bench(&self, name: &str) -> Result<Vec<ToolStatus>> {
        let bench = self.store.load_bench(name)?;
        let mut tools = self.load_bench_tools(&bench)?;
        let (statuses, mut snapshot) = self.assemble(&bench, &mut tools)?;
        snapshot.captured_at = Some(Utc::now());
        self.store.save_assembled(&snapshot)?;
        Ok(statuses)
    }

    /// Hides every live window of the bench and drops its focus.
    pub fn stow_bench(&self, name: &str) -> Result<StowReport> {
        let mut bench = self.store.load_bench(name)?;
        let stowed_windows = self.stow_windows(&bench)?;
        if bench.focused {
            bench.focused = false;
            self.store.save_bench(&bench)?;
        }
        if self.store.read_focused_marker()?.as_deref() == Some(name) {
            self.store.clear_focused_marker()?;
        }
        info!(bench = %name, windows = stowed_windows.len(), "Stowed bench");
        Ok(StowReport {
            bench: name.to_string(),
            stowed_windows,
        })
    }

    pub fn focus_plan(&self, name: &str, mode: FocusMode) -> Result<FocusPlan> {
        let bench = self.store.load_bench(name)?;
        let tools = self.load_bench_tools(&bench)?;
        let current = windows(&self.wm.tree()?);
        let live: HashSet<&str> = current.iter().map(|window| window.id.as_str()).collect();

        let mut reuse = Vec::new();
        let mut launch = Vec::new();
        for tool_name in bench.tool_names() {
            match tools.get(tool_name).and_then(Tool::window_id) {
                Some(id) if live.contains(id) => reuse.push((tool_name.to_string(), id.to_string())),
                _ => launch.push(tool_name.to_string()),
            }
        }

        let previous = self.focused_bench_name()?.filter(|previous| previous != name);
        let mut stow = Vec::new();
        if let (Some(previous), FocusMode::Stow) = (&previous, mode) {
            if let Ok(previous_bench) = self.store.load_bench(previous) {
                let ids = self.bench_window_ids(&previous_bench)?;
                stow = current
                    .iter()
                    .filter(|window| ids.contains(&window.id) && !window.is_stowed())
                    .cloned()
                    .collect();
            }
        }

        let snapshot = self.store.load_assembled(name)?;
        let mut placement = BTreeMap::new();
        for bay in &bench.bays {
            let saved = snapshot
                .as_ref()
                .map(|snapshot| {
                    snapshot
                        .windows(&bay.name)
                        .iter()
                        .filter(|id| live.contains(id.as_str()))
                        .count()
                })
                .unwrap_or(0);
            let launching = bay
                .tool_names
                .iter()
                .filter(|tool| launch.contains(tool))
                .count();
            placement.insert(bay.name.clone(), saved + launching);
        }

        Ok(FocusPlan {
            bench: name.to_string(),
            reuse,
            launch,
            previous,
            stow,
            placement,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Stages
    // ─────────────────────────────────────────────────────────────────────────────

    /// Saves the layout of the bench losing focus, hides its windows (unless
    /// `mode` says not to) and clears its focused flag.
    fn leave_bench(&self, previous: &str, mode: FocusMode) -> Result<Vec<String>> {
        let mut bench = match self.store.load_bench(previous) {
            Ok(bench) => bench,
            Err(err) if err.is_not_found() => {
                warn!(bench = %previous, "Previously focused bench no longer exists");
                return Ok(Vec::new());
            }
            Err(err) => return Err(err),
        };

        let mut stowed = Vec::new();
        if mode == FocusMode::Stow {
            self.capture_layout(&bench)?;
            stowed = self.stow_windows(&bench)?;
        }
        bench.focused = false;
        self.store.save_bench(&bench)?;
        info!(bench = %previous, windows = stowed.len(), "Left bench");
        Ok(stowed)
    }

    fn stow_windows(&self, bench: &Bench) -> Result<Vec<String>> {
        let ids = self.bench_window_ids(bench)?;
        let current = windows(&self.wm.tree()?);
        let mut stowed = Vec::new();
        for window in current
            .iter()
            .filter(|window| ids.contains(&window.id) && !window.is_stowed())
        {
            self.wm.move_to_scratchpad(&window.id)?;
            stowed.push(window.id.clone());
        }
        debug!(bench = %bench.name, windows = ?stowed, "Moved windows to scratchpad");
        Ok(stowed)
    }

    /// Tracked tool windows plus everything in the saved snapshot.
    fn bench_window_ids(&self, bench: &Bench) -> Result<HashSet<String>> {
        let mut ids: HashSet<String> = self
            .load_bench_tools_lenient(bench)?
            .values()
            .filter_map(|tool| tool.window_id().map(str::to_string))
            .collect();
        if let Some(snapshot) = self.store.load_assembled(&bench.name)? {
            ids.extend(snapshot.all_windows());
        }
        Ok(ids)
    }

    /// Ensures every tool has a live window, then merges the result into the
    /// saved snapshot: dead windows, undeclared bays and windows held by
    /// other benches are dropped, windows already placed keep their bay, new
    /// ones go to their declared bay.
    fn assemble(
        &self,
        bench: &Bench,
        tools: &mut BTreeMap<String, Tool>,
    ) -> Result<(Vec<ToolStatus>, AssembledBench)> {
        let mut live = live_window_ids(&self.wm.tree()?);
        let mut statuses = Vec::new();
        let mut placements = Vec::new();
        let mut seen = HashSet::new();

        for bay in &bench.bays {
            for tool_name in &bay.tool_names {
                if !seen.insert(tool_name.as_str()) {
                    continue;
                }
                let Some(tool) = tools.get_mut(tool_name) else {
                    continue;
                };
                let (window_id, launched) = self
                    .ensure_assembled(tool, &mut live)
                    .map_err(|err| err.in_assembly(&bench.name, &bay.name, tool_name))?;
                debug!(
                    bench = %bench.name,
                    bay = %bay.name,
                    tool = %tool_name,
                    window_id = %window_id,
                    launched,
                    "Tool assembled"
                );

                placements.push((bay.name.clone(), window_id.clone()));
                let mut status = status_for(tool, Some(bay.name.as_str()), &[]);
                status.live = true;
                status.launched = launched;
                statuses.push(status);
            }
        }

        let mut snapshot = self
            .store
            .load_assembled(&bench.name)?
            .unwrap_or_else(|| AssembledBench::new(&bench.name));
        snapshot.bench = bench.name.clone();
        snapshot.retain_bays(bench);
        let dropped = snapshot.retain_live(|id| live.contains(id));
        if !dropped.is_empty() {
            debug!(bench = %bench.name, windows = ?dropped, "Dropped dead windows from snapshot");
        }
        let claimed = self.windows_claimed_elsewhere(bench)?;
        let own: HashSet<&str> = placements.iter().map(|(_, id)| id.as_str()).collect();
        let foreign = snapshot.retain_live(|id| own.contains(id) || !claimed.contains(id));
        if !foreign.is_empty() {
            debug!(bench = %bench.name, windows = ?foreign, "Dropped other benches' windows from snapshot");
        }
        for (bay, window_id) in &placements {
            snapshot.place(bay, window_id);
        }
        Ok((statuses, snapshot))
    }

    /// Moves every snapshot window onto its bay's workspace, names the
    /// workspace after the bay and applies the bay layout.
    fn restore(&self, bench: &Bench, snapshot: &AssembledBench) -> Result<()> {
        let existing = workspace_names(&self.wm.tree()?);
        let mut first_workspace = None;

        for bay in &bench.bays {
            let window_ids = snapshot.windows(&bay.name);
            if window_ids.is_empty() {
                continue;
            }
            let target = restore_target(bay, &existing);
            for window_id in window_ids {
                self.wm.move_to_workspace(window_id, target)?;
                self.wm.apply_layout(window_id, bay.layout)?;
            }
            if target != bay.title() {
                self.wm.rename_workspace(target, bay.title())?;
            }
            first_workspace.get_or_insert(bay.title());
        }

        if let Some(workspace) = first_workspace {
            self.wm.focus_workspace(workspace)?;
        }
        Ok(())
    }

    fn clear_other_focus_flags(&self, focused: &str) -> Result<()> {
        for mut bench in self.store.list_benches()? {
            if bench.focused && bench.name != focused {
                bench.focused = false;
                self.store.save_bench(&bench)?;
            }
        }
        Ok(())
    }
}

/// A bay's workspace keeps its title once renamed, so move windows there
/// directly when it already exists.
fn restore_target<'a>(bay: &'a Bay, existing: &[String]) -> &'a str {
    if existing.iter().any(|name| name == bay.title()) {
        bay.title()
    } else {
        bay.workspace()
    }
}

fn enter(phase: &mut FocusPhase, next: FocusPhase, bench: &str) {
    debug!(bench, from = %phase, to = %next, "Focus phase");
    *phase = next;
    if next == FocusPhase::Focused {
        info!(bench, "Bench focused");
    }
}
