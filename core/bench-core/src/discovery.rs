//! Correlating a launch with the window it produced.
//!
//! A spawned process never reports its window id, so discovery compares the
//! matching windows before and after the launch. Exactly one new window is
//! the only acceptable answer. Two tools of the same kind launched at once
//! cannot be told apart, which is why the engine launches one tool at a time.

use bench_protocol::TabReport;
use tracing::{debug, info, warn};

use crate::error::{BenchError, Result};
use crate::model::{Tool, ToolKind};
use crate::poll::{poll_until, PollConfig};
use crate::tabsync::TabSource;
use crate::tools::{LaunchResult, ToolRegistry};
use crate::wm::{find_window_ids, WindowManager, WindowMatcher};

/// Ids in `after` that are not in `before`, in `after`'s order.
pub fn new_window_ids(before: &[String], after: &[String]) -> Vec<String> {
    after
        .iter()
        .filter(|id| !before.contains(id))
        .cloned()
        .collect()
}

/// Turns a before/after difference into the tool's window id.
pub fn classify(tool: &str, diff: Vec<String>, waited_ms: u64) -> Result<String> {
    let mut diff = diff;
    match diff.len() {
        0 => Err(BenchError::NoNewWindow {
            tool: tool.to_string(),
            waited_ms,
        }),
        1 => Ok(diff.remove(0)),
        _ => Err(BenchError::AmbiguousWindow {
            tool: tool.to_string(),
            window_ids: diff,
        }),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovered {
    pub window_id: String,
    pub browser_window_id: Option<String>,
    pub launch: LaunchResult,
}

pub struct WindowDiscovery<'a> {
    wm: &'a dyn WindowManager,
    registry: &'a ToolRegistry,
    tabs: Option<&'a dyn TabSource>,
    poll: PollConfig,
}

impl<'a> WindowDiscovery<'a> {
    pub fn new(
        wm: &'a dyn WindowManager,
        registry: &'a ToolRegistry,
        tabs: Option<&'a dyn TabSource>,
        poll: PollConfig,
    ) -> Self {
        Self {
            wm,
            registry,
            tabs,
            poll,
        }
    }

    /// Launches `tool` and waits for its single new window.
    pub fn launch_and_discover(&self, tool: &Tool) -> Result<Discovered> {
        let matcher = self.registry.matcher(tool.kind())?;
        let before = self.matching_ids(&matcher)?;
        let tabs_before = self.browser_tabs(tool.kind());

        let launch = self.registry.launch(tool)?;

        let outcome = poll_until(self.poll, || {
            let after = self.matching_ids(&matcher)?;
            let diff = new_window_ids(&before, &after);
            Ok((!diff.is_empty()).then_some(diff))
        })?;
        let diff = outcome.ready().unwrap_or_default();
        debug!(tool = %tool.name, before = ?before, diff = ?diff, "Window discovery finished");
        let window_id = classify(&tool.name, diff, self.poll.timeout_ms())?;

        // Without a baseline there is nothing to diff against; a second wait
        // would only repeat the timeout.
        let browser_window_id = match tabs_before {
            Some(before) => self
                .browser_tabs(tool.kind())
                .and_then(|after| new_browser_window(&tool.name, &before, &after)),
            None => None,
        };

        info!(
            tool = %tool.name,
            window_id = %window_id,
            browser_window_id = browser_window_id.as_deref().unwrap_or("-"),
            "Discovered tool window"
        );
        Ok(Discovered {
            window_id,
            browser_window_id,
            launch,
        })
    }

    fn matching_ids(&self, matcher: &WindowMatcher) -> Result<Vec<String>> {
        Ok(find_window_ids(&self.wm.tree()?, matcher))
    }

    fn browser_tabs(&self, kind: ToolKind) -> Option<TabReport> {
        if kind != ToolKind::Browser {
            return None;
        }
        match self.tabs?.fresh_tabs() {
            Ok(report) => Some(report),
            Err(err) => {
                warn!(error = %err, "Launching browser without tab data");
                None
            }
        }
    }
}

fn new_browser_window(tool: &str, before: &TabReport, after: &TabReport) -> Option<String> {
    let diff = new_window_ids(&before.window_ids(), &after.window_ids());
    match classify(tool, diff, 0) {
        Ok(id) => Some(id),
        Err(err) => {
            warn!(tool, error = %err, "Could not identify the browser's own window id");
            None
        }
    }
}
