//! Tool launcher registry.
//!
//! Tool kinds form a closed set, so dispatch is an exhaustive match on
//! [`DeclaredState`] rather than a trait object per kind. Each kind module
//! owns its declared state, its launch arguments and its default window
//! patterns; this module owns process spawning and state sync.

pub mod browser;
pub mod note;
pub mod terminal;

use std::collections::HashSet;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;

use bench_protocol::TabReport;
use tracing::{debug, info, warn};

use crate::config::{AppConfig, AppsConfig};
use crate::error::{BenchError, Result};
use crate::model::{DeclaredState, Tool, ToolKind};
use crate::tabsync::TabSource;
use crate::wm::WindowMatcher;

/// A fully resolved process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchResult {
    pub program: String,
    pub pid: u32,
}

/// Starts external processes. Spawning returns as soon as the process
/// exists; its window shows up later, if at all.
pub trait ProcessSpawner: Send + Sync {
    fn spawn(&self, spec: &LaunchSpec) -> std::io::Result<u32>;
}

#[derive(Debug, Clone, Default)]
pub struct CommandSpawner;

impl ProcessSpawner for CommandSpawner {
    fn spawn(&self, spec: &LaunchSpec) -> std::io::Result<u32> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(cwd) = spec.cwd.as_ref().filter(|dir| dir.is_dir()) {
            command.current_dir(cwd);
        }

        let mut child = command.spawn()?;
        let pid = child.id();
        // Reap in the background so a long-running daemon does not collect zombies.
        std::thread::spawn(move || {
            let _ = child.wait();
        });
        Ok(pid)
    }
}

/// Result of asking a tool for its current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// New declared urls for a browser tool.
    Patched(Vec<String>),
    /// The browser's window id was unknown and has been matched in the
    /// report; carries the id to record along with its urls.
    Relinked {
        browser_window_id: String,
        urls: Vec<String>,
    },
    /// The state could not be observed this time; keep what is declared.
    Unknown,
    /// This kind has nothing to sync.
    Unsupported,
}

/// Tab data fetched lazily, at most once per operation.
pub struct TabSnapshot<'a> {
    source: Option<&'a dyn TabSource>,
    fetched: Option<Option<TabReport>>,
    linked: HashSet<String>,
}

impl<'a> TabSnapshot<'a> {
    pub fn new(source: Option<&'a dyn TabSource>) -> Self {
        Self {
            source,
            fetched: None,
            linked: HashSet::new(),
        }
    }

    /// Browser window ids that already belong to a tool.
    pub fn with_linked(mut self, ids: impl IntoIterator<Item = String>) -> Self {
        self.linked.extend(ids);
        self
    }

    /// The fresh report, or `None` when the companion did not answer.
    pub fn report(&mut self) -> Option<&TabReport> {
        let source = self.source;
        self.fetched
            .get_or_insert_with(|| match source?.fresh_tabs() {
                Ok(report) => Some(report),
                Err(err) => {
                    warn!(error = %err, "No tab data; browser state is unknown");
                    None
                }
            })
            .as_ref()
    }

    /// Claims the one unlinked reported window showing `declared`.
    fn relink(&mut self, declared: &[String]) -> Option<(String, Vec<String>)> {
        self.report()?;
        let report = self.fetched.as_ref()?.as_ref()?;
        let browser_window_id = browser::match_reported_window(declared, report, &self.linked)?;
        let urls = report.urls(&browser_window_id)?.to_vec();
        self.linked.insert(browser_window_id.clone());
        Some((browser_window_id, urls))
    }
}

pub struct ToolRegistry {
    apps: AppsConfig,
    spawner: Arc<dyn ProcessSpawner>,
}

impl ToolRegistry {
    pub fn new(apps: AppsConfig, spawner: Arc<dyn ProcessSpawner>) -> Self {
        Self { apps, spawner }
    }

    fn app(&self, kind: ToolKind) -> &AppConfig {
        match kind {
            ToolKind::Browser => &self.apps.browser,
            ToolKind::Terminal => &self.apps.terminal,
            ToolKind::Note => &self.apps.note,
        }
    }

    /// Matcher for windows a tool of `kind` can own.
    pub fn matcher(&self, kind: ToolKind) -> Result<WindowMatcher> {
        if let Some(patterns) = &self.app(kind).window_patterns {
            return WindowMatcher::new(patterns);
        }
        match kind {
            ToolKind::Browser => WindowMatcher::new(browser::DEFAULT_PATTERNS),
            ToolKind::Terminal => WindowMatcher::new(terminal::DEFAULT_PATTERNS),
            ToolKind::Note => WindowMatcher::new(note::DEFAULT_PATTERNS),
        }
    }

    pub fn launch_spec(&self, tool: &Tool) -> LaunchSpec {
        let app = self.app(tool.kind());
        match &tool.state {
            DeclaredState::Browser(state) => browser::launch_spec(state, app),
            DeclaredState::Terminal(state) => terminal::launch_spec(state, app),
            DeclaredState::Note(state) => note::launch_spec(state, app),
        }
    }

    pub fn launch(&self, tool: &Tool) -> Result<LaunchResult> {
        let spec = self.launch_spec(tool);
        debug!(tool = %tool.name, program = %spec.program, args = ?spec.args, "Launching tool");

        let pid = self
            .spawner
            .spawn(&spec)
            .map_err(|source| BenchError::Launch {
                tool: tool.name.clone(),
                program: spec.program.clone(),
                source,
            })?;

        info!(tool = %tool.name, program = %spec.program, pid, "Launched tool");
        Ok(LaunchResult {
            program: spec.program,
            pid,
        })
    }

    /// Reads the live state of a tool's window.
    pub fn sync(&self, tool: &Tool, tabs: &mut TabSnapshot<'_>) -> SyncOutcome {
        match &tool.state {
            DeclaredState::Browser(state) => {
                let Some(assembled) = &tool.assembled else {
                    debug!(tool = %tool.name, "Browser not assembled; skipping tab sync");
                    return SyncOutcome::Unknown;
                };
                let Some(browser_window_id) = assembled.browser_window_id.as_deref() else {
                    // Launched while the tab-sync port was held elsewhere.
                    return match tabs.relink(&state.urls) {
                        Some((browser_window_id, urls)) => {
                            info!(tool = %tool.name, %browser_window_id, "Matched browser window by its urls");
                            SyncOutcome::Relinked {
                                browser_window_id,
                                urls,
                            }
                        }
                        None => {
                            debug!(tool = %tool.name, "Browser window id unknown; skipping tab sync");
                            SyncOutcome::Unknown
                        }
                    };
                };
                let Some(report) = tabs.report() else {
                    return SyncOutcome::Unknown;
                };
                match report.urls(browser_window_id) {
                    Some(urls) => SyncOutcome::Patched(urls.to_vec()),
                    None => {
                        debug!(
                            tool = %tool.name,
                            browser_window_id,
                            "Browser window missing from tab report"
                        );
                        SyncOutcome::Unknown
                    }
                }
            }
            DeclaredState::Terminal(_) | DeclaredState::Note(_) => SyncOutcome::Unsupported,
        }
    }
}
