//! Browser tools: one window opened on a list of urls.

use std::collections::HashSet;

use bench_protocol::TabReport;
use serde::{Deserialize, Serialize};

use super::LaunchSpec;
use crate::config::AppConfig;

pub const DEFAULT_PROGRAM: &str = "chromium";
pub const DEFAULT_PATTERNS: &[&str] = &["(?i)^chromium(-browser)?$"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserState {
    pub urls: Vec<String>,
}

pub(crate) fn launch_spec(state: &BrowserState, app: &AppConfig) -> LaunchSpec {
    let program = app
        .program
        .clone()
        .unwrap_or_else(|| DEFAULT_PROGRAM.to_string());
    let mut args = app
        .args
        .clone()
        .unwrap_or_else(|| vec!["--new-window".to_string()]);
    args.extend(state.urls.iter().cloned());

    LaunchSpec {
        program,
        args,
        cwd: None,
    }
}

/// Picks the reported window showing exactly `declared` (ignoring trailing
/// slashes), skipping ids in `linked`. `None` when no window or more than
/// one window qualifies.
pub(crate) fn match_reported_window(
    declared: &[String],
    report: &TabReport,
    linked: &HashSet<String>,
) -> Option<String> {
    if declared.is_empty() {
        return None;
    }
    let mut matches = report
        .windows()
        .iter()
        .filter(|(id, _)| !linked.contains(id.as_str()))
        .filter(|(_, urls)| same_urls(declared, urls))
        .map(|(id, _)| id.clone());
    let found = matches.next()?;
    matches.next().is_none().then_some(found)
}

fn same_urls(declared: &[String], reported: &[String]) -> bool {
    declared.len() == reported.len()
        && declared
            .iter()
            .zip(reported)
            .all(|(a, b)| a.trim_end_matches('/') == b.trim_end_matches('/'))
}
