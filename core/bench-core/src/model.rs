//! Bench, bay and tool records plus their assembled (runtime) state.
//!
//! Declared fields are user-authored YAML; `assembled` fields are observed at
//! runtime and may be stale at any moment. Only a fresh window-manager query
//! decides whether a tracked window still exists.
//!
//! Deserialization tolerates unknown fields so older or hand-edited files keep
//! loading.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tools::browser::BrowserState;
use crate::tools::note::NoteState;
use crate::tools::terminal::TerminalState;

// ═══════════════════════════════════════════════════════════════════════════════
// Bench & Bay
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bench {
    pub name: String,
    #[serde(default)]
    pub bays: Vec<Bay>,
    #[serde(default)]
    pub focused: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_focused_at: Option<DateTime<Utc>>,
}

impl Bench {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            bays: Vec::new(),
            focused: false,
            created_at: Some(Utc::now()),
            last_focused_at: None,
        }
    }

    pub fn bay(&self, name: &str) -> Option<&Bay> {
        self.bays.iter().find(|bay| bay.name == name)
    }

    pub fn bay_mut(&mut self, name: &str) -> Option<&mut Bay> {
        self.bays.iter_mut().find(|bay| bay.name == name)
    }

    /// Every tool referenced by the bench, first occurrence wins.
    pub fn tool_names(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.bays
            .iter()
            .flat_map(|bay| bay.tool_names.iter())
            .filter(|name| seen.insert(name.as_str()))
            .map(String::as_str)
            .collect()
    }

    /// The bay whose workspace name or title matches `workspace`.
    pub fn bay_for_workspace(&self, workspace: &str) -> Option<&Bay> {
        self.bays
            .iter()
            .find(|bay| bay.workspace() == workspace || bay.title() == workspace)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bay {
    pub name: String,
    #[serde(default)]
    pub window_title: String,
    #[serde(default)]
    pub key_shortcut: String,
    #[serde(default)]
    pub layout: BayLayout,
    #[serde(default, alias = "tools")]
    pub tool_names: Vec<String>,
}

impl Bay {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            window_title: String::new(),
            key_shortcut: String::new(),
            layout: BayLayout::default(),
            tool_names: Vec::new(),
        }
    }

    pub fn with_tools(name: &str, tools: &[&str]) -> Self {
        Self {
            tool_names: tools.iter().map(|tool| tool.to_string()).collect(),
            ..Self::new(name)
        }
    }

    /// Workspace that windows of this bay are moved to.
    pub fn workspace(&self) -> &str {
        &self.name
    }

    /// Name the workspace carries once the bay is restored.
    pub fn title(&self) -> &str {
        if self.window_title.trim().is_empty() {
            &self.name
        } else {
            &self.window_title
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BayLayout {
    Stacking,
    #[default]
    Tabbed,
    Floating,
}

impl BayLayout {
    pub fn as_str(&self) -> &'static str {
        match self {
            BayLayout::Stacking => "stacking",
            BayLayout::Tabbed => "tabbed",
            BayLayout::Floating => "floating",
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tool
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    Browser,
    Terminal,
    Note,
}

impl ToolKind {
    pub const ALL: [ToolKind; 3] = [ToolKind::Browser, ToolKind::Terminal, ToolKind::Note];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::Browser => "browser",
            ToolKind::Terminal => "terminal",
            ToolKind::Note => "note",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolKind {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        ToolKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| format!("unknown tool kind: {}", value))
    }
}

/// Kind-specific, user-authored configuration of a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DeclaredState {
    Browser(BrowserState),
    Terminal(TerminalState),
    Note(NoteState),
}

impl DeclaredState {
    /// The defaults a freshly crafted tool of `kind` starts with.
    pub fn default_for(kind: ToolKind) -> Self {
        match kind {
            ToolKind::Browser => DeclaredState::Browser(BrowserState::default()),
            ToolKind::Terminal => DeclaredState::Terminal(TerminalState::default()),
            ToolKind::Note => DeclaredState::Note(NoteState::default()),
        }
    }

    pub fn kind(&self) -> ToolKind {
        match self {
            DeclaredState::Browser(_) => ToolKind::Browser,
            DeclaredState::Terminal(_) => ToolKind::Terminal,
            DeclaredState::Note(_) => ToolKind::Note,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    pub state: DeclaredState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assembled: Option<AssembledTool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Tool {
    pub fn craft(kind: ToolKind, name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: DeclaredState::default_for(kind),
            assembled: None,
            created_at: Some(Utc::now()),
        }
    }

    pub fn kind(&self) -> ToolKind {
        self.state.kind()
    }

    pub fn window_id(&self) -> Option<&str> {
        self.assembled.as_ref().map(|a| a.window_id.as_str())
    }
}

/// Runtime record of the window a tool was last assembled into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssembledTool {
    /// Window-manager container id.
    pub window_id: String,
    /// The browser's own id for the window, as reported by the companion
    /// extension. Only browsers have one, and only when the extension was
    /// connected at launch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser_window_id: Option<String>,
    #[serde(default = "Utc::now")]
    pub last_assembled_at: DateTime<Utc>,
}

impl AssembledTool {
    pub fn new(window_id: String) -> Self {
        Self {
            window_id,
            browser_window_id: None,
            last_assembled_at: Utc::now(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Assembled Bench
// ═══════════════════════════════════════════════════════════════════════════════

/// Which live windows belong to which bay of a bench.
///
/// Allowed to go stale; always revalidate against a tree query before
/// trusting it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssembledBench {
    #[serde(default)]
    pub bench: String,
    #[serde(default)]
    pub bay_windows: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<DateTime<Utc>>,
}

impl AssembledBench {
    pub fn new(bench: &str) -> Self {
        Self {
            bench: bench.to_string(),
            ..Self::default()
        }
    }

    pub fn windows(&self, bay: &str) -> &[String] {
        self.bay_windows
            .get(bay)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn bay_of(&self, window_id: &str) -> Option<&str> {
        self.bay_windows
            .iter()
            .find(|(_, ids)| ids.iter().any(|id| id == window_id))
            .map(|(bay, _)| bay.as_str())
    }

    pub fn all_windows(&self) -> Vec<String> {
        self.bay_windows.values().flatten().cloned().collect()
    }

    /// Adds `window_id` to `bay` unless the window is already placed anywhere.
    pub fn place(&mut self, bay: &str, window_id: &str) -> bool {
        if self.bay_of(window_id).is_some() {
            return false;
        }
        self.bay_windows
            .entry(bay.to_string())
            .or_default()
            .push(window_id.to_string());
        true
    }

    /// Drops every window `is_live` rejects; returns the dropped ids.
    pub fn retain_live<F>(&mut self, mut is_live: F) -> Vec<String>
    where
        F: FnMut(&str) -> bool,
    {
        let mut dropped = Vec::new();
        for ids in self.bay_windows.values_mut() {
            ids.retain(|id| {
                let keep = is_live(id);
                if !keep {
                    dropped.push(id.clone());
                }
                keep
            });
        }
        dropped
    }

    /// Drops bays the bench no longer declares.
    pub fn retain_bays(&mut self, bench: &Bench) {
        self.bay_windows
            .retain(|bay, _| bench.bays.iter().any(|declared| &declared.name == bay));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bench_yaml_tolerates_unknown_and_missing_fields() {
        let yaml = r#"
name: home
legacy_field: true
bays:
  - name: "1: Home"
    tools: [home-browser]
    color: blue
  - name: "2: Code"
    window_title: "2: Code"
    key_shortcut: "2"
    layout: stacking
    tool_names: [code-term]
"#;
        let bench: Bench = serde_yaml::from_str(yaml).expect("parse bench");
        assert_eq!(bench.name, "home");
        assert!(!bench.focused);
        assert_eq!(bench.bays.len(), 2);
        assert_eq!(bench.bays[0].tool_names, vec!["home-browser".to_string()]);
        assert_eq!(bench.bays[0].layout, BayLayout::Tabbed);
        assert_eq!(bench.bays[1].layout, BayLayout::Stacking);
        assert_eq!(bench.bays[1].key_shortcut, "2");
    }

    #[test]
    fn tool_yaml_is_tagged_by_kind() {
        let yaml = r#"
name: home-browser
state:
  kind: browser
  urls: ["https://example.com"]
"#;
        let tool: Tool = serde_yaml::from_str(yaml).expect("parse tool");
        assert_eq!(tool.kind(), ToolKind::Browser);
        match &tool.state {
            DeclaredState::Browser(state) => {
                assert_eq!(state.urls, vec!["https://example.com".to_string()])
            }
            other => panic!("expected browser state, got {:?}", other),
        }
        assert!(tool.assembled.is_none());
    }

    #[test]
    fn tool_kind_without_payload_uses_defaults() {
        let tool: Tool = serde_yaml::from_str("name: t\nstate:\n  kind: terminal\n").unwrap();
        assert_eq!(tool.state, DeclaredState::Terminal(TerminalState::default()));
    }

    #[test]
    fn tool_kind_parses_case_insensitively() {
        assert_eq!("Browser".parse::<ToolKind>(), Ok(ToolKind::Browser));
        assert_eq!("note".parse::<ToolKind>(), Ok(ToolKind::Note));
        assert!("zed".parse::<ToolKind>().is_err());
    }

    #[test]
    fn bench_tool_names_are_deduplicated_in_order() {
        let mut bench = Bench::new("work");
        bench.bays.push(Bay::with_tools("1", &["a", "b"]));
        bench.bays.push(Bay::with_tools("2", &["b", "c"]));
        assert_eq!(bench.tool_names(), vec!["a", "b", "c"]);
    }

    #[test]
    fn bay_title_falls_back_to_name() {
        let mut bay = Bay::new("1: Home");
        assert_eq!(bay.title(), "1: Home");
        bay.window_title = "1: Home (work)".to_string();
        assert_eq!(bay.title(), "1: Home (work)");
        assert_eq!(bay.workspace(), "1: Home");
    }

    #[test]
    fn assembled_bench_place_skips_windows_already_placed() {
        let mut assembled = AssembledBench::new("home");
        assert!(assembled.place("1", "10"));
        assert!(!assembled.place("2", "10"));
        assert!(assembled.place("2", "11"));
        assert_eq!(assembled.bay_of("10"), Some("1"));
        assert_eq!(assembled.windows("2"), &["11".to_string()]);
    }

    #[test]
    fn assembled_bench_retain_live_reports_dropped_ids() {
        let mut assembled = AssembledBench::new("home");
        assembled.place("1", "10");
        assembled.place("1", "11");
        assembled.place("2", "12");

        let dropped = assembled.retain_live(|id| id != "11");
        assert_eq!(dropped, vec!["11".to_string()]);
        assert_eq!(assembled.all_windows(), vec!["10".to_string(), "12".to_string()]);
    }
}
