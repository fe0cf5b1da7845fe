//! Window-manager surface: tree queries and placement commands.
//!
//! The [`WindowManager`] trait is the only way the rest of the crate touches
//! the compositor. Commands are fire-and-forget; anything whose correctness
//! depends on a command having landed must re-query the tree.

mod sway;

use std::collections::HashSet;

use regex::Regex;
use serde::Deserialize;

use crate::error::{BenchError, Result};
use crate::model::BayLayout;

pub use sway::SwayMsgAdapter;

/// Name of the workspace hidden windows live on.
pub const SCRATCHPAD_WORKSPACE: &str = "__i3_scratch";

pub trait WindowManager: Send + Sync {
    /// Full layout tree, freshly queried.
    fn tree(&self) -> Result<TreeNode>;

    fn move_to_workspace(&self, window_id: &str, workspace: &str) -> Result<()>;

    fn move_to_scratchpad(&self, window_id: &str) -> Result<()>;

    fn rename_workspace(&self, old: &str, new: &str) -> Result<()>;

    fn focus_workspace(&self, workspace: &str) -> Result<()>;

    fn apply_layout(&self, window_id: &str, layout: BayLayout) -> Result<()>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tree
// ═══════════════════════════════════════════════════════════════════════════════

/// One node of the `get_tree` reply. Only the fields placement needs are
/// decoded; everything else is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TreeNode {
    pub id: i64,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub node_type: Option<String>,
    pub app_id: Option<String>,
    pub window_properties: Option<WindowProperties>,
    pub nodes: Vec<TreeNode>,
    pub floating_nodes: Vec<TreeNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WindowProperties {
    pub class: Option<String>,
    pub title: Option<String>,
}

impl TreeNode {
    pub fn is_workspace(&self) -> bool {
        self.node_type.as_deref() == Some("workspace")
    }

    /// Windows carry an application identity; containers do not.
    pub fn is_window(&self) -> bool {
        self.app_id.is_some() || self.window_properties.is_some()
    }

    pub fn class(&self) -> Option<&str> {
        self.window_properties.as_ref()?.class.as_deref()
    }

    /// Children in traversal order: tiled first, then floating.
    pub fn children(&self) -> impl Iterator<Item = &TreeNode> {
        self.nodes.iter().chain(self.floating_nodes.iter())
    }
}

/// A window found in the tree, with the workspace it sits on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowInfo {
    pub id: String,
    pub app_id: Option<String>,
    pub class: Option<String>,
    pub title: Option<String>,
    pub workspace: Option<String>,
}

impl WindowInfo {
    pub fn is_stowed(&self) -> bool {
        self.workspace.as_deref().is_some_and(is_stowed_workspace)
    }
}

/// Whether a workspace only holds windows that are out of the way.
pub fn is_stowed_workspace(workspace: &str) -> bool {
    workspace == SCRATCHPAD_WORKSPACE || workspace == "temp"
}

/// Every window in depth-first order.
pub fn windows(tree: &TreeNode) -> Vec<WindowInfo> {
    let mut out = Vec::new();
    collect_windows(tree, None, &mut out);
    out
}

fn collect_windows(node: &TreeNode, workspace: Option<&str>, out: &mut Vec<WindowInfo>) {
    let workspace = if node.is_workspace() {
        node.name.as_deref()
    } else {
        workspace
    };

    if node.is_window() {
        out.push(WindowInfo {
            id: node.id.to_string(),
            app_id: node.app_id.clone(),
            class: node.class().map(str::to_string),
            title: node.name.clone(),
            workspace: workspace.map(str::to_string),
        });
    }
    for child in node.children() {
        collect_windows(child, workspace, out);
    }
}

pub fn live_window_ids(tree: &TreeNode) -> HashSet<String> {
    windows(tree).into_iter().map(|window| window.id).collect()
}

pub fn workspace_names(tree: &TreeNode) -> Vec<String> {
    let mut names = Vec::new();
    collect_workspaces(tree, &mut names);
    names
}

fn collect_workspaces(node: &TreeNode, out: &mut Vec<String>) {
    if node.is_workspace() {
        if let Some(name) = &node.name {
            out.push(name.clone());
        }
    }
    for child in node.children() {
        collect_workspaces(child, out);
    }
}

/// Ids of windows `matcher` accepts, deduplicated, in traversal order.
pub fn find_window_ids(tree: &TreeNode, matcher: &WindowMatcher) -> Vec<String> {
    let mut seen = HashSet::new();
    windows(tree)
        .into_iter()
        .filter(|window| matcher.matches(window))
        .filter(|window| seen.insert(window.id.clone()))
        .map(|window| window.id)
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Matching
// ═══════════════════════════════════════════════════════════════════════════════

/// Matches windows by application identity (Wayland app_id or X11 class).
#[derive(Debug, Clone)]
pub struct WindowMatcher {
    patterns: Vec<Regex>,
}

impl WindowMatcher {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern.as_ref()).map_err(|source| BenchError::Pattern {
                    pattern: pattern.as_ref().to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn matches(&self, window: &WindowInfo) -> bool {
        [window.app_id.as_deref(), window.class.as_deref()]
            .into_iter()
            .flatten()
            .any(|identity| self.patterns.iter().any(|pattern| pattern.is_match(identity)))
    }
}

#[cfg(test)]
pub(crate) mod tree_builder {
    use super::*;

    pub fn root(workspaces: Vec<TreeNode>) -> TreeNode {
        TreeNode {
            id: 1,
            name: Some("root".to_string()),
            node_type: Some("root".to_string()),
            nodes: vec![TreeNode {
                id: 2,
                name: Some("eDP-1".to_string()),
                node_type: Some("output".to_string()),
                nodes: workspaces,
                ..TreeNode::default()
            }],
            ..TreeNode::default()
        }
    }

    pub fn workspace(id: i64, name: &str, windows: Vec<TreeNode>) -> TreeNode {
        TreeNode {
            id,
            name: Some(name.to_string()),
            node_type: Some("workspace".to_string()),
            nodes: windows,
            ..TreeNode::default()
        }
    }

    pub fn wayland(id: i64, app_id: &str) -> TreeNode {
        TreeNode {
            id,
            name: Some(format!("{} window", app_id)),
            node_type: Some("con".to_string()),
            app_id: Some(app_id.to_string()),
            ..TreeNode::default()
        }
    }

    pub fn x11(id: i64, class: &str) -> TreeNode {
        TreeNode {
            id,
            name: Some(format!("{} window", class)),
            node_type: Some("con".to_string()),
            window_properties: Some(WindowProperties {
                class: Some(class.to_string()),
                title: None,
            }),
            ..TreeNode::default()
        }
    }
}
