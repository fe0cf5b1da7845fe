use std::process::Command;

use serde::Deserialize;
use tracing::{debug, warn};

use super::{TreeNode, WindowManager};
use crate::error::{BenchError, Result};
use crate::model::BayLayout;

/// Talks to sway (or i3) through its `*msg` IPC client.
#[derive(Debug, Clone)]
pub struct SwayMsgAdapter {
    program: String,
}

impl Default for SwayMsgAdapter {
    fn default() -> Self {
        Self::new("swaymsg")
    }
}

#[derive(Debug, Deserialize)]
struct CommandReply {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

impl SwayMsgAdapter {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        let rendered = format!("{} {}", self.program, args.join(" "));
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|err| BenchError::Adapter {
                command: rendered.clone(),
                details: err.to_string(),
            })?;

        if !output.status.success() {
            return Err(BenchError::Adapter {
                command: rendered,
                details: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Sends one command. A rejected command is logged, not raised; callers
    /// confirm placement by re-querying the tree.
    fn command(&self, command: &str) -> Result<()> {
        debug!(command, "Sending window manager command");
        let stdout = self.run(&[command])?;
        if let Ok(replies) = serde_json::from_str::<Vec<CommandReply>>(&stdout) {
            for reply in replies.into_iter().filter(|reply| !reply.success) {
                warn!(
                    command,
                    error = reply.error.as_deref().unwrap_or("unknown"),
                    "Window manager rejected command"
                );
            }
        }
        Ok(())
    }
}

impl WindowManager for SwayMsgAdapter {
    fn tree(&self) -> Result<TreeNode> {
        let stdout = self.run(&["-t", "get_tree"])?;
        serde_json::from_str(&stdout).map_err(|source| BenchError::Json {
            context: "failed to decode window tree".to_string(),
            source,
        })
    }

    fn move_to_workspace(&self, window_id: &str, workspace: &str) -> Result<()> {
        self.command(&format!(
            "{} move container to workspace {}",
            con_selector(window_id),
            quote(workspace)
        ))
    }

    fn move_to_scratchpad(&self, window_id: &str) -> Result<()> {
        self.command(&format!(
            "{} move container to scratchpad",
            con_selector(window_id)
        ))
    }

    fn rename_workspace(&self, old: &str, new: &str) -> Result<()> {
        self.command(&format!(
            "rename workspace {} to {}",
            quote(old),
            quote(new)
        ))
    }

    fn focus_workspace(&self, workspace: &str) -> Result<()> {
        self.command(&format!("workspace {}", quote(workspace)))
    }

    fn apply_layout(&self, window_id: &str, layout: BayLayout) -> Result<()> {
        let action = match layout {
            BayLayout::Stacking => "floating disable, layout stacking",
            BayLayout::Tabbed => "floating disable, layout tabbed",
            BayLayout::Floating => "floating enable",
        };
        self.command(&format!("{} {}", con_selector(window_id), action))
    }
}

fn con_selector(window_id: &str) -> String {
    format!("[con_id={}]", quote(window_id))
}

/// Quotes an argument for the window manager's command parser.
fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_escapes_embedded_quotes() {
        assert_eq!(quote("1: Home"), "\"1: Home\"");
        assert_eq!(quote(r#"a "b" \c"#), r#""a \"b\" \\c""#);
    }

    #[test]
    fn con_selector_targets_container_id() {
        assert_eq!(con_selector("42"), "[con_id=\"42\"]");
    }

    #[test]
    fn missing_program_is_an_adapter_error() {
        let adapter = SwayMsgAdapter::new("bench-test-no-such-wm-client");
        let err = adapter.tree().unwrap_err();
        assert!(matches!(err, BenchError::Adapter { .. }));
    }

    #[test]
    fn command_reply_tolerates_partial_objects() {
        let replies: Vec<CommandReply> =
            serde_json::from_str(r#"[{"success": true}, {"success": false, "error": "No matching node"}]"#)
                .unwrap();
        assert!(replies[0].success);
        assert_eq!(replies[1].error.as_deref(), Some("No matching node"));
    }
}
