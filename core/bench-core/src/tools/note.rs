//! Note-editor tools, opened through an `obsidian://` URI.

use serde::{Deserialize, Serialize};

use super::LaunchSpec;
use crate::config::AppConfig;

pub const DEFAULT_PROGRAM: &str = "obsidian";
pub const DEFAULT_PATTERNS: &[&str] = &["(?i)^obsidian$"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoteState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vault: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl NoteState {
    /// `obsidian://open?vault=..&file=..`, or `None` when no vault is set.
    pub fn uri(&self) -> Option<String> {
        let vault = self.vault.as_deref().filter(|v| !v.is_empty())?;
        let mut uri = format!("obsidian://open?vault={}", encode_component(vault));
        if let Some(note) = self.note.as_deref().filter(|n| !n.is_empty()) {
            uri.push_str("&file=");
            uri.push_str(&encode_component(note));
        }
        Some(uri)
    }
}

pub(crate) fn launch_spec(state: &NoteState, app: &AppConfig) -> LaunchSpec {
    let program = app
        .program
        .clone()
        .unwrap_or_else(|| DEFAULT_PROGRAM.to_string());
    let mut args = app.args.clone().unwrap_or_default();
    args.extend(state.uri());

    LaunchSpec {
        program,
        args,
        cwd: None,
    }
}

fn encode_component(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uri_encodes_vault_and_note() {
        let state = NoteState {
            vault: Some("My Notes".to_string()),
            note: Some("daily/2026-10-16.md".to_string()),
        };
        assert_eq!(
            state.uri().as_deref(),
            Some("obsidian://open?vault=My%20Notes&file=daily%2F2026-10-16.md")
        );
    }

    #[test]
    fn no_vault_launches_bare_editor() {
        let spec = launch_spec(&NoteState::default(), &AppConfig::default());
        assert_eq!(spec.program, "obsidian");
        assert!(spec.args.is_empty());
    }
}
