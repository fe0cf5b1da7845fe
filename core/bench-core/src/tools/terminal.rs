//! Terminal tools: an emulator window in a working directory, optionally
//! running a command.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::LaunchSpec;
use crate::config::AppConfig;

pub const DEFAULT_PROGRAM: &str = "kitty";
pub const DEFAULT_PATTERNS: &[&str] = &["(?i)^kitty$"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
}

pub(crate) fn launch_spec(state: &TerminalState, app: &AppConfig) -> LaunchSpec {
    let program = app
        .program
        .clone()
        .unwrap_or_else(|| DEFAULT_PROGRAM.to_string());
    let mut args = app.args.clone().unwrap_or_default();
    let cwd = state.cwd.as_deref().map(expand_tilde);

    if let Some(dir) = &cwd {
        if program == DEFAULT_PROGRAM {
            args.push("--directory".to_string());
            args.push(dir.display().to_string());
        }
    }
    args.extend(state.command.iter().cloned());

    LaunchSpec { program, args, cwd }
}

fn expand_tilde(path: &str) -> PathBuf {
    match path.strip_prefix("~") {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => match dirs::home_dir() {
            Some(home) => home.join(rest.trim_start_matches('/')),
            None => PathBuf::from(path),
        },
        _ => PathBuf::from(path),
    }
}
