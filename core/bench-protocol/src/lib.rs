//! Wire types and validation for the bench tab-sync endpoint.
//!
//! The browser companion extension pushes its full window → tab mapping to
//! the orchestrator over HTTP. This crate is shared by the server and its
//! tests so the payload schema cannot drift. The server remains the authority
//! on validation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const PROTOCOL_VERSION: u32 = 1;
pub const DEFAULT_BIND: &str = "127.0.0.1:47631";
pub const TABS_PATH: &str = "/tabs";
pub const HEALTH_PATH: &str = "/health";

pub const MAX_PUSH_BYTES: usize = 1024 * 1024; // 1MB
pub const MAX_WINDOWS: usize = 256;
pub const MAX_TABS_PER_WINDOW: usize = 1024;
pub const MAX_WINDOW_ID_LEN: usize = 128;

/// Full snapshot of the browser's open windows, keyed by the browser's own
/// window id. Each push replaces the previous one entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabReport(BTreeMap<String, Vec<String>>);

impl TabReport {
    pub fn new(windows: BTreeMap<String, Vec<String>>) -> Self {
        Self(windows)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn window_count(&self) -> usize {
        self.0.len()
    }

    pub fn window_ids(&self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }

    pub fn urls(&self, window_id: &str) -> Option<&[String]> {
        self.0.get(window_id).map(Vec::as_slice)
    }

    pub fn windows(&self) -> &BTreeMap<String, Vec<String>> {
        &self.0
    }

    pub fn into_inner(self) -> BTreeMap<String, Vec<String>> {
        self.0
    }

    pub fn validate(&self) -> Result<(), ErrorInfo> {
        if self.0.len() > MAX_WINDOWS {
            return Err(ErrorInfo::new(
                "too_many_windows",
                format!("report must contain {} windows or fewer", MAX_WINDOWS),
            ));
        }

        for (window_id, urls) in &self.0 {
            if window_id.trim().is_empty() {
                return Err(ErrorInfo::new(
                    "invalid_window_id",
                    "window id must not be empty",
                ));
            }
            if window_id.len() > MAX_WINDOW_ID_LEN {
                return Err(ErrorInfo::new(
                    "invalid_window_id",
                    format!(
                        "window id must be {} characters or fewer",
                        MAX_WINDOW_ID_LEN
                    ),
                ));
            }
            if urls.len() > MAX_TABS_PER_WINDOW {
                return Err(ErrorInfo::new(
                    "too_many_tabs",
                    format!("window {} reports more than {} tabs", window_id, MAX_TABS_PER_WINDOW),
                ));
            }
            if urls.iter().any(|url| url.trim().is_empty()) {
                return Err(ErrorInfo::new(
                    "invalid_url",
                    format!("window {} reports an empty url", window_id),
                ));
            }
        }

        Ok(())
    }
}

pub fn parse_tab_report(body: &[u8]) -> Result<TabReport, ErrorInfo> {
    if body.len() > MAX_PUSH_BYTES {
        return Err(ErrorInfo::new(
            "payload_too_large",
            "push exceeded maximum size",
        ));
    }
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(ErrorInfo::new("empty_payload", "push body was empty"));
    }

    let report: TabReport = serde_json::from_slice(body).map_err(|err| {
        ErrorInfo::new(
            "invalid_json",
            format!("push was not a window → urls object: {}", err),
        )
    })?;
    report.validate()?;
    Ok(report)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushAck {
    pub accepted: bool,
    pub windows: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    pub protocol_version: u32,
    #[serde(default)]
    pub pushes_received: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}
