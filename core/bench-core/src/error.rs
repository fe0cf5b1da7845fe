//! Error types for bench-core operations.

use std::path::PathBuf;

/// All errors that can occur while managing benches.
///
/// Placement failures deep inside an assembly are wrapped in
/// [`BenchError::Assembly`] so the caller sees which bench, bay and tool were
/// involved. Use [`BenchError::root`] to inspect the underlying failure.
#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    // ─────────────────────────────────────────────────────────────────────
    // Entity Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("{kind} not found: {name}")]
    NotFound { kind: EntityKind, name: String },

    #[error("{kind} already exists: {name}")]
    AlreadyExists { kind: EntityKind, name: String },

    #[error("Tool {tool} is already in bay {bay}")]
    DuplicateTool { tool: String, bay: String },

    #[error("No bench is focused")]
    NoFocusedBench,

    #[error("Invalid {kind} name {name:?}")]
    InvalidName { kind: EntityKind, name: String },

    // ─────────────────────────────────────────────────────────────────────
    // Window Manager Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Window manager unreachable: {command}: {details}")]
    Adapter { command: String, details: String },

    #[error("No new window appeared for tool {tool} within {waited_ms}ms")]
    NoNewWindow { tool: String, waited_ms: u64 },

    #[error("Cannot tell which new window belongs to tool {tool}: {window_ids:?}")]
    AmbiguousWindow {
        tool: String,
        window_ids: Vec<String>,
    },

    #[error("Failed to launch tool {tool} ({program}): {source}")]
    Launch {
        tool: String,
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Assembling bench {bench}, bay {bay}, tool {tool}: {source}")]
    Assembly {
        bench: String,
        bay: String,
        tool: String,
        #[source]
        source: Box<BenchError>,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Tab Sync Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("No tab report arrived within {waited_ms}ms")]
    SyncTimeout { waited_ms: u64 },

    #[error("Tab sync server failed: {0}")]
    Server(String),

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("YAML error: {context}: {source}")]
    Yaml {
        context: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    #[error("Invalid window pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// What kind of record a [`BenchError::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Bench,
    Tool,
    Bay,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            EntityKind::Bench => "Bench",
            EntityKind::Tool => "Tool",
            EntityKind::Bay => "Bay",
        };
        f.write_str(label)
    }
}

impl BenchError {
    pub fn bench_not_found(name: impl Into<String>) -> Self {
        BenchError::NotFound {
            kind: EntityKind::Bench,
            name: name.into(),
        }
    }

    pub fn tool_not_found(name: impl Into<String>) -> Self {
        BenchError::NotFound {
            kind: EntityKind::Tool,
            name: name.into(),
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        BenchError::Io {
            context: context.into(),
            source,
        }
    }

    /// Attach bench/bay/tool context to a failure raised while assembling.
    pub fn in_assembly(self, bench: &str, bay: &str, tool: &str) -> Self {
        BenchError::Assembly {
            bench: bench.to_string(),
            bay: bay.to_string(),
            tool: tool.to_string(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping any [`BenchError::Assembly`] wrappers.
    pub fn root(&self) -> &BenchError {
        match self {
            BenchError::Assembly { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), BenchError::NotFound { .. })
    }
}

/// Convenience type alias for Results using BenchError.
pub type Result<T> = std::result::Result<T, BenchError>;
