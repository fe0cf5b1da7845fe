//! # bench-core
//!
//! Keeps declared workspaces ("benches") in step with what a sway or i3
//! session actually shows. A bench groups bays (workspaces); a bay lists
//! tools (a browser window, a terminal, a note editor). Focusing a bench
//! hides the previous one, launches whatever is missing and puts every
//! window back in its bay.
//!
//! ## Design Principles
//!
//! - **Synchronous**: Every operation runs to completion on the caller's thread.
//!   Only the tab-sync HTTP server runs its own runtime, on its own thread.
//! - **The window manager is the truth**: Tracked window ids are hints; each
//!   operation re-queries the tree before trusting one.
//! - **Bounded waits**: Anything that waits on an external effect polls with a
//!   deadline (see [`poll`]).
//! - **Re-runnable**: Launched tools are recorded immediately, so repeating a
//!   failed or finished operation never launches twice.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use bench_core::{BenchConfig, BenchEngine, EntityStore, FocusMode, StorageConfig};
//!
//! let storage = StorageConfig::default();
//! let config = BenchConfig::load_or_default(&storage);
//! let engine = BenchEngine::from_config(EntityStore::new(storage), &config);
//! let report = engine.focus("home", FocusMode::Stow)?;
//! ```

pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod model;
pub mod poll;
pub mod storage;
pub mod store;
pub mod tabsync;
pub mod tools;
pub mod wm;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{AppConfig, AppsConfig, BenchConfig, TabSyncConfig};
pub use engine::{
    BenchEngine, BenchInfo, FocusMode, FocusPhase, FocusPlan, FocusReport, LayoutDiff, StowReport,
    ToolStatus, ToolSyncOutcome, ToolSyncReport,
};
pub use error::{BenchError, EntityKind, Result};
pub use model::{AssembledBench, AssembledTool, Bay, BayLayout, Bench, DeclaredState, Tool, ToolKind};
pub use storage::StorageConfig;
pub use store::EntityStore;
pub use tabsync::{TabHub, TabSource, TabSync};
pub use wm::{SwayMsgAdapter, WindowManager};
