//! bench: keeps declared benches in step with a sway or i3 session.
//!
//! Every subcommand is one synchronous operation against the data root
//! (`$XDG_DATA_HOME/bench`, or `BENCH_HOME`). `daemon` is the only long-lived
//! one: it serves the browser companion and keeps tool state in sync.
//!
//! ## Subcommands
//!
//! - `create`, `delete`, `list-benches`, `add-tool`: bench specs
//! - `craft-tool`, `list-tools`, `assemble-tool`: tool specs
//! - `focus`, `assemble`, `stow`, `plan`: bench operations
//! - `sync-layout`, `sync-tool-state`: pull live state into the specs
//! - `info`, `active`: queries
//! - `daemon`: tab-sync server plus the continuous sync loop

mod backoff;
mod commands;
mod daemon;
mod logging;

use bench_core::{BenchConfig, BenchError, StorageConfig, ToolKind};
use clap::{Parser, Subcommand};

const EXIT_FAILURE: i32 = 1;
const EXIT_NOT_FOUND: i32 = 3;

#[derive(Parser)]
#[command(name = "bench")]
#[command(about = "Declarative workspaces for sway and i3")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty bench
    Create {
        #[arg(value_name = "BENCH")]
        name: String,
    },

    /// List benches; the focused one is marked with `*`
    ListBenches,

    /// Delete a bench and its layout snapshot
    Delete {
        #[arg(value_name = "BENCH")]
        name: String,
    },

    /// Put a tool into a bay of a bench (the bay is created if missing)
    AddTool {
        #[arg(value_name = "BENCH")]
        bench: String,

        #[arg(value_name = "BAY")]
        bay: String,

        #[arg(value_name = "TOOL")]
        tool: String,
    },

    /// Make a bench the visible one
    Focus {
        #[arg(value_name = "BENCH")]
        name: String,

        /// Leave the previously focused bench's windows where they are
        #[arg(long)]
        no_stow: bool,
    },

    /// Launch whatever a bench is missing, without taking focus
    Assemble {
        #[arg(value_name = "BENCH")]
        name: String,
    },

    /// Move every window of a bench to the scratchpad
    Stow {
        #[arg(value_name = "BENCH")]
        name: String,
    },

    /// Show what `focus` would do, without doing it
    Plan {
        #[arg(value_name = "BENCH")]
        name: String,

        #[arg(long)]
        no_stow: bool,
    },

    /// Record where the focused bench's windows currently are
    SyncLayout,

    /// Pull live browser tabs into the focused bench's tools
    SyncToolState,

    /// Create a tool with the defaults of its kind
    CraftTool {
        /// browser, terminal or note
        #[arg(value_name = "KIND", value_parser = parse_kind)]
        kind: ToolKind,

        #[arg(value_name = "TOOL")]
        name: String,
    },

    /// List tools and their tracked windows
    ListTools,

    /// Make sure one tool has a window, optionally moving it to a bay
    AssembleTool {
        #[arg(value_name = "TOOL")]
        name: String,

        /// Workspace (bay) to move the window to
        #[arg(long, value_name = "BAY")]
        bay: Option<String>,
    },

    /// Show a bench and where each of its tools stands
    Info {
        #[arg(value_name = "BENCH")]
        name: String,
    },

    /// Print the focused bench
    Active,

    /// Serve the browser companion and sync tool state continuously
    Daemon,
}

fn parse_kind(value: &str) -> Result<ToolKind, String> {
    value.parse()
}

fn exit_code(err: &BenchError) -> i32 {
    if err.is_not_found() {
        EXIT_NOT_FOUND
    } else {
        EXIT_FAILURE
    }
}

fn main() {
    let cli = Cli::parse();
    let storage = StorageConfig::default();
    let logging_guard = logging::init(&storage);
    let config = BenchConfig::load_or_default(&storage);

    if let Err(e) = commands::run(cli.command, &storage, &config) {
        tracing::error!(error = %e, "bench failed");
        // process::exit skips destructors; flush the file writer first.
        drop(logging_guard);
        std::process::exit(exit_code(&e));
    }
}
