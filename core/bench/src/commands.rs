//! One-shot subcommands: run one engine operation and print the outcome.

use std::sync::Arc;

use bench_core::{
    BenchConfig, BenchEngine, EntityStore, FocusMode, Result, StorageConfig, TabSync, ToolStatus,
    ToolSyncOutcome,
};

use crate::Commands;

/// An engine, plus the tab-sync server feeding it when the command needs
/// browser tabs. The server stops when this is dropped.
struct Session {
    engine: BenchEngine,
    _tab_sync: Option<TabSync>,
}

impl Session {
    fn open(storage: &StorageConfig, config: &BenchConfig, with_tabs: bool) -> Self {
        let engine = BenchEngine::from_config(EntityStore::new(storage.clone()), config);
        if !with_tabs {
            return Self {
                engine,
                _tab_sync: None,
            };
        }
        match TabSync::start(&config.tab_sync) {
            Some(sync) => Self {
                engine: engine.with_tab_source(Arc::new(sync.hub.clone())),
                _tab_sync: Some(sync),
            },
            None => Self {
                engine,
                _tab_sync: None,
            },
        }
    }
}

fn mode(no_stow: bool) -> FocusMode {
    if no_stow {
        FocusMode::NoStow
    } else {
        FocusMode::Stow
    }
}

pub fn run(command: Commands, storage: &StorageConfig, config: &BenchConfig) -> Result<()> {
    let needs_tabs = matches!(
        command,
        Commands::Focus { .. }
            | Commands::Assemble { .. }
            | Commands::AssembleTool { .. }
            | Commands::SyncToolState
    );
    let session = Session::open(storage, config, needs_tabs);
    let engine = &session.engine;

    match command {
        Commands::Create { name } => {
            engine.create_bench(&name)?;
            println!("Created bench {}", name);
        }
        Commands::ListBenches => {
            for bench in engine.list_benches()? {
                let marker = if bench.focused { "*" } else { " " };
                println!(
                    "{} {}  ({} bays, {} tools)",
                    marker,
                    bench.name,
                    bench.bays.len(),
                    bench.tool_names().len()
                );
            }
        }
        Commands::Delete { name } => {
            engine.delete_bench(&name)?;
            println!("Deleted bench {}", name);
        }
        Commands::AddTool { bench, bay, tool } => {
            engine.add_tool(&bench, &bay, &tool)?;
            println!("Added {} to {} / {}", tool, bench, bay);
        }
        Commands::Focus { name, no_stow } => {
            let report = engine.focus(&name, mode(no_stow))?;
            match &report.previous {
                Some(previous) => println!(
                    "Focused {} (was {}; stowed {} windows, launched {})",
                    report.bench,
                    previous,
                    report.stowed_windows.len(),
                    report.launched()
                ),
                None => println!("Focused {} (launched {})", report.bench, report.launched()),
            }
            print_tools(&report.tools);
        }
        Commands::Assemble { name } => {
            let tools = engine.assemble_bench(&name)?;
            println!("Assembled {}", name);
            print_tools(&tools);
        }
        Commands::Stow { name } => {
            let report = engine.stow_bench(&name)?;
            println!(
                "Stowed {} windows of {}",
                report.stowed_windows.len(),
                report.bench
            );
        }
        Commands::Plan { name, no_stow } => {
            let plan = engine.focus_plan(&name, mode(no_stow))?;
            println!("Plan for {}", plan.bench);
            for (tool, window_id) in &plan.reuse {
                println!("  reuse   {} (window {})", tool, window_id);
            }
            for tool in &plan.launch {
                println!("  launch  {}", tool);
            }
            if let Some(previous) = &plan.previous {
                for window in &plan.stow {
                    let app = window
                        .app_id
                        .as_deref()
                        .or(window.class.as_deref())
                        .unwrap_or("?");
                    println!("  stow    window {} ({}) of {}", window.id, app, previous);
                }
            }
            for (bay, count) in &plan.placement {
                println!("  bay     {}: {} windows", bay, count);
            }
        }
        Commands::SyncLayout => {
            let diff = engine.sync_layout()?;
            if diff.is_empty() {
                println!("Layout unchanged");
            }
            for (bay, window_id) in &diff.added {
                println!("+ {} {}", bay, window_id);
            }
            for (bay, window_id) in &diff.removed {
                println!("- {} {}", bay, window_id);
            }
        }
        Commands::SyncToolState => {
            for report in engine.sync_tool_state()? {
                let outcome = match report.outcome {
                    ToolSyncOutcome::Updated { urls } => format!("updated ({} urls)", urls),
                    ToolSyncOutcome::Unchanged => "unchanged".to_string(),
                    ToolSyncOutcome::Unknown => "unknown (no tab report)".to_string(),
                    ToolSyncOutcome::Unsupported => "nothing to sync".to_string(),
                };
                println!("{}: {}", report.tool, outcome);
            }
        }
        Commands::CraftTool { kind, name } => {
            engine.craft_tool(kind, &name)?;
            println!(
                "Crafted {} tool {} at {}",
                kind,
                name,
                storage.tool_file(&name).display()
            );
        }
        Commands::ListTools => {
            for tool in engine.list_tools()? {
                let window = tool
                    .window_id()
                    .map(|id| format!("window {}", id))
                    .unwrap_or_else(|| "not assembled".to_string());
                println!("{}  [{}]  {}", tool.name, tool.kind(), window);
            }
        }
        Commands::AssembleTool { name, bay } => {
            let status = engine.assemble_tool(&name, bay.as_deref())?;
            print_tools(std::slice::from_ref(&status));
        }
        Commands::Info { name } => {
            let info = engine.info(&name)?;
            println!("Bench {}", info.bench.name);
            println!("  focused:   {}", info.focused);
            println!("  assembled: {}", info.assembled);
            if let Some(at) = info.bench.last_focused_at {
                println!("  last focused: {}", at.to_rfc3339());
            }
            for bay in &info.bench.bays {
                println!(
                    "  bay {} ({}, {})",
                    bay.name,
                    bay.title(),
                    bay.layout.as_str()
                );
            }
            print_tools(&info.tools);
            if let Some(snapshot) = &info.snapshot {
                for (bay, ids) in &snapshot.bay_windows {
                    println!("  snapshot {}: {}", bay, ids.join(", "));
                }
            }
        }
        Commands::Active => {
            if let Some(name) = engine.active()? {
                println!("{}", name);
            }
        }
        Commands::Daemon => return crate::daemon::run(storage, config),
    }
    Ok(())
}

fn print_tools(tools: &[ToolStatus]) {
    for status in tools {
        let bay = status
            .bay
            .as_deref()
            .map(|bay| format!("{} / ", bay))
            .unwrap_or_default();
        let place = match (&status.window_id, &status.workspace, status.live) {
            (Some(id), Some(workspace), true) => format!("window {} on {}", id, workspace),
            (Some(id), None, true) => format!("window {}", id),
            (Some(id), _, false) => format!("window {} (gone)", id),
            (None, _, _) => "not assembled".to_string(),
        };
        let launched = if status.launched { ", launched" } else { "" };
        println!("  {}{} [{}]: {}{}", bay, status.name, status.kind, place, launched);
    }
}
