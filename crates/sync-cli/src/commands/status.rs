//! Status command implementation

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use colored::{ColoredString, Colorize};
use serde::Serialize;
use sync_core::{
    EventCollector, MemorySubscriber, ResourceError, Subscriber, SyncConfig, collect_blocking,
};
use sync_model::{Direction, ResourcePath, SyncState};
use sync_protocol::{ProtocolStatus, Transcript, UpdateParser};
use sync_tree::SyncTree;

use crate::error::{CliError, Result};

const COLLECT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize)]
struct TreeEntry {
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<SyncState>,
    out_of_sync_descendants: usize,
}

#[derive(Debug, Serialize)]
struct StatusReport {
    mode: String,
    out_of_sync: usize,
    entries: Vec<TreeEntry>,
    statuses: Vec<ProtocolStatus>,
    errors: Vec<ResourceError>,
}

/// Run the status command
pub fn run_status(
    snapshot: &Path,
    transcript: Option<&Path>,
    config: Option<&Path>,
    json: bool,
) -> Result<()> {
    let config = match config {
        Some(path) => SyncConfig::load(path)?,
        None => SyncConfig::default(),
    };

    let subscriber = Arc::new(MemorySubscriber::load(snapshot)?);
    let tree = Arc::new(SyncTree::new());
    let collector = EventCollector::new(
        Arc::clone(&subscriber) as Arc<dyn Subscriber>,
        Arc::clone(&tree),
        &config.collector,
    );

    collector.initialize();
    if !collector.wait_idle(COLLECT_TIMEOUT) {
        return Err(CliError::user("Timed out computing the initial sync set"));
    }

    let mut statuses = Vec::new();
    if let Some(path) = transcript {
        let transcript = Transcript::load(path)?;
        let mut parser =
            UpdateParser::with_prefixes(ResourcePath::root(), config.protocol.prefixes());
        let replay = transcript.replay(&mut parser);
        statuses = replay.statuses().cloned().collect();
        collect_blocking(&collector, replay.change_events(), COLLECT_TIMEOUT)?;
    }

    let errors = collector.take_errors();
    collector.shutdown();

    let mut entries = Vec::new();
    walk(&tree, &ResourcePath::root(), &mut entries);

    let report = StatusReport {
        mode: subscriber.mode().to_string(),
        out_of_sync: tree.len(),
        entries,
        statuses,
        errors,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

/// Collect every node below `resource`, parents before children.
fn walk(tree: &SyncTree, resource: &ResourcePath, entries: &mut Vec<TreeEntry>) {
    for child in tree.children(resource) {
        entries.push(TreeEntry {
            path: child.as_str().to_string(),
            state: tree.get(&child),
            out_of_sync_descendants: tree.out_of_sync_descendants(&child),
        });
        walk(tree, &child, entries);
    }
}

fn describe(state: &SyncState) -> ColoredString {
    let text = state.kind().to_string();
    match state.direction() {
        Direction::Incoming => text.cyan(),
        Direction::Outgoing => text.green(),
        Direction::Conflicting => text.red().bold(),
        Direction::None => text.normal(),
    }
}

fn print_report(report: &StatusReport) {
    println!("{}", "Sync Status".bold());
    println!();
    println!("{}:   {}", "Mode".dimmed(), report.mode.cyan());
    println!();

    if report.entries.is_empty() {
        println!("{}", "Everything is in sync".green());
    } else {
        println!("{} ({}):", "Out of sync".bold(), report.out_of_sync);
        for entry in &report.entries {
            let resource = ResourcePath::new(&entry.path);
            let indent = "  ".repeat(resource.depth());
            let name = resource.file_name().unwrap_or(&entry.path);
            let counts = if entry.out_of_sync_descendants > 0 {
                format!(" ({})", entry.out_of_sync_descendants)
                    .as_str()
                    .dimmed()
            } else {
                "".normal()
            };
            match &entry.state {
                Some(state) => println!("{}{}{}  {}", indent, name, counts, describe(state)),
                None => println!("{}{}/{}", indent, name, counts),
            }
        }
    }

    if !report.statuses.is_empty() {
        println!();
        println!("{}:", "Server messages".bold());
        for status in &report.statuses {
            println!("  {}", status);
        }
    }

    if !report.errors.is_empty() {
        println!();
        println!("{}:", "Errors".red().bold());
        for error in &report.errors {
            println!("  {} {}", "!".red(), error);
        }
    }
}
