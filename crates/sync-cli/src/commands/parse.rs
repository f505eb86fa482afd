//! Parse command implementation

use std::path::Path;

use colored::Colorize;
use serde::Serialize;
use sync_model::{ChangeEvent, ResourcePath};
use sync_protocol::{
    Channel, ParseOutcome, ServerPrefixes, Severity, Transcript, UpdateParser,
};

use crate::error::Result;

#[derive(Serialize)]
struct ParsedLine<'a> {
    line: usize,
    channel: Channel,
    text: &'a str,
    #[serde(flatten)]
    outcome: &'a ParseOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    event: Option<ChangeEvent>,
}

/// Run the parse command
pub fn run_parse(transcript: &Path, root: &str, program: &str, json: bool) -> Result<()> {
    let transcript = Transcript::load(transcript)?;
    let mut parser =
        UpdateParser::with_prefixes(ResourcePath::new(root), ServerPrefixes::for_program(program));
    let replay = transcript.replay(&mut parser);
    tracing::debug!(
        lines = transcript.lines().len(),
        outcomes = replay.outcomes.len(),
        "Replayed transcript"
    );

    let parsed: Vec<ParsedLine<'_>> = transcript
        .lines()
        .iter()
        .zip(&replay.outcomes)
        .enumerate()
        .map(|(index, (line, outcome))| ParsedLine {
            line: index + 1,
            channel: line.channel,
            text: &line.text,
            outcome,
            event: outcome.change_event(),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&parsed)?);
        return Ok(());
    }

    for entry in &parsed {
        if entry.outcome.is_empty() {
            continue;
        }
        print_line(entry);
    }

    println!();
    let notifications = replay.notifications().count();
    let statuses = replay.statuses().count();
    let worst = match replay.worst_severity() {
        Some(Severity::Error) => "error".red().bold(),
        Some(Severity::Warning) => "warning".yellow(),
        Some(Severity::Info) => "info".normal(),
        None => "none".dimmed(),
    };
    println!(
        "{} notifications, {} statuses, worst severity: {}",
        notifications, statuses, worst
    );
    match replay.completed {
        Some(true) => {}
        Some(false) => println!("{}", "Server reported failure".red()),
        None => println!("{}", "Transcript ended without a terminator".yellow()),
    }

    Ok(())
}

fn print_line(entry: &ParsedLine<'_>) {
    let tag = match entry.channel {
        Channel::Message => "M".dimmed(),
        Channel::Error => "E".dimmed(),
    };
    println!("{:>4} {} {}", entry.line, tag, entry.text);

    if let Some(notification) = &entry.outcome.notification {
        println!("       {} {}", "+".green(), notification);
    }
    if let Some(event) = &entry.event {
        println!("       {} {}", "->".cyan(), event);
    }
    if let Some(status) = &entry.outcome.status {
        let marker = match status.severity {
            Severity::Error => "!".red().bold(),
            Severity::Warning => "!".yellow(),
            Severity::Info => "i".normal(),
        };
        println!("       {} {}", marker, status);
    }
}
