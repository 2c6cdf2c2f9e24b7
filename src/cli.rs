//! Shared terminal output helpers for the gffctx binary.

use std::time::{Duration, Instant};

use colored::Colorize;

use crate::gff::{LineCounters, ParseOutcome, ParseStatus};

pub fn banner(subtitle: &str) {
    eprintln!();
    eprintln!("{} {}", "gffctx".bold().cyan(), subtitle.dimmed());
    eprintln!();
}

pub fn section(title: &str) {
    let bar = "─".repeat(50);
    eprintln!("{} {}", title.bold().blue(), bar.dimmed());
}

pub fn kv(key: &str, value: &str) {
    eprintln!("  {:<20} {}", key.dimmed(), value);
}

pub fn success(msg: &str) {
    eprintln!("  {} {}", "✓".green().bold(), msg);
}

pub fn warning(msg: &str) {
    eprintln!("  {} {}", "⚠".yellow(), msg.yellow());
}

pub fn failure(msg: &str) {
    eprintln!("  {} {}", "✗".red().bold(), msg.red());
}

/// Formats a duration as HH:MM:SS.d (tenths of a second).
#[must_use]
pub fn format_elapsed(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    let tenths = d.subsec_millis() / 100;
    format!("{hours:02}:{minutes:02}:{seconds:02}.{tenths}")
}

/// Line counters as `kv` rows, skipping the zero ones.
pub fn counters(counters: &LineCounters) {
    let rows = [
        ("Header lines", counters.header),
        ("Body lines", counters.body),
        ("Sequence lines", counters.sequence),
        ("FASTA directives", counters.fasta_directive),
        ("Comments", counters.comment),
        ("Clipped", counters.clipped),
        ("Type conflicts", counters.type_conflicts),
    ];
    for (key, value) in rows.into_iter().filter(|(_, v)| *v > 0) {
        kv(key, &value.to_string());
    }
}

/// One status line for a finished parse, then up to `max_errors` of its errors.
pub fn outcome(outcome: &ParseOutcome, max_errors: usize) {
    let msg = format!(
        "{}: {} features from {} lines",
        outcome.status, outcome.features_added, outcome.last_line
    );
    match outcome.status {
        ParseStatus::Done if outcome.errors.is_empty() => success(&msg),
        ParseStatus::Done | ParseStatus::Incomplete | ParseStatus::Cancelled => warning(&msg),
        ParseStatus::Failed => failure(&msg),
    }
    for error in outcome.errors.iter().take(max_errors) {
        warning(&error.to_string());
    }
    if outcome.errors.len() > max_errors {
        warning(&format!("... {} more errors", outcome.errors.len() - max_errors));
    }
}

pub fn print_summary(start: Instant) {
    eprintln!();
    eprintln!(
        "{}  {}",
        "Time".dimmed(),
        format_elapsed(start.elapsed()).bold()
    );
    eprintln!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_formatting() {
        assert_eq!(format_elapsed(Duration::from_millis(3_723_456)), "01:02:03.4");
        assert_eq!(format_elapsed(Duration::ZERO), "00:00:00.0");
    }
}
