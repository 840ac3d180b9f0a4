use std::io::{self, Write};

use serde::Serialize;

use crate::app::{PlanReport, ProgressEvent, ProgressSink, SyncReport};
use crate::domain::{Decision, FetchOutcome};
use crate::ledger::Ledger;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Text,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_sync(report: &SyncReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_plan(report: &PlanReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_ledger(ledger: &Ledger) -> io::Result<()> {
        Self::print_json(ledger)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Human-readable output: one line per dataset as outcomes arrive, then a
/// summary.
pub struct TextOutput;

impl TextOutput {
    pub fn print_sync(report: &SyncReport) -> io::Result<()> {
        let mut stdout = io::stdout();
        writeln!(
            stdout,
            "Synced {} of {} catalog datasets matching {:?}: {} downloaded, {} unchanged, {} failed",
            report.matched,
            report.catalog_total,
            report.theme,
            report.summary.succeeded,
            report.summary.skipped,
            report.summary.failed,
        )?;
        writeln!(
            stdout,
            "Ledger: {} ({} entries)",
            report.ledger_path, report.ledger_entries
        )
    }

    pub fn print_plan(report: &PlanReport) -> io::Result<()> {
        let mut stdout = io::stdout();
        for item in &report.items {
            let action = match &item.decision {
                Decision::MissingUrl => "no-url".to_string(),
                Decision::UpToDate { marker } => format!("skip (synced {marker})"),
                Decision::Stale {
                    previous: Some(previous),
                    ..
                } => format!("fetch ({previous} -> {})", item.last_modified),
                Decision::Stale { previous: None, .. } => "fetch (new)".to_string(),
            };
            writeln!(stdout, "{:<12} {:<28} {}", item.dataset_id, action, item.title)?;
        }
        writeln!(
            stdout,
            "{} of {} catalog datasets match {:?}",
            report.items.len(),
            report.catalog_total,
            report.theme
        )
    }

    pub fn print_ledger(ledger: &Ledger) -> io::Result<()> {
        let mut stdout = io::stdout();
        for (id, marker) in ledger.iter() {
            writeln!(stdout, "{id}\t{marker}")?;
        }
        Ok(())
    }
}

impl ProgressSink for TextOutput {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => eprintln!("{} ({:.1}s)", event.message, elapsed.as_secs_f64()),
            None => eprintln!("{}", event.message),
        }
    }

    fn outcome(&self, outcome: &FetchOutcome) {
        match outcome {
            FetchOutcome::Succeeded { title, path, .. } => {
                println!("Saved {title} to {path}");
            }
            FetchOutcome::Skipped { title, .. } => {
                println!("Skipping {title} (not modified since last run)");
            }
            FetchOutcome::Failed {
                dataset_id,
                title,
                reason,
            } => {
                println!("Failed {title} ({dataset_id}): {reason}");
            }
        }
    }
}
