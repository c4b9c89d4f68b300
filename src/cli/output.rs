//! Plain-text reports printed by the CLI commands.

use crate::geo::format_distance;
use crate::highlight::{CheckOutcome, CoordinateSource, HighlightReport};
use crate::worker::{ActivationReport, InstallReport};

use super::AgendaLine;

const SEPARATOR: &str = "────────────────────────────────────────────────────────────";

fn source_label(source: &CoordinateSource) -> String {
    match source {
        CoordinateSource::Link => "map link".to_string(),
        CoordinateSource::Landmark { name } => format!("landmark {name}"),
    }
}

/// Prints every proximity check and the stops that were marked.
pub fn print_highlight_report(report: &HighlightReport) {
    if !report.has_schedule() {
        println!("No schedule for {}.", report.date);
        return;
    }

    println!("\n{SEPARATOR}");
    println!("Proximity checks for {}:", report.date);
    println!("{SEPARATOR}");

    for check in &report.checks {
        match &check.outcome {
            CheckOutcome::Nearby {
                distance_km,
                source,
            } => println!(
                "  * {} -> {} ({}, via {})",
                check.stop,
                check.place,
                format_distance(*distance_km),
                source_label(source)
            ),
            CheckOutcome::TooFar {
                distance_km,
                source,
            } => println!(
                "    {} -> {} ({}, via {})",
                check.stop,
                check.place,
                format_distance(*distance_km),
                source_label(source)
            ),
            CheckOutcome::Unresolved => {
                println!("  ? {} -> {} (no coordinates)", check.stop, check.place);
            }
        }
    }

    println!("{SEPARATOR}");
    if report.marked.is_empty() {
        println!("  Nothing nearby.");
    } else {
        println!("  Nearby: {}", report.marked.join(", "));
    }
    println!();
}

/// Prints each day with its collapsed marker.
pub fn print_agenda(lines: &[AgendaLine]) {
    if lines.is_empty() {
        println!("No days in itinerary.");
        return;
    }

    for line in lines {
        let marker = if line.collapsed { "[+]" } else { "[-]" };
        let title = line.title.as_deref().unwrap_or("");
        println!("{marker} {} {title} ({} stops)", line.date, line.stops);
    }
}

/// Prints what install and activation did.
pub fn print_worker_summary(install: &InstallReport, activation: &ActivationReport) {
    println!("\n{SEPARATOR}");
    println!("Cache generation {}", install.generation);
    println!("{SEPARATOR}");
    println!("  {} static asset(s) cached", install.cached.len());
    for (path, reason) in &install.failed {
        println!("  failed: {path} ({reason})");
    }
    if !activation.deleted.is_empty() {
        println!("  {} old cache(s) deleted", activation.deleted.len());
    }
    println!("{SEPARATOR}\n");
}
