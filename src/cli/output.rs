//! Output formatting for CLI commands.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::sequencer::{RunReport, UnitGroup, UnitOutcome};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Unit row for table display.
#[derive(Tabled)]
struct UnitRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Unit")]
    unit: String,
    #[tabled(rename = "Group")]
    group: String,
    #[tabled(rename = "Outcome")]
    outcome: String,
    #[tabled(rename = "Duration")]
    duration: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a run report for display.
    #[must_use]
    pub fn format_report(&self, report: &RunReport) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Text => Self::format_report_text(report),
        }
    }

    fn format_report_text(report: &RunReport) -> String {
        let mut output = String::new();

        if report.units.is_empty() {
            let _ = writeln!(output, "{} No units to {}.", "⚠".yellow(), report.action);
            return output;
        }

        let _ = write!(
            output,
            "\nRun {} ({} on stack {})\n\n",
            &report.run_id.to_string()[..8],
            report.action,
            report.stack
        );

        let rows: Vec<UnitRow> = report
            .units
            .iter()
            .enumerate()
            .map(|(i, u)| UnitRow {
                index: i + 1,
                unit: u.unit.clone(),
                group: Self::format_group(u.group),
                outcome: Self::format_outcome(u.outcome),
                duration: Self::format_duration(u.duration_ms),
            })
            .collect();
        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        let status = if report.success() {
            format!("{} Run succeeded", "✓".green())
        } else {
            format!("{} Run failed", "✗".red())
        };
        let _ = write!(
            output,
            "\n{status}: {} succeeded, {} failed, {} skipped\n",
            report.count(UnitOutcome::Succeeded).to_string().green(),
            report.count(UnitOutcome::Failed).to_string().red(),
            report.count(UnitOutcome::Skipped).to_string().yellow()
        );

        for unit in report.units.iter().filter(|u| u.error.is_some()) {
            let _ = writeln!(
                output,
                "   - {}: {}",
                unit.unit,
                unit.error.as_deref().unwrap_or_default()
            );
        }

        output
    }

    fn format_group(group: UnitGroup) -> String {
        match group {
            UnitGroup::Infra => "infra".cyan().to_string(),
            UnitGroup::App => "app".normal().to_string(),
        }
    }

    fn format_outcome(outcome: UnitOutcome) -> String {
        match outcome {
            UnitOutcome::Succeeded => "succeeded".green().to_string(),
            UnitOutcome::Failed => "failed".red().to_string(),
            UnitOutcome::Skipped => "skipped".dimmed().to_string(),
        }
    }

    fn format_duration(duration_ms: u64) -> String {
        if duration_ms < 1000 {
            format!("{duration_ms}ms")
        } else {
            format!("{}.{:01}s", duration_ms / 1000, (duration_ms % 1000) / 100)
        }
    }
}
