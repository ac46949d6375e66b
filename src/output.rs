//! CLI output formatting and display helpers.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use hidemail_core::generate::TIMESTAMP_FORMAT;
use hidemail_core::{IterationOutcome, ListedAlias, RunReport};

const LABEL_COLUMN_WIDTH: usize = 24;
const ADDRESS_COLUMN_WIDTH: usize = 34;
const CREATED_COLUMN_WIDTH: usize = 16;

/// Returns terminal width from COLUMNS, or 80 if unset/invalid.
pub(crate) fn terminal_width() -> usize {
    std::env::var("COLUMNS")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|width| *width >= 20)
        .unwrap_or(80)
}

/// Truncates text to at most `width` chars, appending ellipsis if truncated.
pub(crate) fn truncate_to_width(text: &str, width: usize) -> String {
    let text_len = text.chars().count();
    if text_len <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    if width == 1 {
        return "…".to_string();
    }

    let mut output: String = text.chars().take(width - 1).collect();
    output.push('…');
    output
}

/// Builds the end-of-run summary lines.
pub(crate) fn run_summary_lines(report: &RunReport, label: &str, output: &Path) -> Vec<String> {
    let mut lines = vec![format!(
        "Reserved {}/{} alias(es) with label '{}' -> {}",
        report.reserved(),
        report.requested,
        label,
        output.display()
    )];
    lines.extend(report.records().map(|record| format!("  {}", record.address)));

    if report.failed() > 0 {
        lines.push(format!("Failed {}:", report.failed()));
        for (index, outcome) in report.outcomes.iter().enumerate() {
            let Some(reason) = outcome.failure_reason() else {
                continue;
            };
            let mut line = format!("  #{}", index + 1);
            if let IterationOutcome::ReserveFailed { record, .. } = outcome {
                let _ = write!(line, " {}", record.address);
            }
            let _ = write!(line, ": {reason}");
            lines.push(line);
        }
    }

    if report.interrupted {
        lines.push(format!(
            "Interrupted after {} of {} alias(es).",
            report.outcomes.len(),
            report.requested
        ));
    }
    lines
}

pub(crate) fn print_run_summary(report: &RunReport, label: &str, output: &Path) {
    for line in run_summary_lines(report, label, output) {
        println!("{line}");
    }
}

/// Formats one listed alias as `label;address;YYYY-MM-DD HH:MM;status`.
pub(crate) fn format_alias_line(alias: &ListedAlias) -> String {
    let created = alias
        .created_at
        .map(|ts| ts.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_default();
    format!(
        "{};{};{};{}",
        alias.label.replace(';', ","),
        alias.address,
        created,
        alias.status_label()
    )
}

/// Writes every alias to `path`, one line each, replacing previous contents.
pub(crate) fn write_alias_file(path: &Path, aliases: &[ListedAlias]) -> Result<()> {
    let mut contents = String::new();
    for alias in aliases {
        contents.push_str(&format_alias_line(alias));
        contents.push('\n');
    }
    fs::write(path, contents)
        .with_context(|| format!("Failed to write alias list to '{}'", path.display()))
}

/// Builds aligned table rows (header first) for listed aliases.
pub(crate) fn alias_table_lines(aliases: &[&ListedAlias], width: usize) -> Vec<String> {
    let row = |label: &str, address: &str, created: &str, status: &str| {
        let line = format!(
            "{:<lw$}  {:<aw$}  {:<cw$}  {}",
            truncate_to_width(label, LABEL_COLUMN_WIDTH),
            truncate_to_width(address, ADDRESS_COLUMN_WIDTH),
            created,
            status,
            lw = LABEL_COLUMN_WIDTH,
            aw = ADDRESS_COLUMN_WIDTH,
            cw = CREATED_COLUMN_WIDTH,
        );
        truncate_to_width(line.trim_end(), width)
    };

    let mut lines = vec![row("Label", "Hide My Email", "Created", "Status")];
    for alias in aliases {
        let created = alias
            .created_at
            .map(|ts| ts.format(TIMESTAMP_FORMAT).to_string())
            .unwrap_or_default();
        lines.push(row(
            &alias.label,
            &alias.address,
            &created,
            alias.status_label(),
        ));
    }
    lines
}

pub(crate) fn print_alias_table(aliases: &[&ListedAlias]) {
    for line in alias_table_lines(aliases, terminal_width()) {
        println!("{line}");
    }
}
