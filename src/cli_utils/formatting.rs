use std::fmt::Write as FmtWrite;

use colored::Colorize;

use crate::provisioning::shared::{BatchReport, ItemStatus};

/// Format a table with columns and rows
pub fn format_table(headers: Vec<&str>, rows: Vec<Vec<String>>) {
    let col_widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, header)| {
            let mut width = header.len();
            for row in &rows {
                if i < row.len() {
                    width = width.max(row[i].len());
                }
            }
            width
        })
        .collect();

    let header_line = headers
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{:width$}", h, width = col_widths[i]))
        .collect::<Vec<_>>()
        .join(" | ");

    println!("{}", header_line.bold());
    println!("{}", "-".repeat(header_line.len()));

    for row in rows {
        let row_line = row
            .iter()
            .enumerate()
            .map(|(i, cell)| format!("{:width$}", cell, width = col_widths.get(i).copied().unwrap_or(20)))
            .collect::<Vec<_>>()
            .join(" | ");
        println!("{}", row_line);
    }
}

/// Format a single record as key-value pairs
pub fn format_record(data: Vec<(&str, String)>) {
    let max_key_len = data.iter().map(|(k, _)| k.len()).max().unwrap_or(20);

    for (key, value) in data {
        let padded_key = format!("{:width$}", key, width = max_key_len);
        println!("  {}: {}", padded_key.bright_cyan(), value);
    }
}

/// Format a header
pub fn print_header(text: &str) {
    eprintln!("{}", "╔═══════════════════════════════════════════════════════╗".bright_cyan());
    eprintln!("{}", format!("║  {:<53}║", text).bright_cyan());
    eprintln!("{}", "╚═══════════════════════════════════════════════════════╝".bright_cyan());
    eprintln!();
}

/// Render the outcome of a batch run as a tree, failures listed individually
pub fn render_batch_summary(report: &BatchReport) -> String {
    let mut summary = String::new();

    writeln!(summary).ok();
    writeln!(summary, "  {} {}", "├─".bright_cyan(), report.action.bold()).ok();
    writeln!(summary, "  │  ├─ Requested: {}", report.requested()).ok();
    if let Some(amount) = &report.amount {
        writeln!(summary, "  │  ├─ Amount each: {}", amount).ok();
    }
    writeln!(
        summary,
        "  │  ├─ Confirmed: {} {}",
        report.confirmed_count(),
        format!("({:.1}%)", report.success_rate()).bright_green()
    )
    .ok();

    if report.failed_count() > 0 {
        writeln!(summary, "  │  └─ Failed: {} {}", report.failed_count(), "⚠".bright_yellow()).ok();
        for outcome in report.failures() {
            if let ItemStatus::Failed { kind, reason, attempts } = &outcome.status {
                writeln!(
                    summary,
                    "  │     {} [{}] {} {} after {} attempt(s): {}",
                    "✗".red(),
                    outcome.index,
                    outcome.account,
                    kind.to_string().yellow(),
                    attempts,
                    reason
                )
                .ok();
            }
        }
    }

    writeln!(summary, "  {} Duration: {:.2}s", "└─".bright_cyan(), report.duration_seconds()).ok();
    writeln!(summary).ok();
    writeln!(summary, "  {} Run ID: {}", "ℹ".bright_blue(), report.run_id).ok();

    summary
}

pub fn print_batch_summary(report: &BatchReport) {
    println!("{}", render_batch_summary(report));
}
