use crate::rows::{ErrorRow, SlowQueryRow};
use chrono::{DateTime, Utc};
use color_eyre::owo_colors::OwoColorize as _;
use tabled::settings::{peaker::Priority, style::Style, Settings, Width};
use tabled::{Table, Tabled};
use terminal_size::{terminal_size, Width as TerminalWidth};

/// Severity at and above which an error is highlighted
const HIGH_SEVERITY: i64 = 16;

const STATEMENT_MAX_LENGTH: usize = 100;

#[derive(Tabled, Clone)]
struct ErrorTableRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Database")]
    database: String,
    #[tabled(rename = "User")]
    user: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Statement")]
    statement: String,
    #[tabled(rename = "Error")]
    error: String,
}

#[derive(Tabled, Clone)]
struct SlowQueryTableRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Duration (ms)")]
    duration: String,
    #[tabled(rename = "Statement")]
    statement: String,
    #[tabled(rename = "Database")]
    database: String,
    #[tabled(rename = "User")]
    user: String,
}

/// Print the error table, or a friendly message when nothing matched
///
/// Rows are printed in the order they arrive; sorting happened in the query.
pub fn render_errors(rows: &[ErrorRow], window_minutes: u32) {
    if rows.is_empty() {
        println!(
            "{}",
            console::style(format!(
                "No SQL errors found in the last {window_minutes} minutes"
            ))
            .green()
        );
        return;
    }

    println!(
        "\n{}",
        format!("Recent SQL errors (last {window_minutes} minutes)").bold()
    );

    let table_rows: Vec<ErrorTableRow> = rows
        .iter()
        .map(|row| ErrorTableRow {
            time: format_timestamp(&row.timestamp),
            database: console::style(placeholder(&row.database)).green().to_string(),
            user: placeholder(&row.principal),
            action: placeholder(&row.action),
            statement: truncate(&row.statement, STATEMENT_MAX_LENGTH),
            error: format_error_detail(row),
        })
        .collect();

    print_table(Table::new(table_rows));
}

/// Print the slow-query table, duration color-graded by how bad it is
pub fn render_slow_queries(rows: &[SlowQueryRow], window_minutes: u32, threshold_ms: u64) {
    if rows.is_empty() {
        println!(
            "{}",
            console::style(format!(
                "No queries slower than {threshold_ms}ms found in the last {window_minutes} minutes"
            ))
            .green()
        );
        return;
    }

    println!(
        "\n{}",
        format!("Slow queries (last {window_minutes} minutes, >{threshold_ms}ms)").bold()
    );

    let table_rows: Vec<SlowQueryTableRow> = rows
        .iter()
        .map(|row| SlowQueryTableRow {
            time: format_timestamp(&row.timestamp),
            duration: format_duration(row.duration_ms),
            statement: format_statement_with_metrics(row),
            database: console::style(placeholder(&row.database)).green().to_string(),
            user: placeholder(&row.principal),
        })
        .collect();

    print_table(Table::new(table_rows));
}

fn print_table(mut table: Table) {
    let width = terminal_width();

    let settings = Settings::default()
        .with(Width::wrap(width).priority(Priority::max(true)))
        .with(Width::increase(width));

    table.with(Style::modern()).with(settings);
    println!("{table}");
}

fn terminal_width() -> usize {
    // 120 is a sane default when not attached to a terminal (pipes, CI)
    terminal_size().map_or(120, |(TerminalWidth(width), _)| width as usize)
}

fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    console::style(timestamp.format("%Y-%m-%d %H:%M:%S"))
        .dim()
        .to_string()
}

fn format_error_detail(row: &ErrorRow) -> String {
    let message = truncate(&row.detail.message, STATEMENT_MAX_LENGTH);

    let text = match (row.detail.number, row.detail.severity) {
        (Some(number), Some(severity)) => {
            format!("{message}\n(error {number}, severity {severity})")
        }
        (Some(number), None) => format!("{message}\n(error {number})"),
        _ => message,
    };

    if row.detail.severity.unwrap_or(0) >= HIGH_SEVERITY {
        console::style(text).red().to_string()
    } else {
        console::style(text).yellow().to_string()
    }
}

/// Grade the duration: red above 30s, yellow above 10s
fn format_duration(duration_ms: f64) -> String {
    let text = format!("{duration_ms:.0}");

    if duration_ms > 30_000.0 {
        console::style(text).red().bold().to_string()
    } else if duration_ms > 10_000.0 {
        console::style(text).yellow().to_string()
    } else {
        text
    }
}

/// Statement text with the optional resource metrics appended
fn format_statement_with_metrics(row: &SlowQueryRow) -> String {
    let statement = truncate(&row.statement, STATEMENT_MAX_LENGTH);

    let metrics: Vec<String> = [
        row.cpu_time_ms.map(|cpu| format!("cpu {cpu:.0}ms")),
        row.logical_reads.map(|reads| format!("{reads:.0} reads")),
    ]
    .into_iter()
    .flatten()
    .collect();

    if metrics.is_empty() {
        statement
    } else {
        format!(
            "{statement}\n{}",
            console::style(metrics.join(", ")).dim()
        )
    }
}

fn truncate(text: &str, max_length: usize) -> String {
    let trimmed = text.trim();

    if trimmed.chars().count() > max_length {
        format!(
            "{}...",
            trimmed.chars().take(max_length - 3).collect::<String>()
        )
    } else {
        trimmed.to_string()
    }
}

fn placeholder(text: &str) -> String {
    if text.is_empty() {
        "NA".into()
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_long_statements_with_ellipsis() {
        let long = "x".repeat(200);
        let truncated = truncate(&long, 100);
        assert_eq!(truncated.chars().count(), 100);
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn short_statements_pass_through() {
        assert_eq!(truncate("  SELECT 1  ", 100), "SELECT 1");
    }

    #[test]
    fn empty_fields_show_placeholder() {
        assert_eq!(placeholder(""), "NA");
        assert_eq!(placeholder("orders"), "orders");
    }

    #[test]
    fn duration_grading_thresholds() {
        // Styling is stripped when not a terminal, but the number survives
        assert!(format_duration(5_000.0).contains("5000"));
        assert!(format_duration(12_345.6).contains("12346"));
        assert!(format_duration(45_000.0).contains("45000"));
    }
}
