//! Typed result rows mapped out of a Log Analytics result table.
//!
//! Rows are constructed once per query and never mutated. Mapping preserves
//! the order the service returned (the query's own sort clause), so the
//! presenter can rely on it.

use crate::api::query::Table;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Error details carried in the audit event's additional_information_s XML
/// fragment
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorDetail {
    pub number: Option<i64>,
    pub severity: Option<i64>,
    pub message: String,
}

/// One failed SQL statement from the audit log
#[derive(Debug, Clone)]
pub struct ErrorRow {
    pub timestamp: DateTime<Utc>,
    pub database: String,
    pub principal: String,
    pub action: String,
    pub statement: String,
    pub detail: ErrorDetail,
}

/// One statement that exceeded the duration threshold
#[derive(Debug, Clone)]
pub struct SlowQueryRow {
    pub timestamp: DateTime<Utc>,
    pub statement: String,
    pub duration_ms: f64,
    pub database: String,
    pub principal: String,
    pub cpu_time_ms: Option<f64>,
    pub logical_reads: Option<f64>,
}

/// Map the audit-event table into error rows
///
/// A row without a parseable timestamp is skipped with a warning instead of
/// failing the whole batch.
pub fn error_rows(table: &Table) -> Vec<ErrorRow> {
    let time = table.column_index("TimeGenerated");
    let database = table.column_index("database_name_s");
    let statement = table.column_index("statement_s");
    let principal = table.column_index("server_principal_name_s");
    let action = table.column_index("action_name_s");
    let info = table.column_index("additional_information_s");

    table
        .rows
        .iter()
        .filter_map(|row| {
            let Some(timestamp) = time.and_then(|i| timestamp_cell(row.get(i))) else {
                log::warn!("Skipping audit row without a timestamp");
                return None;
            };

            Some(ErrorRow {
                timestamp,
                database: string_cell(database.and_then(|i| row.get(i))),
                principal: string_cell(principal.and_then(|i| row.get(i))),
                action: string_cell(action.and_then(|i| row.get(i))),
                statement: string_cell(statement.and_then(|i| row.get(i))),
                detail: parse_additional_info(&string_cell(info.and_then(|i| row.get(i)))),
            })
        })
        .collect()
}

/// Map the duration table into slow-query rows
pub fn slow_query_rows(table: &Table) -> Vec<SlowQueryRow> {
    let time = table.column_index("TimeGenerated");
    let statement = table.column_index("statement_s");
    let duration = table.column_index("duration_milliseconds_d");
    let database = table.column_index("database_name_s");
    let principal = table.column_index("server_principal_name_s");
    let cpu = table.column_index("cpu_time_d");
    let reads = table.column_index("logical_reads_d");

    table
        .rows
        .iter()
        .filter_map(|row| {
            let Some(timestamp) = time.and_then(|i| timestamp_cell(row.get(i))) else {
                log::warn!("Skipping slow-query row without a timestamp");
                return None;
            };

            let Some(duration_ms) = duration.and_then(|i| number_cell(row.get(i))) else {
                log::warn!("Skipping slow-query row without a duration");
                return None;
            };

            Some(SlowQueryRow {
                timestamp,
                statement: string_cell(statement.and_then(|i| row.get(i))),
                duration_ms,
                database: string_cell(database.and_then(|i| row.get(i))),
                principal: string_cell(principal.and_then(|i| row.get(i))),
                cpu_time_ms: cpu.and_then(|i| number_cell(row.get(i))),
                logical_reads: reads.and_then(|i| number_cell(row.get(i))),
            })
        })
        .collect()
}

/// Extract error number, severity, and message from the audit XML fragment
///
/// The fragment is a flat `<action_info>` element. A full XML parser buys
/// nothing here; the three known tags are pulled out directly, and anything
/// unrecognized falls back to the raw text as the message.
pub fn parse_additional_info(info: &str) -> ErrorDetail {
    let trimmed = info.trim();

    if trimmed.is_empty() {
        return ErrorDetail {
            number: None,
            severity: None,
            message: "Unknown error".into(),
        };
    }

    if !trimmed.starts_with('<') {
        return ErrorDetail {
            number: None,
            severity: None,
            message: trimmed.to_string(),
        };
    }

    let number = tag_text(trimmed, "error_number")
        .or_else(|| tag_text(trimmed, "err_number"))
        .and_then(|text| text.parse().ok());
    let severity = tag_text(trimmed, "severity").and_then(|text| text.parse().ok());
    let message = tag_text(trimmed, "error_message")
        .or_else(|| tag_text(trimmed, "message"))
        .unwrap_or_else(|| trimmed.to_string());

    ErrorDetail {
        number,
        severity,
        message,
    }
}

/// Text content of the first `<tag>...</tag>` occurrence
fn tag_text(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");

    let start = xml.find(&open)? + open.len();
    let end = xml[start..].find(&close)? + start;
    let text = xml[start..end].trim();

    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn string_cell(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn number_cell(value: Option<&Value>) -> Option<f64> {
    match value {
        Some(Value::Number(number)) => number.as_f64(),
        // The service occasionally stringifies numeric columns
        Some(Value::String(text)) => text.parse().ok(),
        _ => None,
    }
}

fn timestamp_cell(value: Option<&Value>) -> Option<DateTime<Utc>> {
    match value {
        Some(Value::String(text)) => DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|parsed| parsed.with_timezone(&Utc)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::query::Response;

    fn errors_table() -> Table {
        let body = r#"{
            "tables": [{
                "name": "PrimaryResult",
                "columns": [
                    {"name": "TimeGenerated", "type": "datetime"},
                    {"name": "database_name_s", "type": "string"},
                    {"name": "statement_s", "type": "string"},
                    {"name": "server_principal_name_s", "type": "string"},
                    {"name": "action_name_s", "type": "string"},
                    {"name": "additional_information_s", "type": "string"}
                ],
                "rows": [
                    ["2026-08-25T10:05:00Z", "orders", "SELECT 1/0", "app_user", "BATCH COMPLETED",
                     "<action_info><error_number>8134</error_number><severity>16</severity><error_message>Divide by zero error encountered.</error_message></action_info>"],
                    ["2026-08-25T10:01:00Z", "billing", "EXEC broken_proc", "svc", "BATCH COMPLETED", "plain failure text"]
                ]
            }]
        }"#;

        serde_json::from_str::<Response>(body)
            .unwrap()
            .tables
            .remove(0)
    }

    #[test]
    fn maps_error_rows_in_order() {
        let rows = error_rows(&errors_table());
        assert_eq!(rows.len(), 2);

        // Source ordering (newest first) is preserved
        assert!(rows[0].timestamp > rows[1].timestamp);
        assert_eq!(rows[0].database, "orders");
        assert_eq!(rows[0].detail.number, Some(8134));
        assert_eq!(rows[0].detail.severity, Some(16));
        assert_eq!(rows[0].detail.message, "Divide by zero error encountered.");

        // Non-XML detail falls back to the raw text
        assert_eq!(rows[1].detail.message, "plain failure text");
        assert_eq!(rows[1].detail.number, None);
    }

    #[test]
    fn maps_columns_by_name_not_position() {
        // Same data with the projection shuffled
        let body = r#"{
            "tables": [{
                "name": "PrimaryResult",
                "columns": [
                    {"name": "database_name_s", "type": "string"},
                    {"name": "TimeGenerated", "type": "datetime"},
                    {"name": "statement_s", "type": "string"}
                ],
                "rows": [["orders", "2026-08-25T10:05:00Z", "SELECT 1"]]
            }]
        }"#;

        let table = serde_json::from_str::<Response>(body)
            .unwrap()
            .tables
            .remove(0);
        let rows = error_rows(&table);
        assert_eq!(rows[0].database, "orders");
        assert_eq!(rows[0].statement, "SELECT 1");
    }

    #[test]
    fn empty_table_maps_to_empty_vec() {
        let mut table = errors_table();
        table.rows.clear();
        assert!(error_rows(&table).is_empty());

        let slow = serde_json::from_str::<Response>(
            r#"{"tables": [{"name": "PrimaryResult", "columns": [], "rows": []}]}"#,
        )
        .unwrap()
        .tables
        .remove(0);
        assert!(slow_query_rows(&slow).is_empty());
    }

    #[test]
    fn maps_slow_query_rows_with_optional_metrics() {
        let body = r#"{
            "tables": [{
                "name": "PrimaryResult",
                "columns": [
                    {"name": "TimeGenerated", "type": "datetime"},
                    {"name": "statement_s", "type": "string"},
                    {"name": "duration_milliseconds_d", "type": "real"},
                    {"name": "database_name_s", "type": "string"},
                    {"name": "server_principal_name_s", "type": "string"},
                    {"name": "cpu_time_d", "type": "real"}
                ],
                "rows": [
                    ["2026-08-25T10:00:00Z", "SELECT * FROM big", 12000.0, "orders", "app_user", 9500.0],
                    ["2026-08-25T09:59:00Z", "UPDATE slow", 6000.5, "orders", "app_user", null]
                ]
            }]
        }"#;

        let table = serde_json::from_str::<Response>(body)
            .unwrap()
            .tables
            .remove(0);
        let rows = slow_query_rows(&table);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].duration_ms, 12000.0);
        assert_eq!(rows[0].cpu_time_ms, Some(9500.0));
        assert_eq!(rows[0].logical_reads, None);
        assert_eq!(rows[1].cpu_time_ms, None);
    }

    #[test]
    fn skips_rows_missing_required_cells() {
        let body = r#"{
            "tables": [{
                "name": "PrimaryResult",
                "columns": [
                    {"name": "TimeGenerated", "type": "datetime"},
                    {"name": "statement_s", "type": "string"},
                    {"name": "duration_milliseconds_d", "type": "real"}
                ],
                "rows": [
                    [null, "no timestamp", 8000.0],
                    ["2026-08-25T10:00:00Z", "no duration", null],
                    ["2026-08-25T10:00:00Z", "good", 7000.0]
                ]
            }]
        }"#;

        let table = serde_json::from_str::<Response>(body)
            .unwrap()
            .tables
            .remove(0);
        let rows = slow_query_rows(&table);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].statement, "good");
    }

    #[test]
    fn stringified_duration_still_maps() {
        assert_eq!(
            number_cell(Some(&Value::String("4000.5".into()))),
            Some(4000.5)
        );
    }

    #[test]
    fn client_side_threshold_simulation_excludes_at_threshold() {
        // Simulates the service-side filter: 4000ms must not survive a
        // 5000ms threshold, and neither must exactly 5000ms
        let durations = [4000.0_f64, 5000.0, 5000.1, 12000.0];
        let threshold = 5000.0;
        let surviving: Vec<f64> = durations
            .iter()
            .copied()
            .filter(|duration| *duration > threshold)
            .collect();
        assert_eq!(surviving, vec![5000.1, 12000.0]);
    }

    #[test]
    fn additional_info_unknown_xml_falls_back_to_raw() {
        let detail = parse_additional_info("<action_info><other>x</other></action_info>");
        assert_eq!(detail.number, None);
        assert!(detail.message.starts_with("<action_info>"));
    }

    #[test]
    fn additional_info_empty_is_unknown() {
        assert_eq!(parse_additional_info("  ").message, "Unknown error");
    }
}
