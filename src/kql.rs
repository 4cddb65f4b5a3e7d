//! The two fixed KQL queries this tool knows how to ask.
//!
//! Both read SQL audit events from the `AzureDiagnostics` table. The system
//! `master` database is excluded as it only produces noise from maintenance
//! sessions.

/// Failed SQL statements in the trailing window, newest first
pub fn recent_errors(window_minutes: u32) -> String {
    format!(
        r#"AzureDiagnostics
| where TimeGenerated > ago({window_minutes}m)
| where Category == "SQLSecurityAuditEvents"
| where database_name_s != "master"
| where succeeded_s =~ "false"
| project TimeGenerated, database_name_s, statement_s, server_principal_name_s, action_name_s, additional_information_s
| order by TimeGenerated desc"#
    )
}

/// Statements over the duration threshold in the trailing window, slowest first
///
/// The threshold comparison is strictly greater-than: a statement taking
/// exactly `threshold_ms` is not reported.
pub fn slow_queries(window_minutes: u32, threshold_ms: u64) -> String {
    format!(
        r#"AzureDiagnostics
| where TimeGenerated > ago({window_minutes}m)
| where Category == "SQLSecurityAuditEvents"
| where database_name_s != "master"
| where duration_milliseconds_d > {threshold_ms}
| project TimeGenerated, statement_s, duration_milliseconds_d, database_name_s, server_principal_name_s, cpu_time_d, logical_reads_d
| order by duration_milliseconds_d desc"#
    )
}

/// ISO-8601 duration for the query timespan body field, e.g. PT10M
pub fn timespan(window_minutes: u32) -> String {
    format!("PT{window_minutes}M")
}
