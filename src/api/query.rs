//! Wire types for the Log Analytics query endpoint
//! (`POST /v1/workspaces/{id}/query`).

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize)]
pub struct Request {
    pub query: String,
    /// ISO-8601 duration restricting the query, e.g. "PT10M"
    pub timespan: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Response {
    #[serde(default)]
    pub tables: Vec<Table>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl Table {
    /// Index of a projected column by name
    ///
    /// Rows are positional; looking columns up by name keeps the mapping
    /// correct even if the projection order changes.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }
}

/// Error body returned by the service on a rejected query
#[derive(Debug, Deserialize, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_query_response() {
        let body = r#"{
            "tables": [{
                "name": "PrimaryResult",
                "columns": [
                    {"name": "TimeGenerated", "type": "datetime"},
                    {"name": "database_name_s", "type": "string"}
                ],
                "rows": [["2026-08-25T10:00:00Z", "orders"]]
            }]
        }"#;

        let response: Response = serde_json::from_str(body).unwrap();
        let table = &response.tables[0];
        assert_eq!(table.column_index("database_name_s"), Some(1));
        assert_eq!(table.column_index("missing"), None);
        assert_eq!(table.rows.len(), 1);
    }

    #[test]
    fn parses_empty_response() {
        let response: Response = serde_json::from_str("{}").unwrap();
        assert!(response.tables.is_empty());
    }

    #[test]
    fn parses_error_body() {
        let body = r#"{"error": {"code": "BadArgumentError", "message": "The request had some invalid properties"}}"#;
        let error: ErrorResponse = serde_json::from_str(body).unwrap();
        assert_eq!(error.error.code, "BadArgumentError");
    }
}
