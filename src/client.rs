use crate::api::query;
use crate::config::Config;
use crate::credentials::{self, AccessToken};
use crate::error::{Error, Kind};
use crate::kql;
use crate::rows::{self, ErrorRow, SlowQueryRow};
use eyre::{Ok, WrapErr};
use reqwest::StatusCode;

const API_BASE: &str = "https://api.loganalytics.io/v1";

/// Thin client over the Log Analytics query endpoint
///
/// Holds the workspace id and a token for the process lifetime. Each fetch
/// is a single round trip; no retries, no caching, no pagination.
pub struct LogsClient {
    workspace_id: String,
    access_token: AccessToken,
    client: reqwest::Client,
}

impl LogsClient {
    /// Run the credential chain and hold a client for the workspace
    ///
    /// The workspace id was already validated with the rest of the
    /// configuration, before any network activity.
    pub async fn connect(config: &Config) -> eyre::Result<Self> {
        let access_token = credentials::acquire().await?;

        if access_token.is_expired() {
            return Err(Error::new(
                Kind::AuthenticationFailed,
                "The acquired Azure token is already expired",
                Some("Run `az login` to refresh your session."),
            )
            .into());
        }

        Ok(LogsClient {
            workspace_id: config.workspace_id.clone(),
            access_token,
            client: reqwest::Client::new(),
        })
    }

    /// Failed SQL statements in the trailing window, newest first
    pub async fn recent_errors(&self, window_minutes: u32) -> eyre::Result<Vec<ErrorRow>> {
        let table = self
            .query(&kql::recent_errors(window_minutes), window_minutes)
            .await?;

        Ok(table.as_ref().map(rows::error_rows).unwrap_or_default())
    }

    /// Statements above the duration threshold, slowest first
    pub async fn slow_queries(
        &self,
        window_minutes: u32,
        threshold_ms: u64,
    ) -> eyre::Result<Vec<SlowQueryRow>> {
        let table = self
            .query(&kql::slow_queries(window_minutes, threshold_ms), window_minutes)
            .await?;

        Ok(table.as_ref().map(rows::slow_query_rows).unwrap_or_default())
    }

    /// One blocking round trip to the query endpoint
    ///
    /// Returns the primary result table, or None when the response carries
    /// no tables at all (the service's way of saying "nothing matched").
    async fn query(&self, kql_text: &str, window_minutes: u32) -> eyre::Result<Option<query::Table>> {
        let url = format!("{API_BASE}/workspaces/{}/query", self.workspace_id);
        log::debug!("Query:\n{kql_text}");

        let result = self
            .client
            .post(&url)
            .bearer_auth(self.access_token.secret())
            .json(&query::Request {
                query: kql_text.to_string(),
                timespan: kql::timespan(window_minutes),
            })
            .send()
            .await
            .inspect_err(|err| log::error!("{err:?}"))
            .wrap_err(Error::new(
                Kind::WorkspaceUnreachable,
                "Network request to Log Analytics failed",
                Some("Check your connection and try again."),
            ))?;

        let status = result.status();
        let text = result.text().await?;
        log::info!("Got status from {url}: {status}");
        log::debug!("Got response from {url}: {text}");

        if status == StatusCode::BAD_REQUEST {
            // The queries are fixed strings, so a rejection is a defect
            let detail = serde_json::from_str::<query::ErrorResponse>(&text)
                .map(|body| format!("{}: {}", body.error.code, body.error.message))
                .unwrap_or(text);
            log::error!("Query rejected: {detail}");

            return Err(Error::new(
                Kind::QueryMalformed,
                "Log Analytics rejected the query",
                Some("This is a bug in azsqldiag; please report it."),
            )
            .into());
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(Error::new(
                Kind::AuthenticationFailed,
                "Log Analytics rejected the credentials",
                Some("Check that your account can read the workspace."),
            )
            .into());
        }

        if !status.is_success() {
            log::error!("Query failed ({status}): {text}");
            return Err(Error::new(
                Kind::WorkspaceUnreachable,
                "Log Analytics returned an error",
                Some("The workspace may be unavailable; try again."),
            )
            .into());
        }

        let response: query::Response =
            serde_json::from_str(&text).wrap_err("Could not parse the query response")?;

        // The primary result is the first table; zero tables means zero rows
        Ok(response.tables.into_iter().next())
    }
}
