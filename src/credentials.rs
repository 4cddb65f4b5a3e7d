//! Ordered credential chain for the Log Analytics API.
//!
//! Providers are tried in a fixed order, first success wins:
//!
//! 1. Service principal from AZURE_TENANT_ID / AZURE_CLIENT_ID /
//!    AZURE_CLIENT_SECRET (client-credentials grant)
//! 2. An existing Azure CLI session (`az account get-access-token`)
//! 3. Interactive browser login (authorization code + PKCE on a loopback
//!    redirect), which blocks until the user completes it
//!
//! Only when all three are exhausted does the chain fail.

use crate::error::{Error, Kind};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use eyre::{Context, ContextCompat};
use rand::RngCore;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use url::Url;

const RESOURCE: &str = "https://api.loganalytics.io";
const SCOPE: &str = "https://api.loganalytics.io/.default";
const AUTHORITY: &str = "https://login.microsoftonline.com";

/// Well-known Azure CLI public client, usable for loopback logins without
/// registering an app
const PUBLIC_CLIENT_ID: &str = "04b07795-8ddb-461a-bbee-02f9e1bf7b46";

/// Bearer token for the Log Analytics API
///
/// Held in memory for the process lifetime, never written to disk.
#[derive(Debug, Clone)]
pub struct AccessToken {
    secret: String,
    pub expires_on: DateTime<Utc>,
}

impl AccessToken {
    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn is_expired(&self) -> bool {
        self.expires_on.timestamp() <= Utc::now().timestamp()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

impl From<TokenResponse> for AccessToken {
    fn from(response: TokenResponse) -> Self {
        AccessToken {
            secret: response.access_token,
            expires_on: Utc::now() + Duration::seconds(response.expires_in),
        }
    }
}

/// Walk the chain and return the first token obtained
pub async fn acquire() -> eyre::Result<AccessToken> {
    if let Some(token) = from_environment().await? {
        println!(
            "{}",
            console::style("Using service principal from environment").dim()
        );
        return Ok(token);
    }

    if let Some(token) = from_azure_cli().await {
        println!(
            "{}",
            console::style("Using existing Azure CLI session").dim()
        );
        return Ok(token);
    }

    println!(
        "{}",
        console::style("No existing Azure authentication found. Opening browser for login...")
            .yellow()
    );

    from_browser().await.wrap_err(Error::new(
        Kind::AuthenticationFailed,
        "Could not authenticate with Azure",
        Some("Set service principal variables, run `az login`, or complete the browser login."),
    ))
}

/// Client-credentials grant with a service principal from the environment
///
/// Returns None (not an error) when the variables are absent, so the chain
/// moves on. A present-but-rejected principal is an error: silently falling
/// through would mask a misconfiguration.
async fn from_environment() -> eyre::Result<Option<AccessToken>> {
    let (Ok(tenant), Ok(client_id), Ok(secret)) = (
        std::env::var("AZURE_TENANT_ID"),
        std::env::var("AZURE_CLIENT_ID"),
        std::env::var("AZURE_CLIENT_SECRET"),
    ) else {
        log::debug!("Service principal variables not set, skipping environment credential");
        return Ok(None);
    };

    log::info!("Requesting token via client-credentials grant for {client_id}");

    let response = reqwest::Client::new()
        .post(format!("{AUTHORITY}/{tenant}/oauth2/v2.0/token"))
        .form(&[
            ("client_id", client_id.as_str()),
            ("client_secret", secret.as_str()),
            ("grant_type", "client_credentials"),
            ("scope", SCOPE),
        ])
        .send()
        .await
        .inspect_err(|e| log::error!("Token request failed: {e:?}"))
        .wrap_err(Error::new(
            Kind::AuthenticationFailed,
            "Could not reach the Azure login endpoint",
            Some("Check your network connection."),
        ))?;

    let status = response.status();
    let text = response.text().await?;
    log::debug!("Token endpoint returned {status}");

    if !status.is_success() {
        log::error!("Client-credentials grant rejected: {text}");
        return Err(Error::new(
            Kind::AuthenticationFailed,
            "Azure rejected the service principal from the environment",
            Some("Check AZURE_TENANT_ID, AZURE_CLIENT_ID and AZURE_CLIENT_SECRET."),
        )
        .into());
    }

    let token: TokenResponse = serde_json::from_str(&text).wrap_err("Could not parse token")?;
    Ok(Some(token.into()))
}

/// Reuse an `az login` session
///
/// Any failure here (no binary, no session) moves the chain on.
async fn from_azure_cli() -> Option<AccessToken> {
    let output = tokio::process::Command::new("az")
        .args([
            "account",
            "get-access-token",
            "--resource",
            RESOURCE,
            "--output",
            "json",
        ])
        .output()
        .await
        .inspect_err(|e| log::debug!("Azure CLI not available: {e:?}"))
        .ok()?;

    if !output.status.success() {
        log::debug!(
            "az account get-access-token failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        return None;
    }

    parse_az_token(&String::from_utf8_lossy(&output.stdout))
        .inspect_err(|e| log::warn!("Could not parse Azure CLI token output: {e:?}"))
        .ok()
}

#[derive(Debug, Deserialize)]
struct AzTokenOutput {
    #[serde(rename = "accessToken")]
    access_token: String,
    /// Unix timestamp, present in recent az versions
    #[serde(rename = "expires_on")]
    expires_on: Option<i64>,
}

fn parse_az_token(stdout: &str) -> eyre::Result<AccessToken> {
    let parsed: AzTokenOutput = serde_json::from_str(stdout).wrap_err("Invalid az output")?;

    // Older az versions only emit a local-time string; assume a short
    // lifetime instead of parsing it
    let expires_on = parsed
        .expires_on
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .unwrap_or_else(|| Utc::now() + Duration::minutes(5));

    Ok(AccessToken {
        secret: parsed.access_token,
        expires_on,
    })
}

/// Authorization-code grant with PKCE on a loopback redirect
///
/// Binds an ephemeral localhost port, points the system browser at the
/// authorize URL, and blocks until the redirect delivers the code.
async fn from_browser() -> eyre::Result<AccessToken> {
    let tenant = std::env::var("AZURE_TENANT_ID").unwrap_or_else(|_| "organizations".into());
    let (verifier, challenge) = pkce_pair();
    let state = random_urlsafe(16);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .wrap_err("Could not bind a loopback port for the login redirect")?;
    let redirect_uri = format!("http://localhost:{}", listener.local_addr()?.port());

    let mut authorize_url = Url::parse(&format!("{AUTHORITY}/{tenant}/oauth2/v2.0/authorize"))?;
    authorize_url
        .query_pairs_mut()
        .append_pair("client_id", PUBLIC_CLIENT_ID)
        .append_pair("response_type", "code")
        .append_pair("redirect_uri", &redirect_uri)
        .append_pair("scope", SCOPE)
        .append_pair("code_challenge", &challenge)
        .append_pair("code_challenge_method", "S256")
        .append_pair("state", &state)
        .append_pair("prompt", "select_account");

    println!(
        "Please complete the authentication in your browser and wait for it to finish.\n\
         If no browser opened, visit:\n{}",
        console::style(authorize_url.as_str()).underlined()
    );
    open_browser(authorize_url.as_str());

    let code = wait_for_code(&listener, &state).await?;

    log::info!("Exchanging authorization code for a token");

    let response = reqwest::Client::new()
        .post(format!("{AUTHORITY}/{tenant}/oauth2/v2.0/token"))
        .form(&[
            ("client_id", PUBLIC_CLIENT_ID),
            ("grant_type", "authorization_code"),
            ("code", &code),
            ("redirect_uri", &redirect_uri),
            ("code_verifier", &verifier),
            ("scope", SCOPE),
        ])
        .send()
        .await
        .wrap_err("Could not reach the Azure token endpoint")?;

    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        log::error!("Code exchange rejected: {text}");
        return Err(eyre::eyre!("Azure rejected the authorization code"));
    }

    let token: TokenResponse = serde_json::from_str(&text).wrap_err("Could not parse token")?;
    Ok(token.into())
}

/// Accept one redirect connection and extract the authorization code
async fn wait_for_code(listener: &tokio::net::TcpListener, state: &str) -> eyre::Result<String> {
    let (mut stream, _) = listener
        .accept()
        .await
        .wrap_err("Login redirect never arrived")?;

    let mut buffer = vec![0_u8; 8192];
    let read = stream.read(&mut buffer).await?;
    let request = String::from_utf8_lossy(&buffer[..read]).to_string();

    let result = parse_redirect(&request, state);

    let body = match &result {
        Ok(_) => "Login complete. You can close this tab and return to the terminal.",
        Err(_) => "Login failed. Return to the terminal for details.",
    };
    let _ = stream
        .write_all(
            format!(
                "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            )
            .as_bytes(),
        )
        .await;

    result
}

/// Pull the code out of the redirect request line, verifying state
fn parse_redirect(request: &str, expected_state: &str) -> eyre::Result<String> {
    let path = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .wrap_err("Malformed redirect request")?;

    let url = Url::parse(&format!("http://localhost{path}")).wrap_err("Malformed redirect URL")?;

    let mut code = None;
    let mut state = None;
    let mut error = None;

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.to_string()),
            "state" => state = Some(value.to_string()),
            "error_description" | "error" if error.is_none() => error = Some(value.to_string()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Err(eyre::eyre!("Login was not completed: {error}"));
    }

    if state.as_deref() != Some(expected_state) {
        return Err(eyre::eyre!("Login redirect carried an unexpected state"));
    }

    code.wrap_err("Login redirect carried no authorization code")
}

/// Verifier and its S256 challenge
fn pkce_pair() -> (String, String) {
    let verifier = random_urlsafe(32);
    let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
    (verifier, challenge)
}

fn random_urlsafe(bytes: usize) -> String {
    let mut buffer = vec![0_u8; bytes];
    rand::thread_rng().fill_bytes(&mut buffer);
    URL_SAFE_NO_PAD.encode(buffer)
}

/// Best-effort system browser launch; the URL is printed either way
fn open_browser(url: &str) {
    #[cfg(target_os = "macos")]
    let command = ("open", vec![url]);
    #[cfg(target_os = "windows")]
    let command = ("cmd", vec!["/C", "start", url]);
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let command = ("xdg-open", vec![url]);

    if let Err(e) = std::process::Command::new(command.0)
        .args(&command.1)
        .spawn()
    {
        log::debug!("Could not launch a browser: {e:?}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pkce_challenge_matches_verifier() {
        let (verifier, challenge) = pkce_pair();
        assert_eq!(
            challenge,
            URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
        );
        // RFC 7636 requires 43..=128 chars
        assert!(verifier.len() >= 43);
        // Hex digests are a classic PKCE mistake; S256 must be base64url
        assert!(!challenge.contains('='));
    }

    #[test]
    fn redirect_parsing_extracts_code() {
        let request = "GET /?code=abc123&state=xyz HTTP/1.1\r\nHost: localhost\r\n\r\n";
        assert_eq!(parse_redirect(request, "xyz").unwrap(), "abc123");
    }

    #[test]
    fn redirect_with_wrong_state_is_rejected() {
        let request = "GET /?code=abc123&state=evil HTTP/1.1\r\n\r\n";
        assert!(parse_redirect(request, "xyz").is_err());
    }

    #[test]
    fn redirect_with_error_is_rejected() {
        let request =
            "GET /?error=access_denied&error_description=User+cancelled&state=xyz HTTP/1.1\r\n\r\n";
        let error = parse_redirect(request, "xyz").unwrap_err();
        assert!(error.to_string().contains("not completed"));
    }

    #[test]
    fn parses_az_cli_output() {
        let token = parse_az_token(
            r#"{"accessToken": "token-value", "expires_on": 4102444800, "tokenType": "Bearer"}"#,
        )
        .unwrap();
        assert_eq!(token.secret(), "token-value");
        assert!(!token.is_expired());
    }

    #[test]
    fn az_output_without_unix_expiry_gets_short_lifetime() {
        let token = parse_az_token(
            r#"{"accessToken": "token-value", "expiresOn": "2026-08-25 11:00:00.000000"}"#,
        )
        .unwrap();
        assert!(!token.is_expired());
        assert!(token.expires_on <= Utc::now() + Duration::minutes(5));
    }

    #[test]
    fn expired_token_is_detected() {
        let token = AccessToken {
            secret: "t".into(),
            expires_on: Utc::now() - Duration::seconds(1),
        };
        assert!(token.is_expired());
    }
}
