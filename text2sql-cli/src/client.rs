//! HTTP client for the text2sql server
//!
//! Endpoint resolution: `--endpoint` / `TEXT2SQL_ENDPOINT`, then
//! `[client].endpoint` in config.toml, then the default.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::ValueEnum;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use text2sql_core::config::config_dir;
use text2sql_core::AppConfig;

#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    #[default]
    Human,
    /// JSON output (for piping to jq)
    Json,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
    #[serde(default)]
    message: Option<String>,
}

pub struct ApiClient {
    http: Client,
    endpoint: String,
}

impl ApiClient {
    pub fn new(endpoint_flag: Option<&str>) -> Result<Self> {
        let http = Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            endpoint: resolve_endpoint(endpoint_flag),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint.trim_end_matches('/'), path)
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.http.get(self.url(path))
    }

    pub fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> RequestBuilder {
        self.http.post(self.url(path)).json(body)
    }

    pub fn delete(&self, path: &str) -> RequestBuilder {
        self.http.delete(self.url(path))
    }

    pub async fn send(&self, request: RequestBuilder) -> Result<Response> {
        request
            .send()
            .await
            .with_context(|| format!("Failed to connect to text2sql server at {}", self.endpoint))
    }
}

fn resolve_endpoint(flag: Option<&str>) -> String {
    if let Some(ep) = flag.filter(|e| !e.trim().is_empty()) {
        return ep.to_owned();
    }

    match AppConfig::load() {
        Ok(config) => config.client.endpoint,
        Err(e) => {
            tracing::debug!(error = %e, "config not loaded; using default endpoint");
            AppConfig::default().client.endpoint
        }
    }
}

/// Decode a success body or turn `{"error", "message"}` into an error.
pub async fn handle_response<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        response.json::<T>().await.context("Failed to parse response")
    } else {
        Err(error_from(status, response).await)
    }
}

/// Like [`handle_response`] for endpoints that reply without a body.
pub async fn expect_success(response: Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(error_from(status, response).await)
    }
}

async fn error_from(status: StatusCode, response: Response) -> anyhow::Error {
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    match serde_json::from_str::<ErrorResponse>(&error_text) {
        Ok(ErrorResponse {
            message: Some(message),
            ..
        }) => anyhow!("{}: {}", status, message),
        Ok(ErrorResponse { error, .. }) => anyhow!("{}: {}", status, error),
        Err(_) => anyhow!("{}: {}", status, error_text),
    }
}

// ============================================================================
// Session token (~/.text2sql/session)
// ============================================================================

fn session_path() -> Result<PathBuf> {
    config_dir()
        .map(|d| d.join("session"))
        .context("Could not determine home directory")
}

pub fn save_session(token: &str) -> Result<()> {
    let path = session_path()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(&path, token).with_context(|| format!("Failed to write {}", path.display()))
}

pub fn load_session() -> Result<String> {
    let path = session_path()?;
    let token = std::fs::read_to_string(&path)
        .map_err(|_| anyhow!("Not logged in. Run `text2sql auth login` first"))?;
    Ok(token.trim().to_owned())
}

pub fn clear_session() -> Result<()> {
    let path = session_path()?;
    if path.exists() {
        std::fs::remove_file(&path)
            .with_context(|| format!("Failed to remove {}", path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_endpoint_wins() {
        assert_eq!(resolve_endpoint(Some("http://db-box:9000")), "http://db-box:9000");
    }

    #[test]
    fn url_joins_without_double_slash() {
        let client = ApiClient::new(Some("http://localhost:8000/")).unwrap();
        assert_eq!(client.url("/databases"), "http://localhost:8000/databases");
        assert_eq!(client.endpoint(), "http://localhost:8000/");
    }
}
