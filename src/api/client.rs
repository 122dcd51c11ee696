//! Implements the `Transport` trait over HTTPS with `reqwest`.

use crate::api::error::ApiError;
use crate::api::retry::{self, RetryPolicy};
use crate::api::Transport;
use crate::Result;
use anyhow::{ensure, Context};
use reqwest::header::ACCEPT;
use reqwest::{Method, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, error, warn};
use url::Url;

pub const DEFAULT_ENDPOINT: &str = "https://api.smartsheet.com/2.0";

const USER_AGENT: &str = concat!("smartsheet-mcp/", env!("CARGO_PKG_VERSION"));

/// Talks to the Smartsheet REST API with a bearer token. Rate-limited requests (`429`) are retried
/// according to the `RetryPolicy`; every other failure is returned to the caller right away.
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
    retry: RetryPolicy,
}

impl HttpTransport {
    pub fn new(base_url: &str, access_token: &str, retry: RetryPolicy) -> Result<Self> {
        ensure!(
            !access_token.trim().is_empty(),
            "A Smartsheet API access token is required, set SMARTSHEET_API_KEY"
        );
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        Url::parse(&base_url).with_context(|| format!("Invalid Smartsheet endpoint '{base_url}'"))?;
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Unable to build the HTTP client")?;
        Ok(Self {
            http,
            base_url,
            access_token: access_token.to_string(),
            retry,
        })
    }

    fn url(&self, path: &str) -> Result<Url> {
        let path = path.trim_start_matches('/');
        let joined = format!("{}/{path}", self.base_url);
        Url::parse(&joined).with_context(|| format!("Invalid request URL '{joined}'"))
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        query: &[(&str, Option<String>)],
    ) -> Result<Value> {
        let url = self.url(path)?;
        let pairs: Vec<(&str, &str)> = query
            .iter()
            .filter_map(|(k, v)| v.as_deref().map(|v| (*k, v)))
            .collect();

        let mut attempt = 0;
        loop {
            debug!("API Request: {method} {path} {pairs:?}");
            let mut builder = self
                .http
                .request(method.clone(), url.clone())
                .bearer_auth(&self.access_token)
                .header(ACCEPT, "application/json");
            if !pairs.is_empty() {
                builder = builder.query(&pairs);
            }
            if let Some(body) = &body {
                builder = builder.json(body);
            }

            let response = builder.send().await.map_err(ApiError::Transport)?;
            let status = response.status();
            if status.is_success() {
                debug!("API Response: {method} {path} {status}");
                return read_json(response).await;
            }

            let retry_after = retry::retry_after(response.headers());
            if status == StatusCode::TOO_MANY_REQUESTS && attempt < self.retry.max_retries {
                let delay = self.retry.delay(attempt, retry_after);
                attempt += 1;
                warn!(
                    "Rate limited on {method} {path}, retry {attempt}/{} in {}ms",
                    self.retry.max_retries,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            let text = response.text().await.unwrap_or_default();
            let e = ApiError::from_response(status, retry_after, &text);
            error!("API Error: {method} {path}: {e}");
            return Err(e.into());
        }
    }
}

async fn read_json(response: Response) -> Result<Value> {
    let text = response.text().await.map_err(ApiError::Transport)?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&text).context("The Smartsheet API returned a body that is not JSON")
}
