//! Access to the Smartsheet REST API.
//!
//! Everything goes through the `Transport` trait, a single "send this request, give me the JSON"
//! seam. `HttpTransport` is the real implementation; tests use an in-memory one. `Api` layers the
//! typed endpoint methods on top of whichever transport it is given.

mod client;
mod error;
mod retry;
mod smartsheet;
#[cfg(test)]
pub(crate) mod test_client;

pub use client::{HttpTransport, DEFAULT_ENDPOINT};
pub use error::ApiError;
pub use retry::RetryPolicy;
pub use smartsheet::{Api, Destination, PageQuery, SheetQuery};

use crate::{Config, Result};
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;

/// Sends one request to the Smartsheet API and returns the decoded JSON body.
///
/// `path` is relative to the API root (e.g. `/sheets/123`). Query entries whose value is `None`
/// are left out of the request. A non-success response is returned as an `ApiError` inside the
/// `anyhow::Error`.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        query: &[(&str, Option<String>)],
    ) -> Result<Value>;
}

/// Creates an `Api` that talks to the live service described by `config`.
pub fn http_api(config: &Config) -> Result<Api> {
    let transport = HttpTransport::new(config.endpoint(), config.api_key(), config.retry())?;
    Ok(Api::new(Arc::new(transport)))
}
