use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// A failed call to the Smartsheet API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The service answered with a non-success status.
    #[error("Smartsheet API request failed with status {status}: {message}")]
    Status {
        status: u16,
        /// The service's own numeric error code, e.g. `1006` for "Not Found".
        error_code: Option<i64>,
        message: String,
        detail: Option<Value>,
        retry_after: Option<Duration>,
    },

    /// The request never produced a response (connection, TLS, timeout, body decoding).
    #[error("Smartsheet API request could not be completed: {0}")]
    Transport(#[source] reqwest::Error),
}

/// The JSON body the service sends with an error status.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    detail: Option<Value>,
}

impl ApiError {
    /// Builds a `Status` error from a response status and its (possibly non-JSON) body.
    pub fn from_response(status: StatusCode, retry_after: Option<Duration>, body: &str) -> Self {
        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
        let message = parsed
            .message
            .filter(|m| !m.trim().is_empty())
            .or_else(|| Some(body.trim().to_string()).filter(|b| !b.is_empty()))
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Unknown error")
                    .to_string()
            });
        ApiError::Status {
            status: status.as_u16(),
            error_code: parsed.error_code,
            message,
            detail: parsed.detail,
            retry_after,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Transport(e) => e.status().map(|s| s.as_u16()),
        }
    }

    pub fn message(&self) -> String {
        match self {
            ApiError::Status { message, .. } => message.clone(),
            ApiError::Transport(e) => e.to_string(),
        }
    }

    pub fn error_code(&self) -> Option<i64> {
        match self {
            ApiError::Status { error_code, .. } => *error_code,
            ApiError::Transport(_) => None,
        }
    }

    pub fn detail(&self) -> Option<&Value> {
        match self {
            ApiError::Status { detail, .. } => detail.as_ref(),
            ApiError::Transport(_) => None,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ApiError::Status { retry_after, .. } => *retry_after,
            ApiError::Transport(_) => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn is_permission_denied(&self) -> bool {
        self.status() == Some(403)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status() == Some(429)
    }
}
