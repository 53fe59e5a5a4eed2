//! Error taxonomy for the dashboard backend client.
//!
//! Network-level failures map to the friendly messages shown inline on the
//! page that triggered them; HTTP failures carry the detail string extracted
//! from the response body when the backend provided one.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// TCP/TLS connect failure.
    #[error("Cannot reach the dashboard backend at {url}")]
    Connect { url: String },

    /// The request timed out.
    #[error("Connection to {url} timed out")]
    Timeout { url: String },

    /// The configured base URL could not be turned into a request.
    #[error("Invalid dashboard backend URL: {url}")]
    BadUrl { url: String },

    /// Any other transport error.
    #[error("Network error communicating with {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Non-2xx response. `detail` is the message extracted from the response
    /// body (`error`, then `message`), absent when the body had neither.
    #[error("{}", display_status(.status, .detail.as_deref()))]
    Status { status: u16, detail: Option<String> },

    /// The body was not the JSON we expected.
    #[error("Invalid JSON from the dashboard backend: {0}")]
    Decode(#[from] serde_json::Error),

    /// The session is missing a base URL, token, or active shop.
    #[error("Session not configured: {0}")]
    NotConfigured(&'static str),
}

impl ApiError {
    /// Map a `reqwest::Error` to the friendly variants.
    pub fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_connect() {
            return ApiError::Connect { url: url.to_string() };
        }
        if err.is_timeout() {
            return ApiError::Timeout { url: url.to_string() };
        }
        if err.is_builder() {
            return ApiError::BadUrl { url: url.to_string() };
        }
        ApiError::Network {
            url: url.to_string(),
            source: err,
        }
    }

    /// True for 401/403 — the caller should treat stored credentials as stale.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ApiError::Status { status: 401 | 403, .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Convert an HTTP status code into a user-facing message.
pub fn status_message(status: u16) -> String {
    match status {
        401 => "API token is invalid or expired".to_string(),
        403 => "Not authorized for this shop".to_string(),
        404 => "Dashboard backend endpoint not found".to_string(),
        s if s >= 500 => format!("Dashboard backend server error (HTTP {s})"),
        s => format!("Unexpected response from dashboard backend (HTTP {s})"),
    }
}

fn display_status(status: &u16, detail: Option<&str>) -> String {
    match detail {
        Some(d) => format!("{d} (HTTP {status})"),
        None => status_message(*status),
    }
}
