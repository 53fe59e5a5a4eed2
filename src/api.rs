//! Dashboard backend API client.
//!
//! Owns the one transport boundary the rest of the crate talks through:
//! authenticated requests, friendly error mapping, and the envelope
//! normalization that keeps `{data: [...]}` vs bare-array inconsistencies out
//! of controller code.

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::error::{status_message, ApiError};
use crate::filter::FilterState;
use crate::models::Resource;
use crate::session::{Session, ShopId};

/// Default timeout for API requests (30 seconds).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout used specifically for the lightweight connectivity test.
const CONNECTIVITY_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// URL normalisation
// ---------------------------------------------------------------------------

/// Normalise the dashboard backend base URL:
/// - strip trailing slashes
/// - strip a trailing `/v1` segment (paths in this crate carry it)
/// - ensure a scheme is present (https, or http for localhost)
pub fn normalize_base_url(url: &str) -> String {
    let mut url = url.trim().to_string();

    // Ensure scheme
    if !url.is_empty() && !url.starts_with("http://") && !url.starts_with("https://") {
        if url.starts_with("localhost") || url.starts_with("127.0.0.1") {
            url = format!("http://{url}");
        } else {
            url = format!("https://{url}");
        }
    }

    // Strip trailing slashes
    while url.ends_with('/') {
        url.pop();
    }

    // Strip trailing /v1
    if url.ends_with("/v1") {
        url.truncate(url.len() - 3);
    }

    // Strip trailing slashes again (in case "/v1/" was present)
    while url.ends_with('/') {
        url.pop();
    }

    url
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// The single seam between this crate and the network.
///
/// Controllers and forms are written against this trait so they can be unit
/// tested with an in-memory implementation.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform a JSON request. `path` includes the leading slash and the
    /// `/v1` prefix, e.g. `/v1/products`. Returns the response body parsed as
    /// JSON, or `Value::Null` for empty 204 responses.
    async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<Value>,
    ) -> Result<Value, ApiError>;

    /// Fetch a raw body (server-side CSV/PDF exports).
    async fn request_bytes(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<Vec<u8>, ApiError>;
}

/// Production transport over `reqwest`, authenticated with the session's
/// bearer token.
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Zeroizing<String>,
}

impl ApiClient {
    pub fn new(session: &Session) -> Result<Self, ApiError> {
        let base_url = normalize_base_url(session.base_url());
        if base_url.is_empty() {
            return Err(ApiError::NotConfigured("missing backend URL"));
        }
        let token = session.token().trim().to_string();
        if token.is_empty() {
            return Err(ApiError::NotConfigured("missing API token"));
        }
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| ApiError::from_reqwest(&base_url, e))?;
        Ok(Self {
            client,
            base_url,
            token: Zeroizing::new(token),
        })
    }

    fn build(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
    ) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let is_mutation = matches!(method, Method::POST | Method::PUT | Method::DELETE);
        let mut req = self
            .client
            .request(method, &url)
            .bearer_auth(self.token.as_str());
        if !query.is_empty() {
            req = req.query(query);
        }
        // Mutations carry a client-generated idempotency key so a retried
        // request cannot be applied twice by the backend.
        if is_mutation {
            req = req.header("x-idempotency-key", uuid::Uuid::new_v4().to_string());
        }
        req
    }
}

#[async_trait]
impl Transport for ApiClient {
    async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<Value>,
    ) -> Result<Value, ApiError> {
        let mut req = self.build(method.clone(), path, query);
        if let Some(b) = body {
            req = req.json(&b);
        }

        debug!(%method, path, "dashboard api request");
        let resp = req
            .send()
            .await
            .map_err(|e| ApiError::from_reqwest(&self.base_url, e))?;
        let status = resp.status();

        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body_text));
        }

        let body_text = resp.text().await.unwrap_or_default();
        if body_text.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body_text).map_err(ApiError::Decode)
    }

    async fn request_bytes(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<Vec<u8>, ApiError> {
        let req = self.build(Method::GET, path, query);
        let resp = req
            .send()
            .await
            .map_err(|e| ApiError::from_reqwest(&self.base_url, e))?;
        let status = resp.status();
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body_text));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ApiError::from_reqwest(&self.base_url, e))?;
        Ok(bytes.to_vec())
    }
}

/// Build the `ApiError` for a non-2xx response, pulling the backend's own
/// message out of the body when one is present.
fn status_to_error(status: StatusCode, body_text: &str) -> ApiError {
    let detail = extract_error_detail(body_text);
    ApiError::Status {
        status: status.as_u16(),
        detail,
    }
}

/// Extract a human-readable message from an error response body.
///
/// The backend is inconsistent: some endpoints return `{"error": "..."}`,
/// others `{"message": "..."}`, some attach `details`. Plain-text bodies are
/// passed through as-is.
pub(crate) fn extract_error_detail(body_text: &str) -> Option<String> {
    let trimmed = body_text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let Ok(json) = serde_json::from_str::<Value>(trimmed) else {
        return Some(trimmed.to_string());
    };
    let message = json
        .get("error")
        .or_else(|| json.get("message"))
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())?;
    let details = json.get("details").or_else(|| json.get("errors")).cloned();
    match details {
        Some(d) if !d.is_null() => Some(format!("{message}: {d}")),
        _ => Some(message),
    }
}

// ---------------------------------------------------------------------------
// Envelope normalisation
// ---------------------------------------------------------------------------

/// The backend's response envelope is inconsistent across endpoints —
/// sometimes `{data: ...}`, sometimes the bare payload. All decoding funnels
/// through here so nothing else in the crate unwraps defensively.
pub fn unwrap_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut obj) => match obj.remove("data") {
            Some(inner) => inner,
            None => Value::Object(obj),
        },
        other => other,
    }
}

/// Decode a list response into typed records.
pub fn decode_list<R: DeserializeOwned>(value: Value) -> Result<Vec<R>, ApiError> {
    let payload = unwrap_envelope(value);
    match payload {
        Value::Null => Ok(Vec::new()),
        Value::Array(_) => serde_json::from_value(payload).map_err(ApiError::Decode),
        other => {
            // A single object where a list was expected decodes as a
            // one-element list rather than being rejected.
            let record = serde_json::from_value(other).map_err(ApiError::Decode)?;
            Ok(vec![record])
        }
    }
}

/// Decode a single-record response.
pub fn decode_record<R: DeserializeOwned>(value: Value) -> Result<R, ApiError> {
    serde_json::from_value(unwrap_envelope(value)).map_err(ApiError::Decode)
}

// ---------------------------------------------------------------------------
// Typed resource operations
// ---------------------------------------------------------------------------

/// Fetch the full collection for a resource, scoped by shop and filters.
pub async fn list_records<R: Resource>(
    transport: &dyn Transport,
    shop: ShopId,
    filter: &FilterState,
) -> Result<Vec<R>, ApiError> {
    let query = filter.query_pairs(shop);
    let raw = transport.request(Method::GET, R::PATH, &query, None).await?;
    decode_list(raw)
}

/// POST a create payload; returns the created record's JSON.
pub async fn create_record(
    transport: &dyn Transport,
    path: &str,
    payload: Value,
) -> Result<Value, ApiError> {
    let raw = transport
        .request(Method::POST, path, &[], Some(payload))
        .await?;
    Ok(unwrap_envelope(raw))
}

/// PUT an update payload at `{path}/{id}`; returns the updated record's JSON.
pub async fn update_record(
    transport: &dyn Transport,
    path: &str,
    id: i64,
    payload: Value,
) -> Result<Value, ApiError> {
    let raw = transport
        .request(Method::PUT, &format!("{path}/{id}"), &[], Some(payload))
        .await?;
    Ok(unwrap_envelope(raw))
}

/// DELETE `{path}/{id}`.
pub async fn delete_record(transport: &dyn Transport, path: &str, id: i64) -> Result<(), ApiError> {
    transport
        .request(Method::DELETE, &format!("{path}/{id}"), &[], None)
        .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Connectivity test
// ---------------------------------------------------------------------------

/// Result of a connectivity test.
#[derive(Debug, serde::Serialize)]
pub struct ConnectivityResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Test connectivity to the dashboard backend with a lightweight
/// health-check.
pub async fn test_connectivity(base_url: &str, token: &str) -> ConnectivityResult {
    let url = normalize_base_url(base_url);
    let health_url = format!("{url}/v1/health");

    let client = match Client::builder().timeout(CONNECTIVITY_TIMEOUT).build() {
        Ok(c) => c,
        Err(e) => {
            return ConnectivityResult {
                success: false,
                latency_ms: None,
                error: Some(format!("Failed to create HTTP client: {e}")),
            };
        }
    };

    let start = Instant::now();

    let resp = match client.get(&health_url).bearer_auth(token).send().await {
        Ok(r) => r,
        Err(e) => {
            return ConnectivityResult {
                success: false,
                latency_ms: None,
                error: Some(ApiError::from_reqwest(&url, e).to_string()),
            };
        }
    };

    let latency = start.elapsed().as_millis() as u64;
    let status = resp.status();

    if status.is_success() {
        info!(latency_ms = latency, "connectivity test passed");
        ConnectivityResult {
            success: true,
            latency_ms: Some(latency),
            error: None,
        }
    } else {
        ConnectivityResult {
            success: false,
            latency_ms: Some(latency),
            error: Some(status_message(status.as_u16())),
        }
    }
}

// ---------------------------------------------------------------------------
// Test transport
// ---------------------------------------------------------------------------


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalize_base_url_adds_scheme_and_strips_suffixes() {
        assert_eq!(
            normalize_base_url("dashboard.dukadesk.app/v1/"),
            "https://dashboard.dukadesk.app"
        );
        assert_eq!(normalize_base_url("localhost:4000"), "http://localhost:4000");
        assert_eq!(
            normalize_base_url("https://api.example.com///"),
            "https://api.example.com"
        );
        assert_eq!(normalize_base_url(""), "");
    }

    #[test]
    fn unwrap_envelope_handles_both_shapes() {
        let wrapped = json!({ "data": [ {"id": 1} ] });
        let bare = json!([ {"id": 2} ]);
        assert_eq!(unwrap_envelope(wrapped), json!([ {"id": 1} ]));
        assert_eq!(unwrap_envelope(bare.clone()), bare);
    }

    #[test]
    fn decode_list_tolerates_null_and_single_object() {
        #[derive(serde::Deserialize)]
        struct Row {
            id: i64,
        }
        let rows: Vec<Row> = decode_list(json!({ "data": null })).expect("null decodes");
        assert!(rows.is_empty());
        let rows: Vec<Row> = decode_list(json!({ "id": 7 })).expect("object decodes");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, 7);
    }

    #[test]
    fn extract_error_detail_prefers_error_then_message() {
        assert_eq!(
            extract_error_detail(r#"{"error": "Price is required"}"#),
            Some("Price is required".to_string())
        );
        assert_eq!(
            extract_error_detail(r#"{"message": "Shop mismatch"}"#),
            Some("Shop mismatch".to_string())
        );
        assert_eq!(
            extract_error_detail(r#"{"error": "Validation failed", "details": ["price"]}"#),
            Some(r#"Validation failed: ["price"]"#.to_string())
        );
        assert_eq!(extract_error_detail("   "), None);
        assert_eq!(
            extract_error_detail("upstream exploded"),
            Some("upstream exploded".to_string())
        );
    }
}
