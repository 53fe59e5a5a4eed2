//! Bulk delete over the batch endpoint.
//!
//! Deletion is irreversible from the dashboard's perspective, so the call
//! demands an explicit `Confirmation` value — the API-level equivalent of the
//! blocking confirmation dialog. Partial failure is reported, never rolled
//! back; the caller refetches and the Collection converges on server truth.

use reqwest::Method;
use serde_json::{json, Value};
use tracing::warn;

use crate::api::{unwrap_envelope, Transport};

/// Proof that the user confirmed a destructive action.
#[derive(Debug)]
pub struct Confirmation(());

impl Confirmation {
    pub fn confirmed() -> Self {
        Confirmation(())
    }
}

/// Per-id outcome of a batch delete.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BulkOutcome {
    pub succeeded: Vec<i64>,
    pub failed: Vec<i64>,
}

impl BulkOutcome {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Delete `ids` through `POST {path}/bulk-delete`.
///
/// The backend reports `succeeded`/`failed` id arrays; a 2xx response without
/// that detail means everything was deleted.
pub async fn bulk_delete(
    transport: &dyn Transport,
    path: &str,
    ids: &[i64],
    _confirmation: Confirmation,
) -> Result<BulkOutcome, String> {
    if ids.is_empty() {
        return Ok(BulkOutcome::default());
    }

    let body = json!({ "ids": ids });
    let raw = transport
        .request(Method::POST, &format!("{path}/bulk-delete"), &[], Some(body))
        .await
        .map_err(|e| e.to_string())?;

    let outcome = parse_outcome(raw, ids);
    if !outcome.failed.is_empty() {
        warn!(
            path,
            failed = outcome.failed.len(),
            succeeded = outcome.succeeded.len(),
            "bulk delete partially failed"
        );
    }
    Ok(outcome)
}

fn parse_outcome(raw: Value, requested: &[i64]) -> BulkOutcome {
    let payload = unwrap_envelope(raw);
    let succeeded = id_array(&payload, &["succeeded", "deleted"]);
    let failed = id_array(&payload, &["failed"]);
    match (succeeded, failed) {
        (None, None) => BulkOutcome {
            succeeded: requested.to_vec(),
            failed: Vec::new(),
        },
        (succeeded, failed) => {
            let failed = failed.unwrap_or_default();
            let succeeded = succeeded.unwrap_or_else(|| {
                // Only failures reported: everything else went through.
                requested
                    .iter()
                    .copied()
                    .filter(|id| !failed.contains(id))
                    .collect()
            });
            BulkOutcome { succeeded, failed }
        }
    }
}

fn id_array(payload: &Value, keys: &[&str]) -> Option<Vec<i64>> {
    for key in keys {
        if let Some(arr) = payload.get(*key).and_then(Value::as_array) {
            return Some(arr.iter().filter_map(Value::as_i64).collect());
        }
    }
    None
}
