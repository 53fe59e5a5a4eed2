//! Integration endpoints: M-Pesa STK push, SMS, email, printer test.
//!
//! These follow the same create/list/delete surface as every other resource,
//! with resource-specific payloads layered on top. Validation happens before
//! the request leaves; error surfacing matches the mutation forms.

use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::info;

use crate::api::{unwrap_envelope, Transport};
use crate::error::ApiError;
use crate::normalize_phone;
use crate::session::ShopId;

/// Coerce user input to an M-Pesa MSISDN (`2547...`). Accepts the local
/// `07...` form, strips separators, rejects anything else.
pub fn normalize_msisdn(raw: &str) -> Result<String, String> {
    let digits = normalize_phone(raw);
    let msisdn = if let Some(rest) = digits.strip_prefix("254") {
        format!("254{rest}")
    } else if let Some(rest) = digits.strip_prefix('0') {
        format!("254{rest}")
    } else if digits.len() == 9 {
        format!("254{digits}")
    } else {
        digits.clone()
    };
    if !msisdn.starts_with("254") || msisdn.len() != 12 {
        return Err(format!("Invalid phone number: {raw}"));
    }
    Ok(msisdn)
}

/// Trigger an M-Pesa STK push for a till payment.
pub async fn mpesa_stk_push(
    transport: &dyn Transport,
    shop: ShopId,
    phone: &str,
    amount: f64,
    reference: Option<&str>,
) -> Result<Value, String> {
    let msisdn = normalize_msisdn(phone)?;
    if amount <= 0.0 {
        return Err("Amount must be greater than zero".to_string());
    }

    let mut body = Map::new();
    body.insert("shop_id".to_string(), Value::from(shop));
    body.insert("phone".to_string(), Value::String(msisdn.clone()));
    body.insert("amount".to_string(), json!(amount));
    if let Some(reference) = reference.map(str::trim).filter(|r| !r.is_empty()) {
        body.insert("reference".to_string(), Value::String(reference.to_string()));
    }

    let raw = transport
        .request(Method::POST, "/v1/mpesa/stk-push", &[], Some(Value::Object(body)))
        .await
        .map_err(|e| action_error(e, "M-Pesa request failed"))?;
    info!(shop_id = shop, phone = %msisdn, "stk push accepted");
    Ok(unwrap_envelope(raw))
}

/// Send a one-off SMS (receipts, loyalty notices).
pub async fn sms_send(
    transport: &dyn Transport,
    shop: ShopId,
    to: &str,
    message: &str,
) -> Result<Value, String> {
    let msisdn = normalize_msisdn(to)?;
    let message = message.trim();
    if message.is_empty() {
        return Err("Message cannot be empty".to_string());
    }

    let body = json!({ "shop_id": shop, "to": msisdn, "message": message });
    let raw = transport
        .request(Method::POST, "/v1/sms/send", &[], Some(body))
        .await
        .map_err(|e| action_error(e, "Failed to send SMS"))?;
    Ok(unwrap_envelope(raw))
}

/// Send a one-off email.
pub async fn email_send(
    transport: &dyn Transport,
    shop: ShopId,
    to: &str,
    subject: &str,
    body_text: &str,
) -> Result<Value, String> {
    let to = to.trim();
    if to.is_empty() || !to.contains('@') {
        return Err(format!("Invalid email address: {to}"));
    }
    let subject = subject.trim();
    if subject.is_empty() {
        return Err("Subject cannot be empty".to_string());
    }

    let body = json!({ "shop_id": shop, "to": to, "subject": subject, "body": body_text });
    let raw = transport
        .request(Method::POST, "/v1/email/send", &[], Some(body))
        .await
        .map_err(|e| action_error(e, "Failed to send email"))?;
    Ok(unwrap_envelope(raw))
}

/// Fire a test page on a configured printer.
pub async fn printer_send_test(
    transport: &dyn Transport,
    printer_id: i64,
) -> Result<Value, String> {
    let raw = transport
        .request(
            Method::POST,
            &format!("/v1/print/printers/{printer_id}/test"),
            &[],
            Some(json!({})),
        )
        .await
        .map_err(|e| action_error(e, "Printer test failed"))?;
    Ok(unwrap_envelope(raw))
}

fn action_error(err: ApiError, fallback: &str) -> String {
    match err {
        ApiError::Status {
            detail: Some(detail),
            ..
        } => detail,
        ApiError::Status { detail: None, .. } => fallback.to_string(),
        other => other.to_string(),
    }
}
