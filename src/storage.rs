//! Secure dashboard config storage using the OS credential store.
//!
//! On Windows this uses DPAPI (via the `keyring` crate), on macOS Keychain,
//! and on Linux the Secret Service API. Only the backend URL, the API token,
//! and the last active shop are persisted; resource data never touches disk.

use keyring::Entry;
use serde_json::Value;
use tracing::{info, warn};

use crate::session::ShopId;

const SERVICE_NAME: &str = "dukadesk";

// Credential keys
const KEY_BACKEND_URL: &str = "backend_url";
const KEY_API_TOKEN: &str = "api_token";
const KEY_ACTIVE_SHOP: &str = "active_shop_id";

/// All credential keys managed by this module.
const ALL_KEYS: &[&str] = &[KEY_BACKEND_URL, KEY_API_TOKEN, KEY_ACTIVE_SHOP];

// ---------------------------------------------------------------------------
// Low-level helpers
// ---------------------------------------------------------------------------

/// Retrieve a single credential from the OS keyring. Returns `None` when the
/// entry does not exist (or the platform returns a "not found" error).
pub fn get_credential(key: &str) -> Option<String> {
    let entry = match Entry::new(SERVICE_NAME, key) {
        Ok(e) => e,
        Err(e) => {
            warn!(key, error = %e, "keyring: failed to create entry");
            return None;
        }
    };
    match entry.get_password() {
        Ok(pw) => Some(pw),
        Err(keyring::Error::NoEntry) => None,
        Err(e) => {
            warn!(key, error = %e, "keyring: failed to read credential");
            None
        }
    }
}

/// Store a credential in the OS keyring.
pub fn set_credential(key: &str, value: &str) -> Result<(), String> {
    let entry = Entry::new(SERVICE_NAME, key).map_err(|e| e.to_string())?;
    entry.set_password(value).map_err(|e| e.to_string())?;
    Ok(())
}

/// Delete a credential from the OS keyring. Silently succeeds if the entry
/// does not exist.
pub fn delete_credential(key: &str) -> Result<(), String> {
    let entry = Entry::new(SERVICE_NAME, key).map_err(|e| e.to_string())?;
    match entry.delete_credential() {
        Ok(()) => Ok(()),
        Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(e.to_string()),
    }
}

// ---------------------------------------------------------------------------
// High-level API
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardCredentials {
    pub backend_url: String,
    pub api_token: String,
    pub active_shop: Option<ShopId>,
}

/// The dashboard is considered configured when both the backend URL and the
/// API token are present in the credential store.
pub fn is_configured() -> bool {
    get_credential(KEY_BACKEND_URL).is_some() && get_credential(KEY_API_TOKEN).is_some()
}

/// Load the stored credentials, or `None` when not configured.
pub fn load_credentials() -> Option<DashboardCredentials> {
    let backend_url = get_credential(KEY_BACKEND_URL)?;
    let api_token = get_credential(KEY_API_TOKEN)?;
    let active_shop = get_credential(KEY_ACTIVE_SHOP).and_then(|s| s.trim().parse::<i64>().ok());
    Some(DashboardCredentials {
        backend_url,
        api_token,
        active_shop,
    })
}

/// Persist credentials received during onboarding or a shop switch.
pub fn store_credentials(creds: &DashboardCredentials) -> Result<(), String> {
    set_credential(KEY_BACKEND_URL, creds.backend_url.trim())?;
    set_credential(KEY_API_TOKEN, creds.api_token.trim())?;
    match creds.active_shop {
        Some(shop) => set_credential(KEY_ACTIVE_SHOP, &shop.to_string())?,
        None => delete_credential(KEY_ACTIVE_SHOP)?,
    }
    info!("dashboard credentials updated");
    Ok(())
}

/// Parse an onboarding payload into credentials.
///
/// Accepts the field aliases the admin console has shipped over time
/// (camelCase and snake_case).
pub fn parse_credentials_payload(payload: &Value) -> Result<DashboardCredentials, String> {
    let backend_url = payload
        .get("backendUrl")
        .or_else(|| payload.get("backend_url"))
        .or_else(|| payload.get("url"))
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or("Missing required field: backendUrl")?;

    let api_token = payload
        .get("apiToken")
        .or_else(|| payload.get("api_token"))
        .or_else(|| payload.get("token"))
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or("Missing required field: apiToken")?;

    let active_shop = payload
        .get("shopId")
        .or_else(|| payload.get("shop_id"))
        .and_then(|v| {
            v.as_i64()
                .or_else(|| v.as_str().and_then(|s| s.trim().parse::<i64>().ok()))
        });

    Ok(DashboardCredentials {
        backend_url: crate::api::normalize_base_url(&backend_url),
        api_token,
        active_shop,
    })
}

/// Parse and persist an onboarding payload in one step.
pub fn update_dashboard_credentials(payload: &Value) -> Result<DashboardCredentials, String> {
    let creds = parse_credentials_payload(payload)?;
    store_credentials(&creds)?;
    Ok(creds)
}

/// Delete every stored credential (factory reset).
pub fn factory_reset() -> Result<(), String> {
    info!("performing factory reset - deleting all credentials");
    for key in ALL_KEYS {
        delete_credential(key)?;
    }
    Ok(())
}
