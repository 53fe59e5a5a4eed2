//! Explicit session context.
//!
//! Every controller and form receives the shop scope and transport as values
//! instead of reading ambient global state. The `Session` bundles what the
//! `ApiClient` needs (base URL, bearer token) with the active shop id.

use zeroize::Zeroizing;

use crate::api::normalize_base_url;
use crate::storage;

/// Tenant boundary: every record belongs to exactly one shop and every list
/// or create operation is filtered by it.
pub type ShopId = i64;

pub struct Session {
    base_url: String,
    token: Zeroizing<String>,
    active_shop: Option<ShopId>,
}

impl Session {
    pub fn new(base_url: &str, token: &str) -> Self {
        Self {
            base_url: normalize_base_url(base_url),
            token: Zeroizing::new(token.trim().to_string()),
            active_shop: None,
        }
    }

    /// Rebuild a session from the OS credential store. `None` when the
    /// dashboard has never been configured on this machine.
    pub fn from_storage() -> Option<Self> {
        let creds = storage::load_credentials()?;
        let mut session = Session::new(&creds.backend_url, &creds.api_token);
        session.active_shop = creds.active_shop;
        Some(session)
    }

    /// Persist this session's credentials for the next launch.
    pub fn persist(&self) -> Result<(), String> {
        storage::store_credentials(&storage::DashboardCredentials {
            backend_url: self.base_url.clone(),
            api_token: self.token.as_str().to_string(),
            active_shop: self.active_shop,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn active_shop(&self) -> Option<ShopId> {
        self.active_shop
    }

    pub fn set_active_shop(&mut self, shop: Option<ShopId>) {
        self.active_shop = shop;
    }

    /// A session is usable once both the backend URL and token are present.
    pub fn is_configured(&self) -> bool {
        !self.base_url.is_empty() && !self.token.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_normalizes_and_reports_configured() {
        let session = Session::new("dashboard.dukadesk.app/v1/", "  tok-123  ");
        assert_eq!(session.base_url(), "https://dashboard.dukadesk.app");
        assert_eq!(session.token(), "tok-123");
        assert!(session.is_configured());
        assert_eq!(session.active_shop(), None);
    }

    #[test]
    fn blank_session_is_not_configured() {
        let session = Session::new("", "");
        assert!(!session.is_configured());
    }
}
