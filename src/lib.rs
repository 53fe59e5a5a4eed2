//! DukaDesk dashboard core.
//!
//! Headless client layer for the DukaDesk shop-management dashboard: typed,
//! shop-scoped list controllers, mutation forms, bulk actions, CSV export,
//! and the M-Pesa/SMS/email integration calls, all over one authenticated
//! REST client. The UI shell renders `ListSnapshot`s and drives the
//! controllers; nothing in this crate touches a widget.

use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod api;
pub mod bulk;
pub mod controller;
pub mod debounce;
pub mod detail;
pub mod error;
pub mod export;
pub mod filter;
pub mod form;
pub mod integrations;
pub mod models;
pub mod session;
pub mod storage;

pub use api::{normalize_base_url, test_connectivity, ApiClient, ConnectivityResult, Transport};
pub use bulk::{bulk_delete, BulkOutcome, Confirmation};
pub use controller::{ListController, ListPhase, ListSnapshot};
pub use debounce::{Debouncer, SEARCH_DEBOUNCE};
pub use detail::{order_rows, product_label, record_rows, sale_rows, DetailAction, DetailRow};
pub use error::ApiError;
pub use export::{csv_export, server_export, ExportFormat};
pub use filter::FilterState;
pub use form::{FormMode, MutationForm, PendingSubmit};
pub use models::{
    hash_staff_pin, Customer, Order, OrderLine, PrinterConfig, Product, Resource, Sale,
    ScheduledReport, Staff, Supplier, Webhook,
};
pub use session::{Session, ShopId};

/// Strip a phone number down to its digits.
pub(crate) fn normalize_phone(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Initialize structured logging: console layer, plus a daily rolling file
/// layer when a log directory is given. Call once at startup; subsequent
/// calls are ignored.
pub fn init_logging(log_dir: Option<&std::path::Path>) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,dukadesk_core=debug"));
    let console_layer = fmt::layer().with_target(true);
    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).ok();
            let file_appender = tracing_appender::rolling::daily(dir, "dukadesk");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let file_layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true);
            let _ = registry.with(file_layer).try_init();
            // Keep the guard alive for the lifetime of the process — dropping
            // it flushes and stops the background writer.
            std::mem::forget(guard);
        }
        None => {
            let _ = registry.try_init();
        }
    }

    info!("DukaDesk core v{} logging initialised", env!("CARGO_PKG_VERSION"));
}
