//! Resource records and the `Resource` trait.
//!
//! One record type per dashboard page. Every record carries an integer id
//! (server-assigned, unique within its collection) and the `shop_id` tenant
//! scope, set at creation and immutable after.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::session::ShopId;

/// Contract between a record type and the generic controller/form/export
/// machinery.
pub trait Resource:
    DeserializeOwned + Serialize + Clone + Send + Sync + 'static
{
    /// Collection endpoint, e.g. `/v1/products`.
    const PATH: &'static str;
    /// Noun used in fallback error messages ("Failed to save product").
    const NOUN: &'static str;
    /// Fields the mutation form requires to be present and non-blank.
    const REQUIRED_FIELDS: &'static [&'static str];
    /// Column order for client-side CSV export.
    const CSV_COLUMNS: &'static [&'static str];

    fn id(&self) -> i64;
    fn shop_id(&self) -> ShopId;

    /// One CSV cell per entry of `CSV_COLUMNS`, same order.
    fn csv_row(&self) -> Vec<String>;

    /// Last-minute payload adjustment before a mutation leaves the process.
    /// The default is a no-op; staff records hash their PIN here. `creating`
    /// is true for POST payloads, false for PUT.
    fn prepare_payload(_fields: &mut Map<String, Value>, _creating: bool) -> Result<(), String> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Formatting helpers for CSV cells
// ---------------------------------------------------------------------------

fn cell_opt(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn cell_time(value: &Option<DateTime<Utc>>) -> String {
    value.map(|t| t.to_rfc3339()).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub shop_id: ShopId,
    pub name: String,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub stock_quantity: i64,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Resource for Product {
    const PATH: &'static str = "/v1/products";
    const NOUN: &'static str = "product";
    const REQUIRED_FIELDS: &'static [&'static str] = &["name", "price"];
    const CSV_COLUMNS: &'static [&'static str] = &[
        "id",
        "name",
        "sku",
        "category",
        "price",
        "stock_quantity",
        "active",
    ];

    fn id(&self) -> i64 {
        self.id
    }

    fn shop_id(&self) -> ShopId {
        self.shop_id
    }

    fn csv_row(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.name.clone(),
            cell_opt(&self.sku),
            cell_opt(&self.category),
            self.price.to_string(),
            self.stock_quantity.to_string(),
            self.active.to_string(),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sale {
    pub id: i64,
    pub shop_id: ShopId,
    pub product_id: i64,
    /// Denormalized by the backend's list endpoint; may be omitted.
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub unit_price: f64,
    #[serde(default)]
    pub total: f64,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub sold_at: Option<DateTime<Utc>>,
}

impl Resource for Sale {
    const PATH: &'static str = "/v1/sales";
    const NOUN: &'static str = "sale";
    const REQUIRED_FIELDS: &'static [&'static str] = &["product_id", "quantity"];
    const CSV_COLUMNS: &'static [&'static str] = &[
        "id",
        "product_id",
        "product_name",
        "quantity",
        "unit_price",
        "total",
        "payment_method",
        "sold_at",
    ];

    fn id(&self) -> i64 {
        self.id
    }

    fn shop_id(&self) -> ShopId {
        self.shop_id
    }

    fn csv_row(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.product_id.to_string(),
            cell_opt(&self.product_name),
            self.quantity.to_string(),
            self.unit_price.to_string(),
            self.total.to_string(),
            cell_opt(&self.payment_method),
            cell_time(&self.sold_at),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: i64,
    pub shop_id: ShopId,
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub loyalty_points: i64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Resource for Customer {
    const PATH: &'static str = "/v1/customers";
    const NOUN: &'static str = "customer";
    const REQUIRED_FIELDS: &'static [&'static str] = &["name", "phone"];
    const CSV_COLUMNS: &'static [&'static str] =
        &["id", "name", "phone", "email", "loyalty_points"];

    fn id(&self) -> i64 {
        self.id
    }

    fn shop_id(&self) -> ShopId {
        self.shop_id
    }

    fn csv_row(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.name.clone(),
            self.phone.clone(),
            cell_opt(&self.email),
            self.loyalty_points.to_string(),
        ]
    }
}

/// A supplier order line. `product_name` is denormalized by the backend and
/// may be omitted from list responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: i64,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub unit_price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub shop_id: ShopId,
    #[serde(default)]
    pub supplier_id: Option<i64>,
    #[serde(default)]
    pub supplier_name: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub total: f64,
    #[serde(default)]
    pub items: Vec<OrderLine>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Resource for Order {
    const PATH: &'static str = "/v1/orders";
    const NOUN: &'static str = "order";
    const REQUIRED_FIELDS: &'static [&'static str] = &["supplier_id"];
    const CSV_COLUMNS: &'static [&'static str] = &[
        "id",
        "supplier_id",
        "supplier_name",
        "status",
        "total",
        "created_at",
    ];

    fn id(&self) -> i64 {
        self.id
    }

    fn shop_id(&self) -> ShopId {
        self.shop_id
    }

    fn csv_row(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.supplier_id.map(|v| v.to_string()).unwrap_or_default(),
            cell_opt(&self.supplier_name),
            self.status.clone(),
            self.total.to_string(),
            cell_time(&self.created_at),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Staff {
    pub id: i64,
    pub shop_id: ShopId,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub role: String,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Resource for Staff {
    const PATH: &'static str = "/v1/staff";
    const NOUN: &'static str = "staff member";
    const REQUIRED_FIELDS: &'static [&'static str] = &["name", "role"];
    const CSV_COLUMNS: &'static [&'static str] = &["id", "name", "phone", "role", "active"];

    fn id(&self) -> i64 {
        self.id
    }

    fn shop_id(&self) -> ShopId {
        self.shop_id
    }

    fn csv_row(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.name.clone(),
            cell_opt(&self.phone),
            self.role.clone(),
            self.active.to_string(),
        ]
    }

    /// PINs never leave the process in clear: a `pin` field in the form
    /// payload is replaced by its bcrypt hash under `pin_hash`.
    fn prepare_payload(fields: &mut Map<String, Value>, _creating: bool) -> Result<(), String> {
        let Some(pin) = fields.remove("pin") else {
            return Ok(());
        };
        let pin = pin.as_str().map(str::trim).unwrap_or_default().to_string();
        if pin.is_empty() {
            return Ok(());
        }
        let hash = hash_staff_pin(&pin)?;
        fields.insert("pin_hash".to_string(), Value::String(hash));
        Ok(())
    }
}

/// Hash a staff PIN for storage on the backend.
pub fn hash_staff_pin(pin: &str) -> Result<String, String> {
    bcrypt::hash(pin, bcrypt::DEFAULT_COST).map_err(|e| format!("Failed to hash PIN: {e}"))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Supplier {
    pub id: i64,
    pub shop_id: ShopId,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Resource for Supplier {
    const PATH: &'static str = "/v1/suppliers";
    const NOUN: &'static str = "supplier";
    const REQUIRED_FIELDS: &'static [&'static str] = &["name"];
    const CSV_COLUMNS: &'static [&'static str] = &["id", "name", "phone", "email"];

    fn id(&self) -> i64 {
        self.id
    }

    fn shop_id(&self) -> ShopId {
        self.shop_id
    }

    fn csv_row(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.name.clone(),
            cell_opt(&self.phone),
            cell_opt(&self.email),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Webhook {
    pub id: i64,
    pub shop_id: ShopId,
    pub url: String,
    #[serde(default)]
    pub event: String,
    /// Signing secret; generated client-side on create, never editable.
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl Webhook {
    /// Generate a fresh signing secret for a new webhook.
    pub fn generate_secret() -> String {
        format!("whs_{}", uuid::Uuid::new_v4().simple())
    }
}

impl Resource for Webhook {
    const PATH: &'static str = "/v1/webhooks";
    const NOUN: &'static str = "webhook";
    const REQUIRED_FIELDS: &'static [&'static str] = &["url", "event"];
    const CSV_COLUMNS: &'static [&'static str] = &["id", "url", "event", "active"];

    fn id(&self) -> i64 {
        self.id
    }

    fn shop_id(&self) -> ShopId {
        self.shop_id
    }

    fn csv_row(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.url.clone(),
            self.event.clone(),
            self.active.to_string(),
        ]
    }

    /// New webhooks get a client-generated signing secret.
    fn prepare_payload(fields: &mut Map<String, Value>, creating: bool) -> Result<(), String> {
        let missing = match fields.get("secret") {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(_) => false,
        };
        if creating && missing {
            fields.insert(
                "secret".to_string(),
                Value::String(Webhook::generate_secret()),
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrinterConfig {
    pub id: i64,
    pub shop_id: ShopId,
    pub name: String,
    /// "network" or "bluetooth".
    #[serde(default)]
    pub connection: String,
    #[serde(default)]
    pub address: String,
    #[serde(default = "default_paper_width")]
    pub paper_width_mm: i64,
}

fn default_paper_width() -> i64 {
    58
}

impl Resource for PrinterConfig {
    const PATH: &'static str = "/v1/print/printers";
    const NOUN: &'static str = "printer";
    const REQUIRED_FIELDS: &'static [&'static str] = &["name", "connection", "address"];
    const CSV_COLUMNS: &'static [&'static str] =
        &["id", "name", "connection", "address", "paper_width_mm"];

    fn id(&self) -> i64 {
        self.id
    }

    fn shop_id(&self) -> ShopId {
        self.shop_id
    }

    fn csv_row(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.name.clone(),
            self.connection.clone(),
            self.address.clone(),
            self.paper_width_mm.to_string(),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledReport {
    pub id: i64,
    pub shop_id: ShopId,
    /// e.g. "sales_summary", "stock_levels".
    pub report_type: String,
    /// e.g. "daily", "weekly", "monthly".
    #[serde(default)]
    pub frequency: String,
    /// Comma-separated recipient emails.
    #[serde(default)]
    pub recipients: String,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub last_run_at: Option<DateTime<Utc>>,
}

impl Resource for ScheduledReport {
    const PATH: &'static str = "/v1/scheduled-reports";
    const NOUN: &'static str = "scheduled report";
    const REQUIRED_FIELDS: &'static [&'static str] = &["report_type", "frequency", "recipients"];
    const CSV_COLUMNS: &'static [&'static str] =
        &["id", "report_type", "frequency", "recipients", "format"];

    fn id(&self) -> i64 {
        self.id
    }

    fn shop_id(&self) -> ShopId {
        self.shop_id
    }

    fn csv_row(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.report_type.clone(),
            self.frequency.clone(),
            self.recipients.clone(),
            self.format.clone(),
        ]
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn product_decodes_with_missing_optionals() {
        let product: Product = serde_json::from_value(json!({
            "id": 3,
            "shop_id": 5,
            "name": "Unga 2kg",
            "price": 185.0
        }))
        .expect("sparse product should decode");
        assert_eq!(product.id, 3);
        assert!(product.active);
        assert_eq!(product.stock_quantity, 0);
        assert_eq!(product.sku, None);
    }

    #[test]
    fn product_csv_row_matches_column_order() {
        let product = Product {
            id: 9,
            shop_id: 5,
            name: "Sugar 1kg".to_string(),
            sku: Some("SKU-9".to_string()),
            category: Some("Dry goods".to_string()),
            price: 155.5,
            stock_quantity: 40,
            active: true,
            image_url: None,
            created_at: None,
        };
        let row = product.csv_row();
        assert_eq!(row.len(), Product::CSV_COLUMNS.len());
        assert_eq!(row[0], "9");
        assert_eq!(row[4], "155.5");
        assert_eq!(row[6], "true");
    }

    #[test]
    fn staff_payload_replaces_pin_with_hash() {
        let mut fields = serde_json::from_value::<Map<String, Value>>(json!({
            "name": "Amina",
            "role": "cashier",
            "pin": "4321"
        }))
        .unwrap();
        Staff::prepare_payload(&mut fields, true).expect("pin hashing should succeed");
        assert!(fields.get("pin").is_none());
        let hash = fields
            .get("pin_hash")
            .and_then(Value::as_str)
            .expect("pin_hash should be set");
        assert!(bcrypt::verify("4321", hash).unwrap());
    }

    #[test]
    fn staff_payload_without_pin_is_untouched() {
        let mut fields = serde_json::from_value::<Map<String, Value>>(json!({
            "name": "Amina",
            "role": "cashier"
        }))
        .unwrap();
        Staff::prepare_payload(&mut fields, false).unwrap();
        assert!(fields.get("pin_hash").is_none());
    }

    #[test]
    fn webhook_create_payload_gets_a_secret() {
        let mut fields = serde_json::from_value::<Map<String, Value>>(json!({
            "url": "https://example.com/hook",
            "event": "sale.created"
        }))
        .unwrap();
        Webhook::prepare_payload(&mut fields, true).unwrap();
        let secret = fields.get("secret").and_then(Value::as_str).unwrap();
        assert!(secret.starts_with("whs_"));

        // A second webhook gets a different secret.
        assert_ne!(Webhook::generate_secret(), Webhook::generate_secret());
    }
}
