//! Read-only detail projections.
//!
//! A detail view is a pure projection of one record plus whatever
//! denormalized relations the list response already embedded — it never
//! fetches. Relations the backend omitted render as `Product #<id>`
//! placeholders. The shortcut actions hand back to the form and bulk layers.

use serde::Serialize;
use serde_json::Value;

use crate::models::{Order, Sale};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailRow {
    pub label: String,
    pub value: String,
}

impl DetailRow {
    fn new(label: &str, value: impl Into<String>) -> Self {
        Self {
            label: label.to_string(),
            value: value.into(),
        }
    }
}

/// Shortcut actions offered from a detail view; the caller hands them off to
/// the mutation form or the bulk bar and closes the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailAction {
    Edit,
    Delete,
}

/// Placeholder rendering for a relation the list response did not embed.
pub fn product_label(product_id: i64, name: Option<&str>) -> String {
    match name {
        Some(n) if !n.trim().is_empty() => n.to_string(),
        _ => format!("Product #{product_id}"),
    }
}

/// Generic flat projection: every top-level field of the record as one row,
/// labels in alphabetical order.
pub fn record_rows<R: Serialize>(record: &R) -> Vec<DetailRow> {
    let Ok(Value::Object(map)) = serde_json::to_value(record) else {
        return Vec::new();
    };
    map.into_iter()
        .map(|(label, value)| DetailRow {
            label,
            value: scalar_text(&value),
        })
        .collect()
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Order detail: header fields plus one row per embedded line item.
pub fn order_rows(order: &Order) -> Vec<DetailRow> {
    let supplier = match order.supplier_name.as_deref() {
        Some(n) if !n.trim().is_empty() => n.to_string(),
        _ => order
            .supplier_id
            .map(|id| format!("Supplier #{id}"))
            .unwrap_or_default(),
    };
    let mut rows = vec![
        DetailRow::new("Order", format!("#{}", order.id)),
        DetailRow::new("Supplier", supplier),
        DetailRow::new("Status", order.status.clone()),
        DetailRow::new("Total", order.total.to_string()),
    ];
    for line in &order.items {
        rows.push(DetailRow::new(
            &product_label(line.product_id, line.product_name.as_deref()),
            format!("{} x {}", line.quantity, line.unit_price),
        ));
    }
    rows
}

/// Sale detail with the denormalized product name (or its placeholder).
pub fn sale_rows(sale: &Sale) -> Vec<DetailRow> {
    vec![
        DetailRow::new("Sale", format!("#{}", sale.id)),
        DetailRow::new(
            "Product",
            product_label(sale.product_id, sale.product_name.as_deref()),
        ),
        DetailRow::new("Quantity", sale.quantity.to_string()),
        DetailRow::new("Unit price", sale.unit_price.to_string()),
        DetailRow::new("Total", sale.total.to_string()),
        DetailRow::new(
            "Payment",
            sale.payment_method.clone().unwrap_or_default(),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderLine, Supplier};

    #[test]
    fn omitted_relation_renders_placeholder() {
        assert_eq!(product_label(7, None), "Product #7");
        assert_eq!(product_label(7, Some("  ")), "Product #7");
        assert_eq!(product_label(7, Some("Unga 2kg")), "Unga 2kg");
    }

    #[test]
    fn order_rows_include_embedded_lines() {
        let order = Order {
            id: 12,
            shop_id: 5,
            supplier_id: Some(3),
            supplier_name: None,
            status: "pending".to_string(),
            total: 3700.0,
            items: vec![
                OrderLine {
                    product_id: 7,
                    product_name: Some("Unga 2kg".to_string()),
                    quantity: 10,
                    unit_price: 185.0,
                },
                OrderLine {
                    product_id: 8,
                    product_name: None,
                    quantity: 12,
                    unit_price: 155.0,
                },
            ],
            created_at: None,
        };

        let rows = order_rows(&order);
        assert_eq!(rows[1], DetailRow::new("Supplier", "Supplier #3"));
        assert_eq!(rows[4], DetailRow::new("Unga 2kg", "10 x 185"));
        assert_eq!(rows[5], DetailRow::new("Product #8", "12 x 155"));
    }

    #[test]
    fn generic_rows_cover_every_field() {
        let supplier = Supplier {
            id: 3,
            shop_id: 5,
            name: "Bidco Depot".to_string(),
            phone: Some("254733000111".to_string()),
            email: None,
            created_at: None,
        };
        let rows = record_rows(&supplier);
        assert!(rows
            .iter()
            .any(|r| r.label == "name" && r.value == "Bidco Depot"));
        assert!(rows.iter().any(|r| r.label == "email" && r.value.is_empty()));
    }
}
