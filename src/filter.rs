//! Conjunctive filter state for list fetches.
//!
//! Blank pieces are omitted from the query string; everything present is
//! combined conjunctively by the backend.

use chrono::NaiveDate;

use crate::session::ShopId;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterState {
    /// Free-text search; fetches driven by this field are debounced.
    pub search: String,
    pub category: Option<String>,
    pub status: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl FilterState {
    /// Query parameters for a list fetch, always led by the shop scope.
    pub fn query_pairs(&self, shop: ShopId) -> Vec<(String, String)> {
        let mut pairs = vec![("shop_id".to_string(), shop.to_string())];

        let search = self.search.trim();
        if !search.is_empty() {
            pairs.push(("search".to_string(), search.to_string()));
        }
        if let Some(category) = self.category.as_deref().map(str::trim) {
            if !category.is_empty() {
                pairs.push(("category".to_string(), category.to_string()));
            }
        }
        if let Some(status) = self.status.as_deref().map(str::trim) {
            if !status.is_empty() {
                pairs.push(("status".to_string(), status.to_string()));
            }
        }
        if let Some(from) = self.date_from {
            pairs.push(("date_from".to_string(), from.format("%Y-%m-%d").to_string()));
        }
        if let Some(to) = self.date_to {
            pairs.push(("date_to".to_string(), to.format("%Y-%m-%d").to_string()));
        }

        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_filter_sends_only_shop_scope() {
        let pairs = FilterState::default().query_pairs(5);
        assert_eq!(pairs, vec![("shop_id".to_string(), "5".to_string())]);
    }

    #[test]
    fn full_filter_is_conjunctive_and_trimmed() {
        let filter = FilterState {
            search: "  unga  ".to_string(),
            category: Some("Dry goods".to_string()),
            status: Some("  ".to_string()),
            date_from: NaiveDate::from_ymd_opt(2025, 11, 1),
            date_to: NaiveDate::from_ymd_opt(2025, 11, 30),
        };
        let pairs = filter.query_pairs(12);
        assert_eq!(
            pairs,
            vec![
                ("shop_id".to_string(), "12".to_string()),
                ("search".to_string(), "unga".to_string()),
                ("category".to_string(), "Dry goods".to_string()),
                ("date_from".to_string(), "2025-11-01".to_string()),
                ("date_to".to_string(), "2025-11-30".to_string()),
            ]
        );
    }
}
