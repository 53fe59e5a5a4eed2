//! Shop-scoped resource list controller.
//!
//! One controller instance backs one page's table: it owns the fetched
//! Collection, the Selection set, and the Filter state, and it is the only
//! thing that mutates them. Every fetch is tagged with a monotonically
//! increasing sequence number; a response only applies while it is the latest
//! issued, so a slow response can never overwrite newer data.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::api::{self, Transport};
use crate::bulk::{self, BulkOutcome, Confirmation};
use crate::debounce::Debouncer;
use crate::export::{self, ExportFormat};
use crate::filter::FilterState;
use crate::models::Resource;
use crate::session::ShopId;

/// Page lifecycle: `Idle` until a shop is selected, then
/// `Loading -> {Loaded, Error}`. The page persists in `Loaded`/`Error` until
/// navigated away; mutations run through the form and land back here via
/// `refresh`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListPhase {
    /// No shop selected; no request may be issued.
    Idle,
    Loading,
    Loaded,
    Error(String),
}

/// Point-in-time copy of the controller state for rendering.
#[derive(Debug, Clone)]
pub struct ListSnapshot<R> {
    pub phase: ListPhase,
    pub records: Vec<R>,
    pub selection: Vec<i64>,
}

struct ListInner<R> {
    shop: Option<ShopId>,
    filter: FilterState,
    phase: ListPhase,
    records: Vec<R>,
    selection: BTreeSet<i64>,
}

pub struct ListController<R: Resource> {
    transport: Arc<dyn Transport>,
    inner: Arc<Mutex<ListInner<R>>>,
    /// Sequence number of the most recently issued fetch. A response applies
    /// only while its own sequence is still the latest.
    issued: Arc<AtomicU64>,
    debouncer: Arc<Debouncer>,
}

impl<R: Resource> Clone for ListController<R> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            inner: Arc::clone(&self.inner),
            issued: Arc::clone(&self.issued),
            debouncer: Arc::clone(&self.debouncer),
        }
    }
}

impl<R: Resource> ListController<R> {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            inner: Arc::new(Mutex::new(ListInner {
                shop: None,
                filter: FilterState::default(),
                phase: ListPhase::Idle,
                records: Vec::new(),
                selection: BTreeSet::new(),
            })),
            issued: Arc::new(AtomicU64::new(0)),
            debouncer: Arc::new(Debouncer::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ListInner<R>> {
        self.inner.lock().expect("list controller lock poisoned")
    }

    pub fn shop(&self) -> Option<ShopId> {
        self.lock().shop
    }

    pub fn filter(&self) -> FilterState {
        self.lock().filter.clone()
    }

    pub fn snapshot(&self) -> ListSnapshot<R> {
        let guard = self.lock();
        ListSnapshot {
            phase: guard.phase.clone(),
            records: guard.records.clone(),
            selection: guard.selection.iter().copied().collect(),
        }
    }

    /// Switch the tenant scope. The Collection and Selection are discarded
    /// immediately; with a shop present a fresh fetch is issued, otherwise
    /// the controller rests in `Idle`.
    pub async fn set_shop(&self, shop: Option<ShopId>) -> Result<(), String> {
        self.debouncer.cancel();
        // Invalidate any in-flight fetch from the previous scope.
        self.issued.fetch_add(1, Ordering::SeqCst);
        {
            let mut guard = self.lock();
            guard.shop = shop;
            guard.records.clear();
            guard.selection.clear();
            guard.phase = ListPhase::Idle;
        }
        match shop {
            Some(_) => self.refresh().await,
            None => Ok(()),
        }
    }

    /// Fetch the Collection for the current shop and filters. Used on shop
    /// selection, on filter changes, and after every successful mutation.
    pub async fn refresh(&self) -> Result<(), String> {
        let (shop, filter) = {
            let mut guard = self.lock();
            let Some(shop) = guard.shop else {
                guard.phase = ListPhase::Idle;
                return Ok(());
            };
            if guard.records.is_empty() {
                guard.phase = ListPhase::Loading;
            }
            (shop, guard.filter.clone())
        };

        let seq = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let result = api::list_records::<R>(self.transport.as_ref(), shop, &filter).await;

        let mut guard = self.lock();
        if self.issued.load(Ordering::SeqCst) != seq {
            debug!(resource = R::NOUN, seq, "discarding superseded list response");
            return Ok(());
        }

        match result {
            Ok(records) => {
                let ids: BTreeSet<i64> = records.iter().map(Resource::id).collect();
                guard.selection.retain(|id| ids.contains(id));
                guard.records = records;
                guard.phase = ListPhase::Loaded;
                Ok(())
            }
            Err(e) => {
                let msg = e.to_string();
                warn!(resource = R::NOUN, error = %msg, "list fetch failed");
                guard.records.clear();
                guard.selection.clear();
                guard.phase = ListPhase::Error(msg.clone());
                Err(msg)
            }
        }
    }

    /// Update the search text and schedule a debounced refetch. Rapid calls
    /// inside the window coalesce into one fetch carrying the final text.
    pub fn set_search(&self, text: &str) {
        self.lock().filter.search = text.to_string();
        let controller = self.clone();
        self.debouncer.schedule(move || async move {
            let _ = controller.refresh().await;
        });
    }

    /// Non-text filters refetch immediately.
    pub async fn set_category(&self, category: Option<String>) -> Result<(), String> {
        self.lock().filter.category = category;
        self.refresh().await
    }

    pub async fn set_status(&self, status: Option<String>) -> Result<(), String> {
        self.lock().filter.status = status;
        self.refresh().await
    }

    pub async fn set_date_range(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<(), String> {
        {
            let mut guard = self.lock();
            guard.filter.date_from = from;
            guard.filter.date_to = to;
        }
        self.refresh().await
    }

    // -- Selection ----------------------------------------------------------

    /// Toggle one record's selection. Ids not present in the Collection are
    /// ignored, keeping the Selection a subset of rendered ids.
    pub fn toggle_selected(&self, id: i64) {
        let mut guard = self.lock();
        if !guard.records.iter().any(|r| r.id() == id) {
            return;
        }
        if !guard.selection.remove(&id) {
            guard.selection.insert(id);
        }
    }

    pub fn select_all(&self) {
        let mut guard = self.lock();
        let ids: Vec<i64> = guard.records.iter().map(Resource::id).collect();
        guard.selection.extend(ids);
    }

    pub fn clear_selection(&self) {
        self.lock().selection.clear();
    }

    /// Selected ids in Collection order.
    pub fn selected_ids(&self) -> Vec<i64> {
        let guard = self.lock();
        guard
            .records
            .iter()
            .map(Resource::id)
            .filter(|id| guard.selection.contains(id))
            .collect()
    }

    /// Selected records in Collection order.
    pub fn selected_records(&self) -> Vec<R> {
        let guard = self.lock();
        guard
            .records
            .iter()
            .filter(|r| guard.selection.contains(&r.id()))
            .cloned()
            .collect()
    }

    // -- Bulk actions -------------------------------------------------------

    /// Delete every selected record through the batch endpoint, then refetch.
    ///
    /// Succeeded ids leave the Selection; failed ids stay selected so the
    /// user can retry. The Collection converges on server truth via the
    /// follow-up refetch either way.
    pub async fn bulk_delete_selected(
        &self,
        confirmation: Confirmation,
    ) -> Result<BulkOutcome, String> {
        let ids = self.selected_ids();
        if ids.is_empty() {
            return Ok(BulkOutcome::default());
        }

        let outcome =
            bulk::bulk_delete(self.transport.as_ref(), R::PATH, &ids, confirmation).await?;
        {
            let mut guard = self.lock();
            if outcome.failed.is_empty() {
                guard.selection.clear();
            } else {
                let failed: BTreeSet<i64> = outcome.failed.iter().copied().collect();
                guard.selection.retain(|id| failed.contains(id));
            }
        }
        // The refetch runs regardless of per-id outcome; its own error state
        // is already surfaced through the phase.
        let _ = self.refresh().await;
        Ok(outcome)
    }

    /// Client-side CSV of the current selection, Collection order.
    pub fn export_selected_csv(&self) -> String {
        let guard = self.lock();
        let selected: Vec<&R> = guard
            .records
            .iter()
            .filter(|r| guard.selection.contains(&r.id()))
            .collect();
        export::csv_export::<R>(&selected)
    }

    /// Server-side export for resources where the backend renders the file.
    pub async fn server_export(&self, format: ExportFormat) -> Result<Vec<u8>, String> {
        let shop = self
            .shop()
            .ok_or_else(|| "No shop selected".to_string())?;
        export::server_export(self.transport.as_ref(), R::PATH, shop, format).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::StubTransport;
    use crate::error::ApiError;
    use crate::models::Product;
    use reqwest::Method;
    use serde_json::json;
    use std::time::Duration;

    fn product_json(id: i64, shop: i64, name: &str) -> serde_json::Value {
        json!({ "id": id, "shop_id": shop, "name": name, "price": 10.0 })
    }

    fn controller(stub: Arc<StubTransport>) -> ListController<Product> {
        ListController::new(stub)
    }

    #[tokio::test]
    async fn no_shop_means_idle_and_zero_requests() {
        let stub = Arc::new(StubTransport::new());
        let ctl = controller(stub.clone());

        ctl.set_shop(None).await.unwrap();
        ctl.refresh().await.unwrap();

        assert_eq!(ctl.snapshot().phase, ListPhase::Idle);
        assert_eq!(stub.call_count(), 0);
    }

    #[tokio::test]
    async fn shop_switch_discards_collection_and_refetches_scoped() {
        let stub = Arc::new(StubTransport::new());
        stub.push_ok(json!({ "data": [product_json(1, 5, "Unga"), product_json(2, 5, "Sugar")] }));
        stub.push_ok(json!([product_json(7, 9, "Chai")]));

        let ctl = controller(stub.clone());
        ctl.set_shop(Some(5)).await.unwrap();
        ctl.toggle_selected(1);
        assert_eq!(ctl.snapshot().records.len(), 2);

        ctl.set_shop(Some(9)).await.unwrap();
        let snap = ctl.snapshot();
        assert_eq!(snap.phase, ListPhase::Loaded);
        assert_eq!(snap.records.len(), 1);
        assert_eq!(snap.records[0].id, 7);
        assert!(snap.selection.is_empty());

        let calls = stub.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[1]
            .query
            .contains(&("shop_id".to_string(), "9".to_string())));
    }

    #[tokio::test]
    async fn fetch_failure_clears_collection_and_records_error() {
        let stub = Arc::new(StubTransport::new());
        stub.push_ok(json!([product_json(1, 5, "Unga")]));
        stub.push_err(ApiError::Status {
            status: 500,
            detail: None,
        });

        let ctl = controller(stub.clone());
        ctl.set_shop(Some(5)).await.unwrap();
        ctl.toggle_selected(1);

        let err = ctl.refresh().await.expect_err("500 must surface");
        assert!(err.contains("server error"));

        let snap = ctl.snapshot();
        assert!(snap.records.is_empty());
        assert!(snap.selection.is_empty());
        assert!(matches!(snap.phase, ListPhase::Error(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_search_edits_coalesce_into_one_fetch_of_final_text() {
        let stub = Arc::new(StubTransport::new());
        stub.push_ok(json!([]));
        stub.push_ok(json!([]));

        let ctl = controller(stub.clone());
        ctl.set_shop(Some(5)).await.unwrap();
        assert_eq!(stub.call_count(), 1);

        ctl.set_search("u");
        tokio::time::advance(Duration::from_millis(100)).await;
        ctl.set_search("un");
        tokio::time::advance(Duration::from_millis(100)).await;
        ctl.set_search("unga");
        tokio::time::advance(Duration::from_millis(350)).await;
        tokio::task::yield_now().await;

        let calls = stub.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[1]
            .query
            .contains(&("search".to_string(), "unga".to_string())));
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_response_cannot_overwrite_newer_data() {
        let stub = Arc::new(StubTransport::new());
        stub.push_ok(json!([]));
        // First refresh resolves slowly, second quickly.
        stub.push_delayed(
            Duration::from_millis(500),
            Ok(json!([product_json(1, 5, "Stale")])),
        );
        stub.push_delayed(
            Duration::from_millis(100),
            Ok(json!([product_json(2, 5, "Fresh")])),
        );

        let ctl = controller(stub.clone());
        ctl.set_shop(Some(5)).await.unwrap();

        let slow = ctl.clone();
        let slow_task = tokio::spawn(async move { slow.refresh().await });
        tokio::task::yield_now().await;
        let fast = ctl.clone();
        let fast_task = tokio::spawn(async move { fast.refresh().await });
        tokio::time::advance(Duration::from_millis(600)).await;
        slow_task.await.unwrap().unwrap();
        fast_task.await.unwrap().unwrap();

        let snap = ctl.snapshot();
        assert_eq!(snap.records.len(), 1);
        assert_eq!(snap.records[0].name, "Fresh");
    }

    #[tokio::test]
    async fn selection_stays_subset_of_collection() {
        let stub = Arc::new(StubTransport::new());
        stub.push_ok(json!([product_json(1, 5, "Unga"), product_json(2, 5, "Sugar")]));
        stub.push_ok(json!([product_json(2, 5, "Sugar")]));

        let ctl = controller(stub.clone());
        ctl.set_shop(Some(5)).await.unwrap();

        ctl.toggle_selected(99); // not in the collection
        assert!(ctl.snapshot().selection.is_empty());

        ctl.select_all();
        assert_eq!(ctl.snapshot().selection, vec![1, 2]);

        // Record 1 disappears server-side; the refetch prunes its id.
        ctl.refresh().await.unwrap();
        assert_eq!(ctl.snapshot().selection, vec![2]);
    }

    #[tokio::test]
    async fn bulk_delete_reports_partial_failure_and_keeps_failed_selected() {
        let stub = Arc::new(StubTransport::new());
        stub.push_ok(json!([
            product_json(1, 5, "Unga"),
            product_json(2, 5, "Sugar"),
            product_json(3, 5, "Chai")
        ]));
        stub.push_ok(json!({ "succeeded": [1, 3], "failed": [2] }));
        stub.push_ok(json!([product_json(2, 5, "Sugar")]));

        let ctl = controller(stub.clone());
        ctl.set_shop(Some(5)).await.unwrap();
        ctl.select_all();

        let outcome = ctl
            .bulk_delete_selected(Confirmation::confirmed())
            .await
            .unwrap();
        assert_eq!(outcome.succeeded, vec![1, 3]);
        assert_eq!(outcome.failed, vec![2]);

        let snap = ctl.snapshot();
        assert_eq!(snap.records.len(), 1);
        assert_eq!(snap.selection, vec![2]);

        let calls = stub.calls();
        assert_eq!(calls[1].method, Method::POST);
        assert_eq!(calls[1].path, "/v1/products/bulk-delete");
        assert_eq!(calls[1].body, Some(json!({ "ids": [1, 2, 3] })));
    }

    #[tokio::test]
    async fn empty_selection_bulk_delete_issues_no_request() {
        let stub = Arc::new(StubTransport::new());
        stub.push_ok(json!([product_json(1, 5, "Unga")]));

        let ctl = controller(stub.clone());
        ctl.set_shop(Some(5)).await.unwrap();

        let outcome = ctl
            .bulk_delete_selected(Confirmation::confirmed())
            .await
            .unwrap();
        assert!(outcome.succeeded.is_empty());
        assert_eq!(stub.call_count(), 1);
    }
}
