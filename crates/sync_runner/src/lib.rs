use async_trait::async_trait;
use thiserror::Error;

pub mod controller;
pub mod mapper;
pub mod reconcile;
pub mod record;
pub mod remote;
pub mod report;
pub mod state;

pub use controller::{execute, ExecutorOptions, Reconciler, ReconcilerOptions};
pub use mapper::{slugify, FieldMapper, SLUG_FIELD};
pub use reconcile::{plan, Operation, OperationKind, Plan, PlanOptions};
pub use record::{MappedFields, SourceRecord, TargetItem};
pub use remote::{source_from_config, target_from_config, AirtableClient, ApiClient, WebflowClient};
pub use report::{OperationFailure, OperationOutcome, RunReport};
pub use state::{IdentityIndex, RunPhase};

/// Failure of a single call against the source or target store.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} responded with status {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("Invalid URL: {0}")]
    Url(String),
}

impl ClientError {
    /// HTTP status of a non-success response, if that is what failed.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::Url(_) => None,
        }
    }
}

/// Failure of a whole reconciliation run.
///
/// Operation failures never show up here, they end up in the [`RunReport`].
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Failed to fetch source records: {0}")]
    SourceFetch(#[source] ClientError),

    #[error("Failed to fetch target items: {0}")]
    TargetFetch(#[source] ClientError),

    #[error("Run cancelled before execution")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Config error: {0}")]
    Config(#[from] tablesync_config::ConfigError),
}

// ============================================================================
// Client traits - abstract the remote stores (mockable for tests)
// ============================================================================

/// Read access to the source-of-truth store.
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Fetches all records of a collection (table).
    async fn fetch_records(&self, collection: &str) -> Result<Vec<SourceRecord>, ClientError>;
}

/// Read/write access to the published-content store.
#[async_trait]
pub trait TargetClient: Send + Sync {
    /// Lists all items of the configured collection
    async fn fetch_items(&self) -> Result<Vec<TargetItem>, ClientError>;

    /// Creates a new item and returns it
    async fn create_item(&self, fields: &MappedFields) -> Result<TargetItem, ClientError>;

    /// Replaces the fields of an existing item
    async fn update_item(
        &self,
        item_id: &str,
        fields: &MappedFields,
    ) -> Result<TargetItem, ClientError>;

    /// Removes an item
    async fn delete_item(&self, item_id: &str) -> Result<(), ClientError>;
}

// ============================================================================
// RunObserver - progress events of a run
// ============================================================================

/// Receives progress events of a reconciliation run.
///
/// All methods default to no-ops.
pub trait RunObserver: Send + Sync {
    /// Called on every phase transition
    fn on_phase(&self, _phase: RunPhase) {}

    /// Called after both sides were fetched
    fn on_fetched(&self, _records: usize, _items: usize) {}

    /// Called once the plan is computed
    fn on_plan(&self, _plan: &Plan) {}

    /// Called after each operation, in plan order
    fn on_outcome(&self, _outcome: &OperationOutcome) {}

    /// Called when execution finished
    fn on_complete(&self, _report: &RunReport) {}

    /// Called when the run aborts
    fn on_error(&self, _error: &SyncError) {}
}

/// Observer that turns run events into `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl RunObserver for LogObserver {
    fn on_phase(&self, phase: RunPhase) {
        tracing::debug!(%phase, "Run phase changed");
    }

    fn on_fetched(&self, records: usize, items: usize) {
        tracing::info!(records, items, "Fetched source records and target items");
    }

    fn on_plan(&self, plan: &Plan) {
        tracing::info!(
            deletes = plan.count(OperationKind::Delete),
            updates = plan.count(OperationKind::Update),
            creates = plan.count(OperationKind::Create),
            unchanged = plan.unchanged(),
            "Planned reconciliation"
        );
    }

    fn on_outcome(&self, outcome: &OperationOutcome) {
        let op = &outcome.operation;
        match &outcome.error {
            None => match op {
                Operation::Delete { target_item_id } => {
                    tracing::info!(item = %target_item_id, "Deleting target item");
                }
                Operation::Update { target_item_id, .. } => {
                    tracing::info!(item = %target_item_id, "Updating target item");
                }
                Operation::Create { .. } => {
                    tracing::info!(operation = %op.describe(), "Adding new target item");
                }
            },
            Some(reason) => {
                tracing::warn!(operation = %op.describe(), %reason, "Target operation failed");
            }
        }
    }

    fn on_complete(&self, report: &RunReport) {
        tracing::info!(
            deleted = report.deleted,
            updated = report.updated,
            created = report.created,
            unchanged = report.unchanged,
            failed = report.failed,
            duration_ms = report.duration_ms,
            "Reconciliation finished"
        );
    }

    fn on_error(&self, error: &SyncError) {
        tracing::error!(%error, "Reconciliation aborted");
    }
}

// ============================================================================
// Test Utilities - exported for integration tests
// ============================================================================

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils {
    use super::*;
    use serde_json::{json, Map, Value};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    fn injected(status: u16) -> ClientError {
        ClientError::Status {
            service: "mock",
            status,
            body: "injected failure".to_string(),
        }
    }

    /// Builds a source record with a `Name` field.
    pub fn source_record(id: &str, name: &str) -> SourceRecord {
        let mut fields = Map::new();
        fields.insert("Name".to_string(), json!(name));
        SourceRecord::new(id, fields)
    }

    /// Builds a target item linked to `record_id` via `sourceRecordId`.
    pub fn linked_item(id: &str, record_id: &str) -> TargetItem {
        let mut data = Map::new();
        data.insert("sourceRecordId".to_string(), json!(record_id));
        TargetItem::new(id, data)
    }

    /// Mock source store
    #[derive(Default)]
    pub struct MockSource {
        records: Mutex<Vec<SourceRecord>>,
        fail_status: Mutex<Option<u16>>,
        fetch_calls: Mutex<Vec<String>>,
    }

    impl MockSource {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_records(records: Vec<SourceRecord>) -> Self {
            let source = Self::default();
            source.set_records(records);
            source
        }

        pub fn set_records(&self, records: Vec<SourceRecord>) {
            *self.records.lock().unwrap() = records;
        }

        /// Makes every fetch fail with the given status
        pub fn fail_with(&self, status: u16) {
            *self.fail_status.lock().unwrap() = Some(status);
        }

        /// Collections that were fetched
        pub fn fetch_calls(&self) -> Vec<String> {
            self.fetch_calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SourceClient for MockSource {
        async fn fetch_records(&self, collection: &str) -> Result<Vec<SourceRecord>, ClientError> {
            self.fetch_calls.lock().unwrap().push(collection.to_string());
            if let Some(status) = *self.fail_status.lock().unwrap() {
                return Err(injected(status));
            }
            Ok(self.records.lock().unwrap().clone())
        }
    }

    /// Mock target store.
    ///
    /// Writes are applied to the in-memory item list, so a second run sees
    /// the result of the first. Calls are logged as `"delete:<id>"`,
    /// `"update:<id>"` and `"create:<slug>"`.
    #[derive(Default)]
    pub struct MockTarget {
        items: Mutex<Vec<TargetItem>>,
        calls: Mutex<Vec<String>>,
        failing: Mutex<HashSet<String>>,
        fail_fetch: Mutex<Option<u16>>,
        next_id: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        delay: Mutex<Option<Duration>>,
    }

    impl MockTarget {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_items(items: Vec<TargetItem>) -> Self {
            let target = Self::default();
            *target.items.lock().unwrap() = items;
            target
        }

        pub fn items(&self) -> Vec<TargetItem> {
            self.items.lock().unwrap().clone()
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        /// Fails operations on the given item id (update/delete) or slug (create)
        pub fn fail_on(&self, key: &str) {
            self.failing.lock().unwrap().insert(key.to_string());
        }

        /// Makes `fetch_items` fail with the given status
        /// Makes every write take `delay` instead of a single yield
        pub fn set_delay(&self, delay: Duration) {
            *self.delay.lock().unwrap() = Some(delay);
        }

        pub fn fail_fetch_with(&self, status: u16) {
            *self.fail_fetch.lock().unwrap() = Some(status);
        }

        /// Highest number of operations that were running at the same time
        pub fn max_in_flight(&self) -> usize {
            self.max_in_flight.load(Ordering::SeqCst)
        }

        async fn begin(&self, call: String, key: &str) -> Result<(), ClientError> {
            self.calls.lock().unwrap().push(call);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            // Give sibling operations a chance to start
            let delay = *self.delay.lock().unwrap();
            match delay {
                Some(delay) => tokio::time::sleep(delay).await,
                None => tokio::task::yield_now().await,
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if self.failing.lock().unwrap().contains(key) {
                return Err(injected(500));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl TargetClient for MockTarget {
        async fn fetch_items(&self) -> Result<Vec<TargetItem>, ClientError> {
            if let Some(status) = *self.fail_fetch.lock().unwrap() {
                return Err(injected(status));
            }
            Ok(self.items())
        }

        async fn create_item(&self, fields: &MappedFields) -> Result<TargetItem, ClientError> {
            let slug = fields.get(SLUG_FIELD).and_then(Value::as_str).unwrap_or_default();
            self.begin(format!("create:{slug}"), slug).await?;

            let id = format!("item-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
            let item = TargetItem::new(id, fields.clone());
            self.items.lock().unwrap().push(item.clone());
            Ok(item)
        }

        async fn update_item(
            &self,
            item_id: &str,
            fields: &MappedFields,
        ) -> Result<TargetItem, ClientError> {
            self.begin(format!("update:{item_id}"), item_id).await?;

            let mut items = self.items.lock().unwrap();
            let item = items
                .iter_mut()
                .find(|i| i.id == item_id)
                .ok_or_else(|| injected(404))?;
            item.field_data = fields.clone();
            Ok(item.clone())
        }

        async fn delete_item(&self, item_id: &str) -> Result<(), ClientError> {
            self.begin(format!("delete:{item_id}"), item_id).await?;

            let mut items = self.items.lock().unwrap();
            let before = items.len();
            items.retain(|i| i.id != item_id);
            if items.len() == before {
                return Err(injected(404));
            }
            Ok(())
        }
    }

    /// Observer that records every event as a string
    #[derive(Default)]
    pub struct RecordingObserver {
        events: Mutex<Vec<String>>,
    }

    impl RecordingObserver {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        /// Phases in the order they were entered
        pub fn phases(&self) -> Vec<String> {
            self.events()
                .into_iter()
                .filter_map(|e| e.strip_prefix("phase:").map(str::to_string))
                .collect()
        }

        fn push(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }
    }

    impl RunObserver for RecordingObserver {
        fn on_phase(&self, phase: RunPhase) {
            self.push(format!("phase:{phase}"));
        }
        fn on_fetched(&self, records: usize, items: usize) {
            self.push(format!("fetched:{records}:{items}"));
        }
        fn on_plan(&self, plan: &Plan) {
            self.push(format!("plan:{}", plan.len()));
        }
        fn on_outcome(&self, outcome: &OperationOutcome) {
            let status = if outcome.is_success() { "ok" } else { "failed" };
            self.push(format!("outcome:{}:{status}", outcome.operation.describe()));
        }
        fn on_complete(&self, report: &RunReport) {
            self.push(format!(
                "complete:{}:{}:{}:{}",
                report.deleted, report.updated, report.created, report.failed
            ));
        }
        fn on_error(&self, error: &SyncError) {
            self.push(format!("error:{error}"));
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_status() {
        let err = ClientError::Status {
            service: "Webflow",
            status: 404,
            body: "not found".to_string(),
        };
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.to_string(), "Webflow responded with status 404: not found");
        assert_eq!(ClientError::Url("x".to_string()).status(), None);
    }

    #[test]
    fn test_sync_error_message_includes_cause() {
        let err = SyncError::SourceFetch(ClientError::Status {
            service: "Airtable",
            status: 401,
            body: "unauthorized".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "Failed to fetch source records: Airtable responded with status 401: unauthorized"
        );
    }
}
