//! Reconciler - runs fetch, plan and execute as one unit
//!
//! A run is a straight pipeline, there is no loop:
//!
//! ```text
//! Idle -> FetchingSource -> FetchingTarget -> Planning -> Executing -> Done
//! ```
//!
//! Fetch failures and cancellation end in `Failed`. Once execution started
//! the run reaches `Done` and failed operations are only counted. A crashed
//! execution task stops in `Executing` and reports `SyncError::Internal`.

use std::future::Future;
use std::sync::Arc;

use tablesync_config::Config;
use tokio::sync::watch;

use crate::controller::executor::{execute, ExecutorOptions};
use crate::mapper::FieldMapper;
use crate::reconcile::{plan, Plan, PlanOptions};
use crate::record::{SourceRecord, TargetItem};
use crate::report::RunReport;
use crate::state::{RunPhase, RunState};
use crate::{LogObserver, RunObserver, SourceClient, SyncError, TargetClient};

/// Everything a run needs besides the clients.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcilerOptions {
    /// Source collection (table) to read
    pub collection: String,
    pub plan: PlanOptions,
    pub executor: ExecutorOptions,
}

impl ReconcilerOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            collection: config.source.collection.clone(),
            plan: PlanOptions {
                skip_unchanged: config.sync.skip_unchanged,
            },
            executor: ExecutorOptions {
                concurrency: config.sync.concurrency,
            },
        }
    }
}

/// Drives reconciliation runs between one source and one target.
///
/// Runs must not overlap: callers serialize them.
pub struct Reconciler<S: ?Sized = dyn SourceClient, T: ?Sized = dyn TargetClient> {
    source: Arc<S>,
    target: Arc<T>,
    mapper: FieldMapper,
    options: ReconcilerOptions,
    observer: Arc<dyn RunObserver>,
}

impl<S, T> Reconciler<S, T>
where
    S: SourceClient + ?Sized,
    T: TargetClient + ?Sized + 'static,
{
    /// Creates a reconciler that logs through [`LogObserver`].
    pub fn new(
        source: Arc<S>,
        target: Arc<T>,
        mapper: FieldMapper,
        options: ReconcilerOptions,
    ) -> Self {
        Self {
            source,
            target,
            mapper,
            options,
            observer: Arc::new(LogObserver),
        }
    }

    /// Replaces the observer.
    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn options(&self) -> &ReconcilerOptions {
        &self.options
    }

    /// Runs one full reconciliation.
    pub async fn run(&self) -> Result<RunReport, SyncError> {
        // Sender stays alive for the whole run, so the run is never cancelled
        let (_tx, rx) = watch::channel(false);
        self.run_cancellable(rx).await
    }

    /// Runs one full reconciliation, abandoning it when `cancel` turns `true`
    /// before execution started.
    pub async fn run_cancellable(
        &self,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<RunReport, SyncError> {
        let mut state = RunState::new();
        let (records, items) = self.fetch(&mut state, &mut cancel).await?;

        let plan = self.plan(&mut state, &records, &items);

        self.enter(&mut state, RunPhase::Executing);
        let target = Arc::clone(&self.target);
        let observer = Arc::clone(&self.observer);
        let executor = self.options.executor;

        // In-flight operations finish even when the caller goes away
        let handle = tokio::spawn(async move {
            execute(plan, target.as_ref(), &executor, observer.as_ref()).await
        });
        let report = match handle.await {
            Ok(report) => report,
            Err(e) => {
                let error = SyncError::Internal(format!("Execution task failed: {e}"));
                self.observer.on_error(&error);
                return Err(error);
            }
        };

        self.enter(&mut state, RunPhase::Done);
        self.observer.on_complete(&report);
        Ok(report)
    }

    /// Fetches and plans without touching the target (dry run).
    pub async fn plan_only(&self) -> Result<Plan, SyncError> {
        let (_tx, mut cancel) = watch::channel(false);
        let mut state = RunState::new();
        let (records, items) = self.fetch(&mut state, &mut cancel).await?;

        let plan = self.plan(&mut state, &records, &items);
        self.enter(&mut state, RunPhase::Done);
        Ok(plan)
    }

    async fn fetch(
        &self,
        state: &mut RunState,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<(Vec<SourceRecord>, Vec<TargetItem>), SyncError> {
        self.enter(state, RunPhase::FetchingSource);
        let fetch_records = self.source.fetch_records(&self.options.collection);
        let records = match until_cancelled(cancel, fetch_records).await {
            Some(Ok(records)) => records,
            Some(Err(e)) => return Err(self.fail(state, SyncError::SourceFetch(e))),
            None => return Err(self.fail(state, SyncError::Cancelled)),
        };

        self.enter(state, RunPhase::FetchingTarget);
        let items = match until_cancelled(cancel, self.target.fetch_items()).await {
            Some(Ok(items)) => items,
            Some(Err(e)) => return Err(self.fail(state, SyncError::TargetFetch(e))),
            None => return Err(self.fail(state, SyncError::Cancelled)),
        };

        // Last chance to stop before anything is planned or written
        if *cancel.borrow() {
            return Err(self.fail(state, SyncError::Cancelled));
        }

        self.observer.on_fetched(records.len(), items.len());
        Ok((records, items))
    }

    fn plan(&self, state: &mut RunState, records: &[SourceRecord], items: &[TargetItem]) -> Plan {
        self.enter(state, RunPhase::Planning);
        let plan = plan(records, items, &self.mapper, &self.options.plan);
        self.observer.on_plan(&plan);
        plan
    }

    fn enter(&self, state: &mut RunState, phase: RunPhase) {
        if state.advance(phase) {
            self.observer.on_phase(phase);
        }
    }

    fn fail(&self, state: &mut RunState, error: SyncError) -> SyncError {
        self.enter(state, RunPhase::Failed);
        self.observer.on_error(&error);
        error
    }
}

/// Resolves `fut`, or `None` once `cancel` is set.
async fn until_cancelled<F: Future>(
    cancel: &mut watch::Receiver<bool>,
    fut: F,
) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = wait_for_cancel(cancel) => None,
        out = fut => Some(out),
    }
}

async fn wait_for_cancel(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            // Sender gone: nobody can cancel anymore
            std::future::pending::<()>().await;
        }
    }
}
