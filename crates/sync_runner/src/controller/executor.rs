//! Plan Executor - applies a plan to the target store
//!
//! The executor never aborts: every operation is attempted and its outcome
//! ends up in the [`RunReport`].

use std::time::Instant;

use futures_util::stream::{self, StreamExt};

use crate::reconcile::{Operation, Plan};
use crate::report::{OperationOutcome, RunReport};
use crate::{RunObserver, TargetClient};

/// Executor switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorOptions {
    /// Operations in flight at once. `1` runs the plan strictly in order.
    pub concurrency: usize,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self { concurrency: 1 }
    }
}

/// Executes `plan` against `target`.
///
/// Deletes run first. Writes only start once every delete has finished,
/// also when running with `concurrency > 1`. Outcomes are reported to the
/// observer in plan order.
pub async fn execute<T: TargetClient + ?Sized>(
    plan: Plan,
    target: &T,
    options: &ExecutorOptions,
    observer: &dyn RunObserver,
) -> RunReport {
    let started = Instant::now();
    let mut report = RunReport::new();
    report.unchanged = plan.unchanged();

    let (deletes, writes) = plan.into_lanes();
    run_lane(deletes, target, options.concurrency, observer, &mut report).await;
    run_lane(writes, target, options.concurrency, observer, &mut report).await;

    report.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    report
}

async fn run_lane<T: TargetClient + ?Sized>(
    operations: Vec<Operation>,
    target: &T,
    concurrency: usize,
    observer: &dyn RunObserver,
    report: &mut RunReport,
) {
    // `buffered` keeps the input order, so outcomes arrive in plan order
    let mut outcomes = stream::iter(operations)
        .map(|op| apply(op, target))
        .buffered(concurrency.max(1));

    while let Some(outcome) = outcomes.next().await {
        observer.on_outcome(&outcome);
        report.record(outcome);
    }
}

async fn apply<T: TargetClient + ?Sized>(operation: Operation, target: &T) -> OperationOutcome {
    let result = match &operation {
        Operation::Delete { target_item_id } => target.delete_item(target_item_id).await,
        Operation::Update {
            target_item_id,
            fields,
        } => target.update_item(target_item_id, fields).await.map(|_| ()),
        Operation::Create { fields } => target.create_item(fields).await.map(|_| ()),
    };

    match result {
        Ok(()) => OperationOutcome::succeeded(operation),
        Err(e) => OperationOutcome::failed(operation, e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::FieldMapper;
    use crate::reconcile::{plan, OperationKind, PlanOptions};
    use crate::test_utils::{linked_item, source_record, MockTarget, RecordingObserver};
    use crate::LogObserver;

    fn sample_plan() -> (Plan, MockTarget) {
        let target = MockTarget::with_items(vec![
            linked_item("stale", "r9"),
            linked_item("keep", "r1"),
        ]);
        let records = vec![source_record("r1", "Basic Safety"), source_record("r2", "Ladder Use")];
        let plan = plan(
            &records,
            &target.items(),
            &FieldMapper::default(),
            &PlanOptions::default(),
        );
        (plan, target)
    }

    #[tokio::test]
    async fn test_execute_sequential_order() {
        let (plan, target) = sample_plan();

        let report = execute(plan, &target, &ExecutorOptions::default(), &LogObserver).await;

        assert_eq!(
            target.calls(),
            vec!["delete:stale", "update:keep", "create:ladder-use"]
        );
        assert_eq!((report.deleted, report.updated, report.created), (1, 1, 1));
        assert!(report.is_clean());
        assert_eq!(target.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn test_execute_failure_is_contained() {
        let (plan, target) = sample_plan();
        target.fail_on("keep");
        let observer = RecordingObserver::new();

        let report = execute(plan, &target, &ExecutorOptions::default(), &observer).await;

        assert_eq!(report.deleted, 1);
        assert_eq!(report.updated, 0);
        assert_eq!(report.created, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.failures[0].operation.kind(), OperationKind::Update);
        assert!(report.failures[0].reason.contains("500"));
        assert_eq!(
            observer.events(),
            vec![
                "outcome:delete stale:ok",
                "outcome:update keep (basic-safety):failed",
                "outcome:create (ladder-use):ok",
            ]
        );
    }

    #[tokio::test]
    async fn test_execute_missing_item_is_reported() {
        let target = MockTarget::new();
        let mut builder = Plan::builder();
        builder.delete("gone");

        let report = execute(
            builder.build(),
            &target,
            &ExecutorOptions::default(),
            &LogObserver,
        )
        .await;

        assert_eq!(report.failed, 1);
        assert!(report.failures[0].reason.contains("404"));
    }

    #[tokio::test]
    async fn test_execute_concurrent_keeps_deletes_first() {
        let items: Vec<_> = (0..4)
            .map(|i| linked_item(&format!("stale-{i}"), &format!("old-{i}")))
            .collect();
        let target = MockTarget::with_items(items);
        let records: Vec<_> = (0..4)
            .map(|i| source_record(&format!("r{i}"), &format!("Class {i}")))
            .collect();
        let plan = plan(
            &records,
            &target.items(),
            &FieldMapper::default(),
            &PlanOptions::default(),
        );

        let options = ExecutorOptions { concurrency: 4 };
        let report = execute(plan, &target, &options, &LogObserver).await;

        assert_eq!((report.deleted, report.created), (4, 4));
        let calls = target.calls();
        let last_delete = calls.iter().rposition(|c| c.starts_with("delete:")).unwrap();
        let first_create = calls.iter().position(|c| c.starts_with("create:")).unwrap();
        assert!(last_delete < first_create);
        assert!(target.max_in_flight() > 1);
        assert!(target.max_in_flight() <= 4);
    }

    #[tokio::test]
    async fn test_execute_zero_concurrency_runs_sequentially() {
        let (plan, target) = sample_plan();
        let options = ExecutorOptions { concurrency: 0 };

        let report = execute(plan, &target, &options, &LogObserver).await;

        assert_eq!(report.attempted(), 3);
        assert_eq!(target.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn test_execute_carries_unchanged_count() {
        let mut builder = Plan::builder();
        builder.unchanged().unchanged();

        let report = execute(
            builder.build(),
            &MockTarget::new(),
            &ExecutorOptions::default(),
            &LogObserver,
        )
        .await;

        assert_eq!(report.unchanged, 2);
        assert_eq!(report.attempted(), 0);
    }
}
