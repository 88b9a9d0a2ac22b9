//! End-to-end reconciliation runs against in-memory stores

use std::sync::Arc;

use serde_json::json;
use tablesync_config::Config;
use tablesync_runner::test_utils::{
    linked_item, source_record, MockSource, MockTarget, RecordingObserver,
};
use tablesync_runner::{
    ExecutorOptions, FieldMapper, OperationKind, Reconciler, ReconcilerOptions, RunPhase,
    SourceClient, SyncError, TargetClient,
};
use tokio::sync::watch;

fn reconciler(
    source: &Arc<MockSource>,
    target: &Arc<MockTarget>,
) -> Reconciler<MockSource, MockTarget> {
    let options = ReconcilerOptions::from_config(&Config::default());
    Reconciler::new(source.clone(), target.clone(), FieldMapper::default(), options)
}

fn classroom() -> (Arc<MockSource>, Arc<MockTarget>) {
    let source = Arc::new(MockSource::with_records(vec![
        source_record("r1", "Basic Safety"),
        source_record("r2", "Ladder Use"),
    ]));
    let target = Arc::new(MockTarget::with_items(vec![
        linked_item("stale-item", "r9"),
        linked_item("r1-item", "r1"),
    ]));
    (source, target)
}

#[tokio::test]
async fn scenario_delete_update_create() {
    let (source, target) = classroom();

    let report = reconciler(&source, &target).run().await.unwrap();

    assert_eq!((report.deleted, report.updated, report.created, report.failed), (1, 1, 1, 0));
    assert_eq!(
        target.calls(),
        vec!["delete:stale-item", "update:r1-item", "create:ladder-use"]
    );

    let items = target.items();
    assert_eq!(items.len(), 2);
    let updated = items.iter().find(|i| i.id == "r1-item").unwrap();
    assert_eq!(updated.field_data["name"], json!("Basic Safety"));
    assert_eq!(updated.field_data["slug"], json!("basic-safety"));
}

#[tokio::test]
async fn second_run_creates_and_deletes_nothing() {
    let (source, target) = classroom();
    let reconciler = reconciler(&source, &target);

    reconciler.run().await.unwrap();
    let second = reconciler.run().await.unwrap();

    assert_eq!(second.created, 0);
    assert_eq!(second.deleted, 0);
    assert_eq!(second.updated, 2);
    assert_eq!(target.items().len(), 2);
}

#[tokio::test]
async fn second_run_with_change_detection_is_a_no_op() {
    let (source, target) = classroom();
    let mut options = ReconcilerOptions::from_config(&Config::default());
    options.plan.skip_unchanged = true;
    let reconciler = Reconciler::new(
        source.clone(),
        target.clone(),
        FieldMapper::default(),
        options,
    );

    reconciler.run().await.unwrap();
    let calls_after_first = target.calls().len();
    let second = reconciler.run().await.unwrap();

    assert_eq!(second.attempted(), 0);
    assert_eq!(second.unchanged, 2);
    assert_eq!(target.calls().len(), calls_after_first);
}

#[tokio::test]
async fn every_source_record_has_exactly_one_item() {
    let (source, target) = classroom();
    source.set_records(vec![
        source_record("r1", "Basic Safety"),
        source_record("r2", "Ladder Use"),
        source_record("r3", "First Aid"),
    ]);

    reconciler(&source, &target).run().await.unwrap();

    let mut linked: Vec<String> = target
        .items()
        .iter()
        .filter_map(|i| i.linked_record_id("sourceRecordId").map(str::to_string))
        .collect();
    linked.sort();
    assert_eq!(linked, vec!["r1", "r2", "r3"]);
}

#[tokio::test]
async fn unmanaged_items_are_left_alone() {
    let source = Arc::new(MockSource::new());
    let target = Arc::new(MockTarget::with_items(vec![
        tablesync_runner::TargetItem::new("manual", Default::default()),
        linked_item("stale", "r1"),
    ]));

    let report = reconciler(&source, &target).run().await.unwrap();

    assert_eq!(report.deleted, 1);
    let ids: Vec<String> = target.items().into_iter().map(|i| i.id).collect();
    assert_eq!(ids, vec!["manual"]);
}

#[tokio::test]
async fn failed_operation_does_not_stop_the_run() {
    let (source, target) = classroom();
    target.fail_on("stale-item");

    let report = reconciler(&source, &target).run().await.unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.failures[0].operation.kind(), OperationKind::Delete);
    assert_eq!((report.updated, report.created), (1, 1));
    assert_eq!(target.items().len(), 3);
}

#[tokio::test]
async fn source_fetch_failure_leaves_target_untouched() {
    let (source, target) = classroom();
    source.fail_with(401);
    let observer = Arc::new(RecordingObserver::new());

    let err = reconciler(&source, &target)
        .with_observer(observer.clone())
        .run()
        .await
        .unwrap_err();

    match err {
        SyncError::SourceFetch(e) => assert_eq!(e.status(), Some(401)),
        other => panic!("unexpected error: {other}"),
    }
    assert!(target.calls().is_empty());
    assert_eq!(observer.phases().last().map(String::as_str), Some(RunPhase::Failed.as_str()));
}

#[tokio::test]
async fn cancellation_before_run_writes_nothing() {
    let (source, target) = classroom();
    let (tx, rx) = watch::channel(true);

    let err = reconciler(&source, &target).run_cancellable(rx).await.unwrap_err();

    assert!(matches!(err, SyncError::Cancelled));
    assert!(target.calls().is_empty());
    drop(tx);
}

#[tokio::test]
async fn concurrent_execution_keeps_deletes_first() {
    let source = Arc::new(MockSource::with_records(
        (0..6).map(|i| source_record(&format!("r{i}"), &format!("Class {i}"))).collect(),
    ));
    let target = Arc::new(MockTarget::with_items(
        (0..3).map(|i| linked_item(&format!("old-{i}"), &format!("gone-{i}"))).collect(),
    ));
    let mut options = ReconcilerOptions::from_config(&Config::default());
    options.executor = ExecutorOptions { concurrency: 3 };

    let report = Reconciler::new(source, target.clone(), FieldMapper::default(), options)
        .run()
        .await
        .unwrap();

    assert_eq!((report.deleted, report.created), (3, 6));
    let calls = target.calls();
    assert!(calls[..3].iter().all(|c| c.starts_with("delete:")));
    assert!(calls[3..].iter().all(|c| c.starts_with("create:")));
    assert!(target.max_in_flight() <= 3);
}

#[tokio::test]
async fn dyn_clients_can_be_used() {
    let (source, target) = classroom();
    let options = ReconcilerOptions::from_config(&Config::default());
    let source: Arc<dyn SourceClient> = source;
    let target: Arc<dyn TargetClient> = target;
    let reconciler: Reconciler = Reconciler::new(source, target, FieldMapper::default(), options);

    let plan = reconciler.plan_only().await.unwrap();

    assert_eq!(plan.count(OperationKind::Delete), 1);
    assert_eq!(plan.count(OperationKind::Update), 1);
    assert_eq!(plan.count(OperationKind::Create), 1);
}
