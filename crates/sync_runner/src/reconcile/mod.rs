//! Reconcile Module - pure diff planning
//!
//! [`plan()`] is a **pure function**:
//! - No side effects (apart from anomaly logging)
//! - Deterministic
//! - Testable without mocks

mod operations;

pub use operations::{Operation, OperationKind, Plan, PlanBuilder};

use std::collections::HashSet;

use crate::mapper::FieldMapper;
use crate::record::{MappedFields, SourceRecord, TargetItem};
use crate::state::IdentityIndex;

/// Planner switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanOptions {
    /// Skip an update when every mapped field already equals the stored value.
    /// Off by default: every run re-sends the full field set.
    pub skip_unchanged: bool,
}

/// Computes the operations that bring the target in line with the source.
///
/// # Arguments
///
/// * `records` - Source records of this run
/// * `items` - Target items of this run
/// * `mapper` - Field mapper (also names the link field)
/// * `options` - Planner switches
///
/// # Returns
///
/// A [`Plan`] with deletes for stale items first, followed by one update or
/// create per source record in source order.
///
/// # Example
///
/// ```ignore
/// let plan = plan(&records, &items, &FieldMapper::default(), &PlanOptions::default());
/// let report = execute(plan, &target, &ExecutorOptions::default(), &LogObserver).await;
/// ```
pub fn plan(
    records: &[SourceRecord],
    items: &[TargetItem],
    mapper: &FieldMapper,
    options: &PlanOptions,
) -> Plan {
    let link_field = mapper.link_field();
    let index = IdentityIndex::build(items, link_field);
    let valid_ids = IdentityIndex::valid_ids(records);

    let mut builder = Plan::builder();

    // 1. Stale items: linked to a record that is gone
    for item in items {
        if let Some(record_id) = item.linked_record_id(link_field) {
            if !valid_ids.contains(record_id) {
                builder.delete(item.id.clone());
            }
        }
    }

    // 2. One update or create per source record
    let mut seen: HashSet<&str> = HashSet::with_capacity(records.len());
    for record in records {
        if !seen.insert(record.id.as_str()) {
            tracing::warn!(
                source_record_id = %record.id,
                "Source record listed twice, ignoring repeat"
            );
            continue;
        }

        let fields = mapper.map(record);
        match index.lookup(&record.id) {
            Some(existing) if options.skip_unchanged && is_unchanged(&fields, existing) => {
                builder.unchanged();
            }
            Some(existing) => {
                builder.update(existing.id.clone(), fields);
            }
            None => {
                builder.create(fields);
            }
        }
    }

    builder.build()
}

/// Whether `existing` already stores every mapped field with the same value.
fn is_unchanged(fields: &MappedFields, existing: &TargetItem) -> bool {
    fields
        .iter()
        .all(|(key, value)| existing.field_data.get(key) == Some(value))
}
