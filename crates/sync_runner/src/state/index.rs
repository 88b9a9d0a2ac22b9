//! Identity Index - maps source record ids to existing target items
//!
//! Built once per run from the fetched target items. When several items
//! claim the same source record, the first one in fetch order wins and the
//! others are reported as duplicates.

use std::collections::{HashMap, HashSet};

use crate::record::{SourceRecord, TargetItem};

/// Lookup from source record id to the target item linked to it.
#[derive(Debug, Clone, Default)]
pub struct IdentityIndex<'a> {
    by_record: HashMap<&'a str, &'a TargetItem>,
    duplicates: Vec<DuplicateLink>,
}

/// A target item that was ignored because an earlier item already claimed
/// the same source record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateLink {
    pub source_record_id: String,
    /// Item that stays indexed
    pub kept_item_id: String,
    /// Item that was ignored
    pub ignored_item_id: String,
}

impl<'a> IdentityIndex<'a> {
    /// Indexes every item with a non-empty `link_field`.
    pub fn build(items: &'a [TargetItem], link_field: &str) -> Self {
        let mut by_record: HashMap<&'a str, &'a TargetItem> = HashMap::with_capacity(items.len());
        let mut duplicates = Vec::new();

        for item in items {
            let Some(record_id) = item.linked_record_id(link_field) else {
                continue;
            };

            match by_record.get(record_id) {
                Some(kept) => {
                    tracing::warn!(
                        source_record_id = record_id,
                        kept_item = %kept.id,
                        ignored_item = %item.id,
                        "Multiple target items link to the same source record, keeping the first"
                    );
                    duplicates.push(DuplicateLink {
                        source_record_id: record_id.to_string(),
                        kept_item_id: kept.id.clone(),
                        ignored_item_id: item.id.clone(),
                    });
                }
                None => {
                    by_record.insert(record_id, item);
                }
            }
        }

        Self {
            by_record,
            duplicates,
        }
    }

    /// The item linked to `source_record_id`, if any.
    pub fn lookup(&self, source_record_id: &str) -> Option<&'a TargetItem> {
        self.by_record.get(source_record_id).copied()
    }

    /// Items ignored because their source record was already claimed.
    pub fn duplicates(&self) -> &[DuplicateLink] {
        &self.duplicates
    }

    /// Number of indexed (linked, non-duplicate) items.
    pub fn len(&self) -> usize {
        self.by_record.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_record.is_empty()
    }

    /// Ids of all source records of the current fetch.
    pub fn valid_ids(records: &[SourceRecord]) -> HashSet<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }
}
