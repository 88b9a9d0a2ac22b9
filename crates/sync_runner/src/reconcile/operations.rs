//! Operations - output of the planner
//!
//! A [`Plan`] is an ordered list of [`Operation`]s. Deletes always come
//! first: stale items must be gone before a replacement with the same slug
//! is created.

use serde::Serialize;

use crate::mapper::SLUG_FIELD;
use crate::record::MappedFields;

/// One mutation of the target store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Operation {
    /// Remove an item whose source record no longer exists
    Delete {
        #[serde(rename = "targetItemId")]
        target_item_id: String,
    },

    /// Re-send the full mapped field set of an existing item
    Update {
        #[serde(rename = "targetItemId")]
        target_item_id: String,
        fields: MappedFields,
    },

    /// Create an item for a source record without one
    Create { fields: MappedFields },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationKind {
    Delete,
    Update,
    Create,
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Delete { .. } => OperationKind::Delete,
            Self::Update { .. } => OperationKind::Update,
            Self::Create { .. } => OperationKind::Create,
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, Self::Delete { .. })
    }

    /// Id of the existing item this operation touches (`None` for creates).
    pub fn target_item_id(&self) -> Option<&str> {
        match self {
            Self::Delete { target_item_id } | Self::Update { target_item_id, .. } => {
                Some(target_item_id)
            }
            Self::Create { .. } => None,
        }
    }

    /// Short human readable label (for logs).
    pub fn describe(&self) -> String {
        match self {
            Self::Delete { target_item_id } => format!("delete {target_item_id}"),
            Self::Update {
                target_item_id,
                fields,
            } => format!("update {target_item_id} ({})", slug_of(fields)),
            Self::Create { fields } => format!("create ({})", slug_of(fields)),
        }
    }
}

fn slug_of(fields: &MappedFields) -> &str {
    fields
        .get(SLUG_FIELD)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
}

/// Ordered operations of one run.
///
/// Only constructible through [`PlanBuilder`], which keeps deletes ahead of
/// updates and creates.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Plan {
    operations: Vec<Operation>,
    #[serde(skip)]
    delete_count: usize,
    /// Updates skipped because the stored item already matched
    unchanged: usize,
}

impl Plan {
    pub fn builder() -> PlanBuilder {
        PlanBuilder::default()
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Operation> {
        self.operations.iter()
    }

    /// The leading delete operations.
    pub fn deletes(&self) -> &[Operation] {
        &self.operations[..self.delete_count]
    }

    /// The updates and creates following the deletes.
    pub fn writes(&self) -> &[Operation] {
        &self.operations[self.delete_count..]
    }

    pub fn count(&self, kind: OperationKind) -> usize {
        self.operations.iter().filter(|op| op.kind() == kind).count()
    }

    pub fn unchanged(&self) -> usize {
        self.unchanged
    }

    /// Splits into (deletes, writes), consuming the plan.
    pub fn into_lanes(self) -> (Vec<Operation>, Vec<Operation>) {
        let mut deletes = self.operations;
        let writes = deletes.split_off(self.delete_count);
        (deletes, writes)
    }
}

impl IntoIterator for Plan {
    type Item = Operation;
    type IntoIter = std::vec::IntoIter<Operation>;

    fn into_iter(self) -> Self::IntoIter {
        self.operations.into_iter()
    }
}

impl<'a> IntoIterator for &'a Plan {
    type Item = &'a Operation;
    type IntoIter = std::slice::Iter<'a, Operation>;

    fn into_iter(self) -> Self::IntoIter {
        self.operations.iter()
    }
}

/// Collects operations into separate lanes and joins them in plan order.
#[derive(Debug, Clone, Default)]
pub struct PlanBuilder {
    deletes: Vec<Operation>,
    writes: Vec<Operation>,
    unchanged: usize,
}

impl PlanBuilder {
    pub fn delete(&mut self, target_item_id: impl Into<String>) -> &mut Self {
        self.deletes.push(Operation::Delete {
            target_item_id: target_item_id.into(),
        });
        self
    }

    pub fn update(&mut self, target_item_id: impl Into<String>, fields: MappedFields) -> &mut Self {
        self.writes.push(Operation::Update {
            target_item_id: target_item_id.into(),
            fields,
        });
        self
    }

    pub fn create(&mut self, fields: MappedFields) -> &mut Self {
        self.writes.push(Operation::Create { fields });
        self
    }

    pub fn unchanged(&mut self) -> &mut Self {
        self.unchanged += 1;
        self
    }

    pub fn build(self) -> Plan {
        let delete_count = self.deletes.len();
        let mut operations = self.deletes;
        operations.extend(self.writes);
        Plan {
            operations,
            delete_count,
            unchanged: self.unchanged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(slug: &str) -> MappedFields {
        let mut f = MappedFields::new();
        f.insert(SLUG_FIELD.to_string(), json!(slug));
        f
    }

    #[test]
    fn test_builder_orders_deletes_first() {
        let mut builder = Plan::builder();
        builder
            .create(fields("a"))
            .delete("old-1")
            .update("item-2", fields("b"))
            .delete("old-2");
        let plan = builder.build();

        assert_eq!(plan.len(), 4);
        assert_eq!(plan.deletes().len(), 2);
        assert!(plan.deletes().iter().all(Operation::is_delete));
        assert!(!plan.writes().iter().any(Operation::is_delete));
        assert!(matches!(plan.operations()[2], Operation::Create { .. }));
        assert!(matches!(plan.operations()[3], Operation::Update { .. }));
    }

    #[test]
    fn test_counts() {
        let mut builder = Plan::builder();
        builder.delete("x").update("y", fields("y")).create(fields("z")).unchanged();
        let plan = builder.build();

        assert_eq!(plan.count(OperationKind::Delete), 1);
        assert_eq!(plan.count(OperationKind::Update), 1);
        assert_eq!(plan.count(OperationKind::Create), 1);
        assert_eq!(plan.unchanged(), 1);
    }

    #[test]
    fn test_into_lanes() {
        let mut builder = Plan::builder();
        builder.update("y", fields("y")).delete("x");
        let (deletes, writes) = builder.build().into_lanes();

        assert_eq!(deletes, vec![Operation::Delete { target_item_id: "x".to_string() }]);
        assert_eq!(writes.len(), 1);
    }

    #[test]
    fn test_empty_plan() {
        let plan = Plan::builder().build();
        assert!(plan.is_empty());
        assert!(plan.deletes().is_empty());
        assert!(plan.writes().is_empty());
    }

    #[test]
    fn test_operation_accessors() {
        let delete = Operation::Delete { target_item_id: "x".to_string() };
        let create = Operation::Create { fields: fields("intro") };

        assert_eq!(delete.target_item_id(), Some("x"));
        assert_eq!(create.target_item_id(), None);
        assert_eq!(delete.describe(), "delete x");
        assert_eq!(create.describe(), "create (intro)");
    }

    #[test]
    fn test_operation_serialization() {
        let op = Operation::Update {
            target_item_id: "item-1".to_string(),
            fields: fields("a"),
        };
        assert_eq!(
            serde_json::to_value(&op).unwrap(),
            json!({ "op": "update", "targetItemId": "item-1", "fields": { "slug": "a" } })
        );
    }
}
