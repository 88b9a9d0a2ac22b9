//! Record types exchanged with the source and target stores.
//!
//! Both sides are read-only snapshots scoped to one reconciliation run.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field set in the target schema, as produced by the field mapper.
pub type MappedFields = Map<String, Value>;

/// One record of the source table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub id: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl SourceRecord {
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Value of a field, `None` when absent.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// One item of the target collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetItem {
    pub id: String,
    #[serde(rename = "fieldData", default)]
    pub field_data: Map<String, Value>,
}

impl TargetItem {
    pub fn new(id: impl Into<String>, field_data: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            field_data,
        }
    }

    /// Source record id stored in `link_field`.
    ///
    /// Non-string and empty values count as "not linked".
    pub fn linked_record_id(&self, link_field: &str) -> Option<&str> {
        self.field_data
            .get(link_field)
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
    }
}
