//! Field Mapper - translates source records into the target schema
//!
//! The mapper is a pure, total function: missing fields fall back to an
//! empty value of their kind and every record maps to a field set.

use serde_json::Value;
use tablesync_config::{FieldKind, FieldRule, MappingConfig};

use crate::record::{MappedFields, SourceRecord};

/// Target field that receives the derived slug.
pub const SLUG_FIELD: &str = "slug";

/// Translates one [`SourceRecord`] into [`MappedFields`].
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMapper {
    link_field: String,
    slug_source: String,
    rules: Vec<FieldRule>,
}

impl Default for FieldMapper {
    fn default() -> Self {
        Self::from_config(&MappingConfig::default())
    }
}

impl FieldMapper {
    pub fn from_config(config: &MappingConfig) -> Self {
        Self {
            link_field: config.link_field.clone(),
            slug_source: config.slug_source.clone(),
            rules: config.fields.clone(),
        }
    }

    /// Target field that stores the originating source record id.
    pub fn link_field(&self) -> &str {
        &self.link_field
    }

    pub fn map(&self, record: &SourceRecord) -> MappedFields {
        let mut mapped = MappedFields::new();

        for rule in &self.rules {
            let value = render(record.field(&rule.source), rule.kind);
            mapped.insert(rule.target.clone(), value);
        }

        let slug_input = record
            .field(&self.slug_source)
            .map(slug_text)
            .unwrap_or_default();
        mapped.insert(SLUG_FIELD.to_string(), Value::String(slugify(&slug_input)));
        mapped.insert(self.link_field.clone(), Value::String(record.id.clone()));

        mapped
    }
}

/// Derives a URL slug: lower-case, runs of anything but `[a-z0-9]`
/// collapse into a single `-`, no leading or trailing `-`.
///
/// `slugify(slugify(x)) == slugify(x)` for every input.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_separator = false;

    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push(c);
        } else {
            pending_separator = true;
        }
    }

    slug
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn render(value: Option<&Value>, kind: FieldKind) -> Value {
    let value = value.filter(|v| !is_blank(v));

    match (kind, value) {
        (FieldKind::Text, Some(v)) => v.clone(),
        (FieldKind::Text, None) => Value::String(String::new()),
        (FieldKind::Number, Some(Value::String(s))) => Value::String(s.clone()),
        (FieldKind::Number, Some(v)) => Value::String(v.to_string()),
        (FieldKind::Number, None) => Value::String("0".to_string()),
    }
}

fn slug_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}
