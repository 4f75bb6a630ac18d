//! Warden core types: records, cache snapshots, selections and query building.

#![forbid(unsafe_code)]

use std::borrow::Cow;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub mod query;
pub mod selection;

pub use query::{QueryBuilder, QueryParams, DEFAULT_PAGE_SIZE};
pub use selection::SelectionSet;

/// Positive integer key of a collection row.
pub type RecordId = u64;

/// One row of a remote collection. Domain fields are kept opaque and only
/// coerced to text for search matching.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    pub id: RecordId,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(id: RecordId) -> Self {
        Self { id, fields: Map::new() }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Build a record from a raw JSON row. Rows without a positive integer
    /// `id` (numeric or numeric string) yield `None`.
    pub fn from_value(raw: Value) -> Option<Self> {
        let Value::Object(mut fields) = raw else { return None; };
        let id = fields.remove("id").as_ref().and_then(id_from_value)?;
        Some(Self { id, fields })
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// String coercion used by search: `id` renders the numeric key, strings
    /// pass through, numbers and booleans render as text, null is absent.
    pub fn field_text(&self, name: &str) -> Option<Cow<'_, str>> {
        if name == "id" {
            return Some(Cow::Owned(self.id.to_string()));
        }
        match self.fields.get(name)? {
            Value::Null => None,
            Value::String(s) => Some(Cow::Borrowed(s.as_str())),
            Value::Bool(b) => Some(Cow::Borrowed(if *b { "true" } else { "false" })),
            Value::Number(n) => Some(Cow::Owned(n.to_string())),
            other => Some(Cow::Owned(other.to_string())),
        }
    }
}

fn id_from_value(v: &Value) -> Option<RecordId> {
    match v {
        Value::Number(n) => match n.as_u64() {
            Some(id) => (id > 0).then_some(id),
            None => n.as_f64().and_then(selection::positive_integer),
        },
        Value::String(s) => selection::parse_id(s),
        _ => None,
    }
}

/// Last successful fetch of a collection. Replaced wholesale on every fetch.
#[derive(Debug, Clone, Serialize, Default)]
pub struct CacheSnapshot {
    pub epoch: u64,
    pub items: Vec<Record>,
    /// Server-reported total, when the endpoint provides one.
    pub total: Option<u64>,
    #[serde(skip)]
    index: FxHashMap<RecordId, usize>,
}

impl CacheSnapshot {
    pub fn new(epoch: u64, items: Vec<Record>, total: Option<u64>) -> Self {
        let index = items.iter().enumerate().map(|(i, r)| (r.id, i)).collect();
        Self { epoch, items, total, index }
    }

    pub fn len(&self) -> usize { self.items.len() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    /// Server total, falling back to the number of cached rows.
    pub fn total_or_len(&self) -> u64 {
        self.total.unwrap_or(self.items.len() as u64)
    }

    pub fn get(&self, id: RecordId) -> Option<&Record> {
        self.index.get(&id).and_then(|i| self.items.get(*i))
    }

    pub fn contains(&self, id: RecordId) -> bool { self.index.contains_key(&id) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_value_requires_positive_id() {
        assert!(Record::from_value(json!({"id": 0, "title": "x"})).is_none());
        assert!(Record::from_value(json!({"id": -4})).is_none());
        assert!(Record::from_value(json!({"title": "no id"})).is_none());
        assert!(Record::from_value(json!([1, 2])).is_none());
        let r = Record::from_value(json!({"id": "12", "title": "hello"})).expect("string id");
        assert_eq!(r.id, 12);
        assert_eq!(r.field("title"), Some(&json!("hello")));
        assert!(r.field("id").is_none(), "id is lifted out of the field map");
    }

    #[test]
    fn field_text_coerces_scalars() {
        let r = Record::new(7)
            .with_field("title", "Launch")
            .with_field("is_published", true)
            .with_field("views", 42)
            .with_field("missing", Value::Null);
        assert_eq!(r.field_text("id").as_deref(), Some("7"));
        assert_eq!(r.field_text("title").as_deref(), Some("Launch"));
        assert_eq!(r.field_text("is_published").as_deref(), Some("true"));
        assert_eq!(r.field_text("views").as_deref(), Some("42"));
        assert_eq!(r.field_text("missing"), None);
        assert_eq!(r.field_text("nope"), None);
    }

    #[test]
    fn record_serde_flattens_fields() {
        let r: Record = serde_json::from_value(json!({"id": 3, "status": "draft"})).unwrap();
        assert_eq!(r.id, 3);
        assert_eq!(r.field_text("status").as_deref(), Some("draft"));
        assert_eq!(serde_json::to_value(&r).unwrap(), json!({"id": 3, "status": "draft"}));
    }

    #[test]
    fn snapshot_lookup_and_total_fallback() {
        let snap = CacheSnapshot::new(1, vec![Record::new(3), Record::new(9)], None);
        assert_eq!(snap.total_or_len(), 2);
        assert!(snap.get(9).is_some());
        assert!(!snap.contains(4));
        let with_total = CacheSnapshot::new(2, vec![Record::new(1)], Some(120));
        assert_eq!(with_total.total_or_len(), 120);
    }
}
