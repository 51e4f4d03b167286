//! Record shape shared by every dashboard collection.

use crate::identity::{lenient_timestamp, lenient_timestamp_opt, RecordId, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use thiserror::Error;

/// Arbitrary column values keyed by column name.
pub type Fields = serde_json::Map<String, Value>;

/// Keys the backend owns. They never travel in a create payload.
pub const RESERVED_KEYS: [&str; 3] = ["id", "created_at", "updated_at"];

/// One row of a collection.
///
/// Only the identifier and creation timestamp are required; everything else
/// the table carries lands in `fields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    #[serde(with = "lenient_timestamp")]
    pub created_at: Timestamp,
    #[serde(
        default,
        with = "lenient_timestamp_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<Timestamp>,
    #[serde(flatten)]
    pub fields: Fields,
}

/// Error when a JSON row cannot be read as a [`Record`].
#[derive(Debug, Error)]
#[error("Invalid record: {0}")]
pub struct RecordDecodeError(#[from] serde_json::Error);

impl Record {
    pub fn new(id: impl Into<RecordId>, created_at: Timestamp) -> Self {
        Self {
            id: id.into(),
            created_at,
            updated_at: None,
            fields: Fields::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn with_updated_at(mut self, updated_at: Timestamp) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    /// Decode a row as returned by the REST API or carried by the change feed.
    pub fn from_value(value: Value) -> Result<Self, RecordDecodeError> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Text of a column for matching purposes.
    ///
    /// Reserved names resolve to the record's own id and timestamps. Strings
    /// are returned as-is, numbers and booleans as their JSON text; `null`,
    /// arrays and objects have no text.
    pub fn field_text(&self, name: &str) -> Option<Cow<'_, str>> {
        match name {
            "id" => Some(Cow::Owned(self.id.as_key())),
            "created_at" => Some(Cow::Owned(self.created_at.to_rfc3339())),
            "updated_at" => self.updated_at.map(|ts| Cow::Owned(ts.to_rfc3339())),
            _ => match self.fields.get(name)? {
                Value::String(s) => Some(Cow::Borrowed(s.as_str())),
                Value::Number(n) => Some(Cow::Owned(n.to_string())),
                Value::Bool(b) => Some(Cow::Owned(b.to_string())),
                Value::Null | Value::Array(_) | Value::Object(_) => None,
            },
        }
    }
}

/// Drop backend-owned keys from a payload before it is sent as a new row.
pub fn strip_reserved(mut fields: Fields) -> Fields {
    for key in RESERVED_KEYS {
        fields.remove(key);
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::parse_timestamp;
    use serde_json::json;

    #[test]
    fn test_record_decodes_minimal_row() {
        let record = Record::from_value(json!({"id": "a", "created_at": "2024-01-02"}))
            .expect("minimal row");
        assert_eq!(record.id, RecordId::from("a"));
        assert_eq!(record.created_at, parse_timestamp("2024-01-02").expect("date"));
        assert!(record.updated_at.is_none());
        assert!(record.fields.is_empty());
    }

    #[test]
    fn test_record_keeps_extra_columns() {
        let record = Record::from_value(json!({
            "id": 5,
            "created_at": "2024-03-01T08:00:00Z",
            "updated_at": "2024-03-02T08:00:00Z",
            "name": "Hydraulic pump",
            "quantity": 3,
            "in_stock": true,
            "tags": ["pump"]
        }))
        .expect("full row");

        assert_eq!(record.id, RecordId::Number(5));
        assert!(record.updated_at.is_some());
        assert_eq!(record.field_text("name").as_deref(), Some("Hydraulic pump"));
        assert_eq!(record.field_text("quantity").as_deref(), Some("3"));
        assert_eq!(record.field_text("in_stock").as_deref(), Some("true"));
        assert_eq!(record.field_text("tags"), None);
        assert_eq!(record.field_text("missing"), None);
        assert_eq!(record.field_text("id").as_deref(), Some("5"));
    }

    #[test]
    fn test_record_rejects_row_without_created_at() {
        assert!(Record::from_value(json!({"id": "a"})).is_err());
    }

    #[test]
    fn test_strip_reserved() {
        let mut fields = Fields::new();
        fields.insert("id".into(), json!("x"));
        fields.insert("created_at".into(), json!("2024-01-01"));
        fields.insert("updated_at".into(), json!("2024-01-01"));
        fields.insert("name".into(), json!("Bolt"));

        let stripped = strip_reserved(fields);
        assert_eq!(stripped.len(), 1);
        assert_eq!(stripped.get("name"), Some(&json!("Bolt")));
    }
}
