//! FieldOps Test Utilities
//!
//! Shared test infrastructure for the FieldOps workspace:
//! - Proptest generators for records, ids and field maps
//! - Fixtures for common rows and seeded in-memory backends
//! - Assertions over record lists

pub use fieldops_client::{MemoryBackend, Operation};
pub use fieldops_core::{
    parse_timestamp, ChangeEvent, FeedMessage, FeedStatus, Fields, Record, RecordId, Timestamp,
};

use chrono::Utc;

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for FieldOps record types.

    use super::*;
    use proptest::collection::{btree_map, hash_set, vec};
    use proptest::prelude::*;
    use serde_json::Value;

    /// Generate a record id, text or numeric.
    pub fn arb_record_id() -> impl Strategy<Value = RecordId> {
        prop_oneof![
            (1i64..1_000_000).prop_map(RecordId::Number),
            "[a-z0-9]{1,12}".prop_map(RecordId::Text),
        ]
    }

    /// Generate a timestamp between 2020 and 2030, whole seconds.
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (1577836800i64..1893456000i64).prop_map(|secs| {
            chrono::DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
        })
    }

    /// Generate a scalar column value.
    pub fn arb_field_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            "[A-Za-z ]{0,16}".prop_map(Value::String),
            any::<i32>().prop_map(Value::from),
            any::<bool>().prop_map(Value::Bool),
            Just(Value::Null),
        ]
    }

    /// Generate a field map with non-reserved column names.
    pub fn arb_fields() -> impl Strategy<Value = Fields> {
        btree_map("[a-z]{1,8}", arb_field_value(), 0..5).prop_map(|columns| {
            columns
                .into_iter()
                .filter(|(name, _)| !fieldops_core::RESERVED_KEYS.contains(&name.as_str()))
                .collect()
        })
    }

    pub fn arb_record() -> impl Strategy<Value = Record> {
        (
            arb_record_id(),
            arb_timestamp(),
            proptest::option::of(arb_timestamp()),
            arb_fields(),
        )
            .prop_map(|(id, created_at, updated_at, fields)| Record {
                id,
                created_at,
                updated_at,
                fields,
            })
    }

    /// Generate up to `max` records with distinct ids.
    pub fn arb_records(max: usize) -> impl Strategy<Value = Vec<Record>> {
        hash_set("[a-z]{1,6}", 0..=max).prop_flat_map(|ids| {
            let ids: Vec<String> = ids.into_iter().collect();
            let count = ids.len();
            (
                Just(ids),
                vec(arb_timestamp(), count),
                vec(arb_fields(), count),
            )
                .prop_map(|(ids, stamps, fields)| {
                    ids.into_iter()
                        .zip(stamps)
                        .zip(fields)
                        .map(|((id, created_at), fields)| Record {
                            id: RecordId::Text(id),
                            created_at,
                            updated_at: None,
                            fields,
                        })
                        .collect()
                })
        })
    }

    /// Generate a change event for one of `ids`, or for an unknown id.
    pub fn arb_change_for(ids: Vec<RecordId>) -> impl Strategy<Value = ChangeEvent> {
        let known = if ids.is_empty() {
            vec![RecordId::from("absent")]
        } else {
            ids
        };
        (
            proptest::sample::select(known),
            arb_timestamp(),
            arb_fields(),
            0u8..3,
        )
            .prop_map(|(id, created_at, fields, kind)| {
                let record = Record {
                    id: id.clone(),
                    created_at,
                    updated_at: None,
                    fields,
                };
                match kind {
                    0 => ChangeEvent::Created { record },
                    1 => ChangeEvent::Updated { record },
                    _ => ChangeEvent::Deleted {
                        id,
                        old_record: None,
                    },
                }
            })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built rows and backends for common scenarios.

    use super::*;
    use serde_json::Value;

    /// A record with `id` created at `created_at` (any format `parse_timestamp` takes).
    ///
    /// Panics on a bad timestamp; fixtures are test-only.
    pub fn record(id: impl Into<RecordId>, created_at: &str) -> Record {
        let created_at = parse_timestamp(created_at)
            .unwrap_or_else(|| panic!("bad fixture timestamp {created_at}"));
        Record::new(id, created_at)
    }

    /// A JSON object literal as a field map.
    pub fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            other => panic!("fixture fields must be an object, got {other}"),
        }
    }

    /// The two-row collection used by the load/create/delete walkthrough.
    pub fn walkthrough_rows() -> Vec<Record> {
        vec![
            record("b", "2024-01-01").with_field("name", "Nut"),
            record("a", "2024-01-02").with_field("name", "Washer"),
        ]
    }

    /// In-memory backend with `records` stored under `table`.
    pub fn seeded_backend(table: &str, records: Vec<Record>) -> MemoryBackend {
        let backend = MemoryBackend::new();
        backend
            .seed(table, records)
            .unwrap_or_else(|err| panic!("seeding {table} failed: {err}"));
        backend
    }

    /// A row as the change feed would carry it.
    pub fn created(record: Record) -> ChangeEvent {
        ChangeEvent::Created { record }
    }

    pub fn updated(record: Record) -> ChangeEvent {
        ChangeEvent::Updated { record }
    }

    pub fn deleted(id: impl Into<RecordId>) -> ChangeEvent {
        ChangeEvent::Deleted {
            id: id.into(),
            old_record: None,
        }
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over record lists.

    use super::*;

    /// Ids of `records` as text, in order.
    pub fn ids<'a, I>(records: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a Record>,
    {
        records.into_iter().map(|r| r.id.to_string()).collect()
    }

    pub fn assert_newest_first(records: &[Record]) {
        for pair in records.windows(2) {
            assert!(
                pair[0].created_at >= pair[1].created_at,
                "record {} ({}) is older than record {} ({})",
                pair[0].id,
                pair[0].created_at,
                pair[1].id,
                pair[1].created_at
            );
        }
    }

    pub fn assert_unique_ids(records: &[Record]) {
        let mut seen = std::collections::HashSet::new();
        for record in records {
            assert!(seen.insert(record.id.clone()), "duplicate id {}", record.id);
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_walkthrough_rows_fixture() {
        let rows = fixtures::walkthrough_rows();
        assert_eq!(assertions::ids(&rows), vec!["b", "a"]);
    }

    #[test]
    fn test_seeded_backend_fixture() {
        let backend = fixtures::seeded_backend("repairs", fixtures::walkthrough_rows());
        assert_eq!(backend.rows("repairs").expect("rows").len(), 2);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_arb_records_have_unique_ids(records in generators::arb_records(12)) {
            assertions::assert_unique_ids(&records);
        }

        #[test]
        fn prop_arb_fields_skip_reserved(fields in generators::arb_fields()) {
            for key in fieldops_core::RESERVED_KEYS {
                prop_assert!(!fields.contains_key(key));
            }
        }
    }
}
