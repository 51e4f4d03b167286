//! Local search and filter over an in-memory list of records.
//!
//! Nothing here touches the backend. Matching is case-insensitive substring
//! over the named columns, as the dashboard search boxes behave.

use crate::record::Record;

/// Whether `record` matches an already lower-cased query on any of `fields`.
pub fn matches_query<S: AsRef<str>>(record: &Record, query_lower: &str, fields: &[S]) -> bool {
    fields.iter().any(|field| {
        record
            .field_text(field.as_ref())
            .map(|text| text.to_lowercase().contains(query_lower))
            .unwrap_or(false)
    })
}

/// Records where at least one of `fields` contains `query`, ignoring case.
///
/// An empty query returns every record in order.
pub fn search_records<'a, S: AsRef<str>>(
    records: &'a [Record],
    query: &str,
    fields: &[S],
) -> Vec<&'a Record> {
    if query.is_empty() {
        return records.iter().collect();
    }
    let query_lower = query.to_lowercase();
    records
        .iter()
        .filter(|record| matches_query(*record, &query_lower, fields))
        .collect()
}

pub fn filter_records<'a, F>(records: &'a [Record], mut predicate: F) -> Vec<&'a Record>
where
    F: FnMut(&Record) -> bool,
{
    records.iter().filter(|record| predicate(*record)).collect()
}
