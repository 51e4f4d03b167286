//! Demo rows for `--memory` runs.

use fieldops_client::{BackendResult, MemoryBackend};
use fieldops_core::{parse_timestamp, Record, Table, Timestamp};

fn at(text: &str) -> Timestamp {
    parse_timestamp(text).unwrap_or_else(|| Timestamp::from(std::time::SystemTime::now()))
}

/// A memory backend with a handful of rows in the busiest collections.
pub fn demo_backend() -> BackendResult<MemoryBackend> {
    let backend = MemoryBackend::new();

    backend.seed(
        Table::Equipment.as_str(),
        vec![
            Record::new("eq-1", at("2024-01-05T08:00:00Z"))
                .with_field("name", "6120M tractor")
                .with_field("make", "John Deere")
                .with_field("model", "6120M")
                .with_field("status", "operational"),
            Record::new("eq-2", at("2024-01-09T08:00:00Z"))
                .with_field("name", "Disc mower")
                .with_field("make", "Kuhn")
                .with_field("model", "FC 3125")
                .with_field("status", "maintenance"),
        ],
    )?;

    backend.seed(
        Table::InventoryItems.as_str(),
        vec![
            Record::new("inv-1", at("2024-02-01T10:00:00Z"))
                .with_field("name", "Hydraulic filter")
                .with_field("part_number", "HF-6120")
                .with_field("quantity", 4),
            Record::new("inv-2", at("2024-02-03T10:00:00Z"))
                .with_field("name", "Bolt M12")
                .with_field("part_number", "B-M12")
                .with_field("quantity", 120),
        ],
    )?;

    backend.seed(
        Table::JobCards.as_str(),
        vec![Record::new("job-1", at("2024-02-10T07:30:00Z"))
            .with_field("title", "Replace mower blades")
            .with_field("status", "todo")
            .with_field("priority", "high")],
    )?;

    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_backend_has_rows() {
        let backend = demo_backend().expect("demo backend");
        assert_eq!(backend.rows("equipment").expect("rows").len(), 2);
        assert_eq!(backend.rows("inventory_items").expect("rows").len(), 2);
        assert!(backend.rows("fuel_logs").expect("rows").is_empty());
    }
}
