//! Known dashboard collections.
//!
//! Caches accept any collection name; this enum only names the tables the
//! dashboard screens mount and the columns their search boxes cover.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Equipment,
    InventoryItems,
    JobCards,
    Repairs,
    MaintenanceSchedules,
    Inspections,
    FuelLogs,
    PartsOrders,
}

impl Table {
    pub const ALL: [Table; 8] = [
        Table::Equipment,
        Table::InventoryItems,
        Table::JobCards,
        Table::Repairs,
        Table::MaintenanceSchedules,
        Table::Inspections,
        Table::FuelLogs,
        Table::PartsOrders,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Equipment => "equipment",
            Table::InventoryItems => "inventory_items",
            Table::JobCards => "job_cards",
            Table::Repairs => "repairs",
            Table::MaintenanceSchedules => "maintenance_schedules",
            Table::Inspections => "inspections",
            Table::FuelLogs => "fuel_logs",
            Table::PartsOrders => "parts_orders",
        }
    }

    /// Columns the screen's search box matches against.
    pub fn search_fields(&self) -> &'static [&'static str] {
        match self {
            Table::Equipment => &["name", "make", "model", "serial_number", "location"],
            Table::InventoryItems => &["name", "category", "part_number", "location", "supplier"],
            Table::JobCards => &["title", "description", "status", "assigned_to", "equipment_name"],
            Table::Repairs => &["equipment_name", "description", "status", "technician"],
            Table::MaintenanceSchedules => &["equipment_name", "task", "frequency", "status"],
            Table::Inspections => &["equipment_name", "inspector", "status", "notes"],
            Table::FuelLogs => &["equipment_name", "operator", "fuel_type", "location"],
            Table::PartsOrders => &["part_name", "supplier", "status", "order_number"],
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error when parsing an unknown collection name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableParseError(pub String);

impl fmt::Display for TableParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown collection: {}", self.0)
    }
}

impl std::error::Error for TableParseError {}

impl FromStr for Table {
    type Err = TableParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Table::ALL
            .iter()
            .copied()
            .find(|table| table.as_str() == s)
            .ok_or_else(|| TableParseError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_names_parse_back() {
        for table in Table::ALL {
            assert_eq!(table.as_str().parse::<Table>(), Ok(table));
            assert!(!table.search_fields().is_empty());
        }
        assert!("tractors".parse::<Table>().is_err());
    }
}
