//! The flat, combined view of every sensor's series that the analysis and
//! export routines consume.

use std::collections::BTreeSet;

use crate::reading::SensorId;

/// One reading, tagged with its sensor and both time bases. Times are in
/// seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableRow {
    pub sensor_id: SensorId,
    pub timestamp: f64,
    pub normalized_timestamp: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Rows of several sensors, grouped by sensor in ascending id order, each
/// group in arrival order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorTable {
    rows: Vec<TableRow>,
}

impl SensorTable {
    pub fn new(rows: Vec<TableRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct sensors present in the table.
    pub fn sensors(&self) -> BTreeSet<SensorId> {
        self.rows.iter().map(|r| r.sensor_id).collect()
    }

    /// The rows of one sensor, in arrival order.
    pub fn rows_for(&self, sensor_id: SensorId) -> Vec<TableRow> {
        self.rows
            .iter()
            .filter(|r| r.sensor_id == sensor_id)
            .copied()
            .collect()
    }
}
