//! Per-sensor time series of everything recorded since the last clear.

use std::collections::{BTreeMap, BTreeSet};

use crate::reading::{SensorId, SensorReading};
use crate::table::{SensorTable, TableRow};

/// Parallel columns of one sensor's readings. Timestamps are in seconds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorSeries {
    timestamps: Vec<f64>,
    normalized: Vec<f64>,
    x: Vec<f64>,
    y: Vec<f64>,
    z: Vec<f64>,
    // Set on the first append and never moved afterwards, even if an
    // earlier timestamp shows up later.
    origin: Option<f64>,
}

impl SensorSeries {
    fn push(&mut self, reading: &SensorReading) {
        let timestamp = reading.timestamp_secs();
        let origin = *self.origin.get_or_insert(timestamp);
        self.timestamps.push(timestamp);
        self.normalized.push(timestamp - origin);
        self.x.push(reading.x);
        self.y.push(reading.y);
        self.z.push(reading.z);
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Raw device timestamps, in seconds.
    pub fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    /// Timestamps relative to [`SensorSeries::origin_timestamp`].
    pub fn normalized_timestamps(&self) -> &[f64] {
        &self.normalized
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    pub fn z(&self) -> &[f64] {
        &self.z
    }

    pub fn origin_timestamp(&self) -> Option<f64> {
        self.origin
    }

    fn rows(&self, sensor_id: SensorId) -> impl Iterator<Item = TableRow> + '_ {
        (0..self.len()).map(move |i| TableRow {
            sensor_id,
            timestamp: self.timestamps[i],
            normalized_timestamp: self.normalized[i],
            x: self.x[i],
            y: self.y[i],
            z: self.z[i],
        })
    }
}

/// Owns one [`SensorSeries`] per sensor that has reported since the last
/// [`SensorStore::clear`]. A sensor is active exactly when it has a series.
#[derive(Debug, Clone, Default)]
pub struct SensorStore {
    series: BTreeMap<SensorId, SensorSeries>,
}

impl SensorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a reading. Returns `true` if this is the first reading of its
    /// sensor, i.e. the sensor just became active.
    pub fn append(&mut self, reading: &SensorReading) -> bool {
        let newly_active = !self.series.contains_key(&reading.sensor_id);
        self.series
            .entry(reading.sensor_id)
            .or_default()
            .push(reading);
        newly_active
    }

    /// Forget every series.
    pub fn clear(&mut self) {
        self.series.clear();
    }

    pub fn series(&self, sensor_id: SensorId) -> Option<&SensorSeries> {
        self.series.get(&sensor_id)
    }

    pub fn active_sensors(&self) -> BTreeSet<SensorId> {
        self.series.keys().copied().collect()
    }

    /// The lowest active sensor id, used as the timing reference.
    pub fn reference_sensor(&self) -> Option<SensorId> {
        self.series.keys().next().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Total readings across all sensors.
    pub fn reading_count(&self) -> usize {
        self.series.values().map(SensorSeries::len).sum()
    }

    /// The last `n` rows of one sensor, oldest first.
    pub fn recent_rows(&self, sensor_id: SensorId, n: usize) -> Vec<TableRow> {
        self.series
            .get(&sensor_id)
            .map(|s| s.rows(sensor_id).skip(s.len().saturating_sub(n)).collect())
            .unwrap_or_default()
    }

    /// Flatten the chosen sensors (all active ones for `None`) into a single
    /// table. Requested sensors that have no data are skipped.
    pub fn snapshot_table(&self, sensors: Option<&[SensorId]>) -> SensorTable {
        let selected: BTreeSet<SensorId> = match sensors {
            Some(ids) => ids.iter().copied().collect(),
            None => self.active_sensors(),
        };
        let rows = selected
            .into_iter()
            .filter_map(|id| self.series.get(&id).map(|s| (id, s)))
            .flat_map(|(id, s)| s.rows(id))
            .collect();
        SensorTable::new(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(sensor_id: SensorId, timestamp_ms: f64) -> SensorReading {
        SensorReading {
            sensor_id,
            timestamp_ms,
            x: 0.1,
            y: 0.2,
            z: 9.8,
        }
    }

    #[test]
    fn first_reading_activates_sensor() {
        let mut store = SensorStore::new();
        assert!(store.append(&reading(2, 1000.0)));
        assert!(!store.append(&reading(2, 1050.0)));
        assert!(store.append(&reading(0, 1000.0)));
        assert_eq!(store.active_sensors().into_iter().collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(store.reference_sensor(), Some(0));
        assert_eq!(store.reading_count(), 3);
    }

    #[test]
    fn recent_rows_take_the_tail() {
        let mut store = SensorStore::new();
        for i in 0..5 {
            store.append(&reading(1, 1000.0 + 100.0 * i as f64));
        }
        let tail = store.recent_rows(1, 2);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].timestamp, 1.3);
        assert_eq!(tail[1].timestamp, 1400.0 * 0.001);
        assert_eq!(store.recent_rows(1, 50).len(), 5);
        assert!(store.recent_rows(6, 2).is_empty());
    }

    #[test]
    fn readings_land_in_their_own_series() {
        let mut store = SensorStore::new();
        store.append(&reading(1, 10.0));
        store.append(&reading(3, 20.0));
        store.append(&reading(1, 30.0));
        assert_eq!(store.series(1).unwrap().len(), 2);
        assert_eq!(store.series(3).unwrap().timestamps(), &[0.02]);
    }

    #[test]
    fn first_timestamp_normalizes_to_zero() {
        let mut store = SensorStore::new();
        store.append(&reading(0, 5000.0));
        for i in 1..50 {
            store.append(&reading(0, 5000.0 + 20.0 * i as f64));
        }
        let series = store.series(0).unwrap();
        assert_eq!(series.normalized_timestamps()[0], 0.0);
        assert_eq!(series.origin_timestamp(), Some(5.0));
    }

    #[test]
    fn origin_is_fixed_once_set() {
        let mut store = SensorStore::new();
        store.append(&reading(0, 2000.0));
        store.append(&reading(0, 1000.0));
        let series = store.series(0).unwrap();
        assert_eq!(series.origin_timestamp(), Some(2.0));
        assert_eq!(series.normalized_timestamps(), &[0.0, -1.0]);
    }

    // A legitimate zero timestamp must not be mistaken for "no origin yet".
    #[test]
    fn zero_timestamp_is_a_valid_origin() {
        let mut store = SensorStore::new();
        store.append(&reading(0, 0.0));
        store.append(&reading(0, 100.0));
        let series = store.series(0).unwrap();
        assert_eq!(series.origin_timestamp(), Some(0.0));
        assert!((series.normalized_timestamps()[1] - 0.1).abs() < 1e-12);
    }

    #[test]
    fn clear_empties_snapshot_and_active_set() {
        let mut store = SensorStore::new();
        store.append(&reading(0, 1.0));
        store.append(&reading(4, 1.0));
        store.clear();
        assert!(store.snapshot_table(None).is_empty());
        assert!(store.snapshot_table(Some(&[0, 4])).is_empty());
        assert!(store.active_sensors().is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn snapshot_tags_rows_and_honours_subset() {
        let mut store = SensorStore::new();
        store.append(&reading(1, 1000.0));
        store.append(&reading(0, 3000.0));
        store.append(&reading(1, 1500.0));

        let table = store.snapshot_table(None);
        let ids: Vec<SensorId> = table.rows().iter().map(|r| r.sensor_id).collect();
        assert_eq!(ids, vec![0, 1, 1]);
        assert!((table.rows()[2].normalized_timestamp - 0.5).abs() < 1e-12);

        let subset = store.snapshot_table(Some(&[1, 6]));
        assert_eq!(subset.len(), 2);
        assert!(subset.rows().iter().all(|r| r.sensor_id == 1));
    }
}
