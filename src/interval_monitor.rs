//! Measures the real sampling interval once per recording and warns when it
//! strays from what the configured data rate promises.
//!
//! The measurement is taken from the last two readings of the reference
//! sensor (the lowest active id) the first time it has two of them. It is not
//! a rolling average: once the board's row cadence has settled after start-up
//! a single gap is representative, and the value stays put until the session
//! is cleared or a parameter changes.

use crate::device::DeviceParams;
use crate::store::SensorStore;

/// Largest acceptable difference between expected and measured interval.
pub const DEFAULT_DRIFT_TOLERANCE_MS: u32 = 10;

fn drift_warning(tolerance_ms: u32) -> String {
    format!(
        "WARNING! The difference between the expected and actual interval is greater than \
         {tolerance_ms} ms. Try resetting the datarate to update the sensors."
    )
}

/// Outcome of a freshly computed interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalReport {
    pub actual_ms: i64,
    /// `Some(warning)` when the interval drifted, `None` clears any warning.
    pub drift: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IntervalMonitor {
    tolerance_ms: u32,
    drift: Option<String>,
}

impl Default for IntervalMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_DRIFT_TOLERANCE_MS)
    }
}

impl IntervalMonitor {
    pub fn new(tolerance_ms: u32) -> Self {
        Self {
            tolerance_ms,
            drift: None,
        }
    }

    /// The warning currently in force, if any.
    pub fn drift_warning(&self) -> Option<&str> {
        self.drift.as_deref()
    }

    /// Call after every appended reading. Returns a report only on the call
    /// that actually computes the interval.
    pub fn observe(
        &mut self,
        store: &SensorStore,
        params: &mut DeviceParams,
    ) -> Option<IntervalReport> {
        if params.actual_interval_ms.is_some() {
            return None;
        }
        let reference = store.series(store.reference_sensor()?)?;
        let [.., before, last] = reference.timestamps() else {
            return None;
        };

        let actual_ms = ((last - before) * 1000.0).round() as i64;
        params.actual_interval_ms = Some(actual_ms);
        self.drift = self
            .drifted(params.expected_interval_ms(), actual_ms)
            .then(|| drift_warning(self.tolerance_ms));

        Some(IntervalReport {
            actual_ms,
            drift: self.drift.clone(),
        })
    }

    /// Whether `actual_ms` is further than the tolerance from `expected_ms`.
    pub fn drifted(&self, expected_ms: u32, actual_ms: i64) -> bool {
        i64::from(expected_ms).abs_diff(actual_ms) > u64::from(self.tolerance_ms)
    }

    /// Forget the measurement so the next two readings are measured again.
    pub fn reset(&mut self, params: &mut DeviceParams) {
        params.actual_interval_ms = None;
        self.drift = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DataRate;
    use crate::reading::{SensorId, SensorReading};

    fn reading(sensor_id: SensorId, timestamp_ms: f64) -> SensorReading {
        SensorReading {
            sensor_id,
            timestamp_ms,
            x: 0.0,
            y: 0.0,
            z: 9.8,
        }
    }

    fn feed(
        monitor: &mut IntervalMonitor,
        store: &mut SensorStore,
        params: &mut DeviceParams,
        readings: &[SensorReading],
    ) -> Vec<IntervalReport> {
        readings
            .iter()
            .filter_map(|r| {
                store.append(r);
                monitor.observe(store, params)
            })
            .collect()
    }

    #[test]
    fn two_readings_give_the_interval() {
        let mut monitor = IntervalMonitor::default();
        let mut store = SensorStore::new();
        let mut params = DeviceParams::new(DataRate::Hz1, Default::default());

        let reports = feed(
            &mut monitor,
            &mut store,
            &mut params,
            &[reading(0, 1000.0), reading(0, 1050.0)],
        );
        assert_eq!(params.actual_interval_ms, Some(50));
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].actual_ms, 50);
        // 1 Hz expects 1000 ms.
        assert!(reports[0].drift.is_some());
        assert!(monitor.drift_warning().is_some());
    }

    #[test]
    fn computed_only_once_per_session() {
        let mut monitor = IntervalMonitor::default();
        let mut store = SensorStore::new();
        let mut params = DeviceParams::new(DataRate::Hz10, Default::default());

        let reports = feed(
            &mut monitor,
            &mut store,
            &mut params,
            &[
                reading(0, 0.0),
                reading(0, 100.0),
                reading(0, 300.0),
                reading(0, 700.0),
            ],
        );
        assert_eq!(reports.len(), 1);
        assert_eq!(params.actual_interval_ms, Some(100));
        assert!(reports[0].drift.is_none());
    }

    #[test]
    fn only_the_reference_sensor_counts() {
        let mut monitor = IntervalMonitor::default();
        let mut store = SensorStore::new();
        let mut params = DeviceParams::default();

        let reports = feed(
            &mut monitor,
            &mut store,
            &mut params,
            &[reading(0, 0.0), reading(5, 0.0), reading(5, 7.0)],
        );
        assert!(reports.is_empty());
        assert_eq!(params.actual_interval_ms, None);
    }

    #[test]
    fn drift_threshold() {
        let monitor = IntervalMonitor::default();
        assert!(monitor.drifted(1000, 50));
        assert!(!monitor.drifted(100, 95));
        assert!(!monitor.drifted(100, 110));
        assert!(monitor.drifted(100, 111));
        assert!(monitor.drifted(100, i64::MIN));
        assert!(monitor.drifted(100, i64::MAX));
    }

    #[test]
    fn absurd_gap_saturates_and_drifts() {
        let mut monitor = IntervalMonitor::default();
        let mut store = SensorStore::new();
        let mut params = DeviceParams::new(DataRate::Hz10, Default::default());

        let reports = feed(
            &mut monitor,
            &mut store,
            &mut params,
            &[reading(0, 1e300), reading(0, 0.0)],
        );
        assert_eq!(reports[0].actual_ms, i64::MIN);
        assert!(reports[0].drift.is_some());
    }

    #[test]
    fn reset_allows_recompute_and_clears_warning() {
        let mut monitor = IntervalMonitor::default();
        let mut store = SensorStore::new();
        let mut params = DeviceParams::new(DataRate::Hz1, Default::default());
        feed(
            &mut monitor,
            &mut store,
            &mut params,
            &[reading(0, 0.0), reading(0, 50.0)],
        );
        assert!(monitor.drift_warning().is_some());

        monitor.reset(&mut params);
        store.clear();
        assert!(monitor.drift_warning().is_none());
        params.data_rate = DataRate::Hz25;

        let reports = feed(
            &mut monitor,
            &mut store,
            &mut params,
            &[reading(0, 0.0), reading(0, 40.0)],
        );
        assert_eq!(reports[0].actual_ms, 40);
        assert!(reports[0].drift.is_none());
    }
}
