//! The value types that flow out of the record parser and into the store.

/// Hardware channel index of an accelerometer on the board.
pub type SensorId = u8;

/// Acceleration in m/s².
pub type MetersPerSecondSquared = f64;

/// Number of sensor slots the board multiplexes. Valid ids are `0..SENSOR_SLOTS`.
pub const SENSOR_SLOTS: SensorId = 8;

/// One sample from one accelerometer, exactly as the board reported it.
///
/// The board stamps readings in milliseconds since it booted. The store keeps
/// seconds, so anything crossing that boundary goes through
/// [`SensorReading::timestamp_secs`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub sensor_id: SensorId,
    pub timestamp_ms: f64,
    pub x: MetersPerSecondSquared,
    pub y: MetersPerSecondSquared,
    pub z: MetersPerSecondSquared,
}

impl SensorReading {
    /// Device timestamp converted to seconds.
    pub fn timestamp_secs(&self) -> f64 {
        self.timestamp_ms * 0.001
    }

    /// Vector magnitude of the acceleration.
    pub fn magnitude(&self) -> MetersPerSecondSquared {
        (self.x.powi(2) + self.y.powi(2) + self.z.powi(2)).sqrt()
    }
}
