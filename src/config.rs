//! Connection and board defaults, stored on disk as RON.
//!
//! A config file only needs the fields it wants to change:
//!
//! ```text
//! (host: "192.168.4.1", port: 8080, data_rate: Hz10)
//! ```

use std::{fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::device::{DataRate, DeviceParams, Range};
use crate::error::ConfigError;
use crate::interval_monitor::DEFAULT_DRIFT_TOLERANCE_MS;

/// Address of the board's soft access point.
pub const DEFAULT_HOST: &str = "192.168.4.1";
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound on establishing the connection.
    pub connect_timeout_ms: u64,
    /// Read timeout once connected; `None` blocks until data or disconnect.
    pub read_timeout_ms: Option<u64>,
    pub read_buffer_size: usize,
    pub drift_tolerance_ms: u32,
    /// Settings the board boots with, restored when the client closes.
    pub data_rate: DataRate,
    pub range: Range,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            connect_timeout_ms: 2000,
            read_timeout_ms: None,
            read_buffer_size: 4096,
            drift_tolerance_ms: DEFAULT_DRIFT_TOLERANCE_MS,
            data_rate: DataRate::default(),
            range: Range::default(),
        }
    }
}

impl BoardConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Ok(ron::de::from_str(&text)?)
    }

    pub fn to_path(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let text = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;
        fs::write(path, text)?;
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }

    /// Board defaults as the starting device parameters.
    pub fn default_params(&self) -> DeviceParams {
        DeviceParams::new(self.data_rate, self.range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config: BoardConfig = ron::de::from_str("(port: 9000, data_rate: Hz50)").unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.data_rate, DataRate::Hz50);
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.connect_timeout(), Duration::from_secs(2));
        assert_eq!(config.read_timeout(), None);
    }

    #[test]
    fn write_and_read_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.ron");
        let config = BoardConfig {
            host: "127.0.0.1".to_owned(),
            read_timeout_ms: Some(500),
            range: Range::G8,
            ..Default::default()
        };

        config.to_path(&path).unwrap();
        assert_eq!(BoardConfig::from_path(&path).unwrap(), config);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = BoardConfig::from_path(dir.path().join("absent.ron")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
