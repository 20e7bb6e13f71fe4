// Commandline argument parsers using clap for accelstream and simboard

use std::path::PathBuf;

use clap::Parser;

use crate::analysis::IntervalChoice;
use crate::config::BoardConfig;
use crate::reading::SensorId;

#[derive(Debug, Parser, Clone)]
#[clap(version, about)]
/// Record and inspect accelerometer data streamed by the sensor board
pub struct DashboardArgs {
    /// RON file with connection and board defaults
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address of the board, overrides the config file
    #[arg(long)]
    pub host: Option<String>,

    /// TCP port of the board, overrides the config file
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Directory that CSV exports are written to
    #[arg(short, long, default_value = ".")]
    pub out: PathBuf,

    /// Interval used for the spectrum, Actual or Expected
    #[arg(short, long, default_value = "Expected")]
    pub interval: IntervalChoice,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl DashboardArgs {
    /// Load the config file if one was given and lay the flags over it.
    pub fn board_config(&self) -> Result<BoardConfig, crate::error::ConfigError> {
        let mut config = match &self.config {
            Some(path) => BoardConfig::from_path(path)?,
            None => BoardConfig::default(),
        };
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        Ok(config)
    }
}

#[derive(Debug, Parser, Clone)]
#[clap(version, about)]
/// Pretend to be the sensor board, for working without hardware
pub struct SimBoardArgs {
    /// Address to listen on
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    pub bind: String,

    /// Number of simulated sensors, up to 8
    #[arg(short, long, default_value_t = 3)]
    pub sensors: SensorId,

    /// Amplitude of the noise on each axis, in m/s^2
    #[arg(short, long, default_value_t = 0.05)]
    pub noise: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DataRate;

    #[test]
    fn flags_override_the_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.ron");
        std::fs::write(&path, "(host: \"10.0.0.2\", port: 9000, data_rate: Hz10)").unwrap();

        let args = DashboardArgs::parse_from([
            "accelstream",
            "--config",
            path.to_str().unwrap(),
            "--port",
            "9100",
            "--interval",
            "actual",
        ]);
        let config = args.board_config().unwrap();
        assert_eq!(config.host, "10.0.0.2");
        assert_eq!(config.port, 9100);
        assert_eq!(config.data_rate, DataRate::Hz10);
        assert_eq!(args.interval, IntervalChoice::Actual);
        assert_eq!(args.out, PathBuf::from("."));
    }

    #[test]
    fn defaults_without_a_file() {
        let args = DashboardArgs::parse_from(["accelstream"]);
        assert_eq!(args.board_config().unwrap(), BoardConfig::default());

        let sim = SimBoardArgs::parse_from(["simboard", "-s", "5"]);
        assert_eq!(sim.sensors, 5);
        assert_eq!(sim.bind, "127.0.0.1:8080");
    }
}
