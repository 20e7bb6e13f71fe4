//! Error types shared across the crate.

use std::{io, net::SocketAddr};

use crate::device::Command;

/// A framed line that does not look like `sensor_id,timestamp_ms,x,y,z`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid data: {line}")]
    MalformedRecord { line: String },
}

/// A data rate or range that the board does not support.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParameterError {
    #[error("unsupported data rate: {0} (expected one of 1, 10, 25, 50, 100)")]
    DataRate(String),
    #[error("unsupported range: {0} (expected one of 2, 4, 8, 16)")]
    Range(String),
}

/// Failures of the connection manager. None of these are fatal to the
/// process; each one has already been reported on the event channel by the
/// time it is returned.
#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error("not connected to the board")]
    NotConnected,
    #[error("already connected to the board")]
    AlreadyConnected,
    #[error("could not resolve {host}:{port}")]
    Resolve { host: String, port: u16 },
    #[error("connection to {addr} failed: {source}")]
    Connect { addr: SocketAddr, source: io::Error },
    #[error("failed to send {command}: {source}")]
    Send { command: Command, source: io::Error },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("receive thread panicked")]
    ThreadPanicked,
}

/// Failures loading or saving a [`crate::config::BoardConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("ron error: {0}")]
    Ron(#[from] ron::Error),
    #[error("ron spanning error: {0}")]
    RonSpanned(#[from] ron::de::SpannedError),
}

/// Failures writing analysis output.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("No data to process.")]
    NoData,
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}
