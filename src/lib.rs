//! accelstream is the host side of a small wireless accelerometer rig. A
//! microcontroller board with up to eight accelerometers serves a TCP socket
//! on its own access point and, once told to start, streams one line per
//! sensor reading:
//!
//! ```text
//! <sensor_id>,<timestamp_ms>,<x>,<y>,<z>
//! ```
//!
//! The pipeline that turns that byte stream into per-sensor time series runs
//! on a background thread owned by [`board_client::BoardClient`]:
//!
//! - [`line_framer`] reassembles lines across arbitrary TCP fragmentation.
//! - [`record_parser`] turns each line into a [`reading::SensorReading`].
//! - [`store`] keeps one normalized series per sensor.
//! - [`interval_monitor`] measures the real sampling interval and flags
//!   drift from the configured data rate.
//!
//! Everything that happens is announced as a [`session::SessionEvent`]. The
//! [`gui`] module presents those in the terminal, and [`analysis`] and
//! [`export`] work on snapshots of the recorded data. [`dummy_board`] speaks
//! the board's side of the protocol for testing without hardware.

pub mod analysis;
pub mod args;
pub mod board_client;
pub mod config;
pub mod device;
pub mod dummy_board;
pub mod error;
pub mod export;
pub mod gui;
pub mod interval_monitor;
pub mod line_framer;
pub mod reading;
pub mod record_parser;
pub mod session;
pub mod store;
pub mod table;
