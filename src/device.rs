//! Board settings and the commands the host can send.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::ParameterError;

/// Output data rate of the accelerometers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DataRate {
    #[default]
    Hz1,
    Hz10,
    Hz25,
    Hz50,
    Hz100,
}

impl DataRate {
    /// Every rate the board accepts, slowest first.
    pub const ALL: [DataRate; 5] = [
        DataRate::Hz1,
        DataRate::Hz10,
        DataRate::Hz25,
        DataRate::Hz50,
        DataRate::Hz100,
    ];

    pub fn hz(self) -> u32 {
        match self {
            DataRate::Hz1 => 1,
            DataRate::Hz10 => 10,
            DataRate::Hz25 => 25,
            DataRate::Hz50 => 50,
            DataRate::Hz100 => 100,
        }
    }

    /// Milliseconds between two rows at this rate.
    pub fn interval_ms(self) -> u32 {
        1000 / self.hz()
    }

    pub fn from_hz(hz: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.hz() == hz)
    }
}

impl fmt::Display for DataRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Hz", self.hz())
    }
}

impl FromStr for DataRate {
    type Err = ParameterError;

    /// Accepts either the bare number the board uses or the `"10 Hz"` label.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let number = s.split_whitespace().next().unwrap_or_default();
        number
            .parse()
            .ok()
            .and_then(Self::from_hz)
            .ok_or_else(|| ParameterError::DataRate(s.to_owned()))
    }
}

/// Full-scale measurement range, in multiples of g.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Range {
    #[default]
    G2,
    G4,
    G8,
    G16,
}

impl Range {
    pub const ALL: [Range; 4] = [Range::G2, Range::G4, Range::G8, Range::G16];

    pub fn g(self) -> u32 {
        match self {
            Range::G2 => 2,
            Range::G4 => 4,
            Range::G8 => 8,
            Range::G16 => 16,
        }
    }

    pub fn from_g(g: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.g() == g)
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} G", self.g())
    }
}

impl FromStr for Range {
    type Err = ParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let number = s.split_whitespace().next().unwrap_or_default();
        number
            .parse()
            .ok()
            .and_then(Self::from_g)
            .ok_or_else(|| ParameterError::Range(s.to_owned()))
    }
}

/// The settings the host believes the board is running with.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeviceParams {
    pub data_rate: DataRate,
    pub range: Range,
    /// Measured interval between two rows of the reference sensor. Unset
    /// until the interval monitor has seen two readings.
    pub actual_interval_ms: Option<i64>,
}

impl DeviceParams {
    pub fn new(data_rate: DataRate, range: Range) -> Self {
        Self {
            data_rate,
            range,
            actual_interval_ms: None,
        }
    }

    /// Interval implied by the configured data rate.
    pub fn expected_interval_ms(&self) -> u32 {
        self.data_rate.interval_ms()
    }
}

/// A change of one board setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterUpdate {
    DataRate(DataRate),
    Range(Range),
}

impl ParameterUpdate {
    /// Human readable name used in status messages.
    pub fn name(&self) -> &'static str {
        match self {
            ParameterUpdate::DataRate(_) => "datarate",
            ParameterUpdate::Range(_) => "range",
        }
    }

    pub fn command(&self) -> Command {
        match *self {
            ParameterUpdate::DataRate(rate) => Command::SetDataRate(rate),
            ParameterUpdate::Range(range) => Command::SetRange(range),
        }
    }
}

/// Host to board commands. Each is sent as one newline terminated token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Exit,
    SetDataRate(DataRate),
    SetRange(Range),
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Start => write!(f, "START"),
            Command::Stop => write!(f, "STOP"),
            Command::Exit => write!(f, "EXIT"),
            Command::SetDataRate(rate) => write!(f, "{}", rate.hz()),
            Command::SetRange(range) => write!(f, "{}", range.g()),
        }
    }
}

impl FromStr for Command {
    type Err = ParameterError;

    /// Decodes a token as the board sees it. A bare number is a data rate if
    /// it is one of the supported rates, otherwise it must be a range.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "START" => Ok(Command::Start),
            "STOP" => Ok(Command::Stop),
            "EXIT" => Ok(Command::Exit),
            other => match other.parse::<u32>() {
                Ok(n) => DataRate::from_hz(n)
                    .map(Command::SetDataRate)
                    .or_else(|| Range::from_g(n).map(Command::SetRange))
                    .ok_or_else(|| ParameterError::Range(other.to_owned())),
                Err(_) => Err(ParameterError::DataRate(other.to_owned())),
            },
        }
    }
}
