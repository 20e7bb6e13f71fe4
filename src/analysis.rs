//! Post-hoc processing of a recorded table: vector magnitude and RMS,
//! per-axis frequency spectra and descriptive statistics.

use std::{fmt, str::FromStr};

use log::debug;
use rustfft::{num_complex::Complex, FftPlanner};

use crate::device::DeviceParams;
use crate::reading::SensorId;
use crate::table::{SensorTable, TableRow};

/// Which sampling interval the spectrum is computed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntervalChoice {
    /// The interval measured from the data. Falls back to the expected one
    /// until a measurement exists.
    Actual,
    /// The interval the configured data rate promises.
    #[default]
    Expected,
}

impl IntervalChoice {
    pub const ALL: [IntervalChoice; 2] = [IntervalChoice::Actual, IntervalChoice::Expected];

    pub fn interval_ms(self, params: &DeviceParams) -> f64 {
        let expected = f64::from(params.expected_interval_ms());
        match (self, params.actual_interval_ms) {
            (IntervalChoice::Actual, Some(actual)) if actual > 0 => actual as f64,
            _ => expected,
        }
    }
}

impl fmt::Display for IntervalChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntervalChoice::Actual => write!(f, "Actual"),
            IntervalChoice::Expected => write!(f, "Expected"),
        }
    }
}

impl FromStr for IntervalChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "actual" => Ok(IntervalChoice::Actual),
            "expected" => Ok(IntervalChoice::Expected),
            other => Err(format!("unknown interval choice: {other}")),
        }
    }
}

/// Summary statistics of one column. Everything but `count` is `None` for
/// an empty column, and `std` also needs at least two values.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Describe {
    pub count: usize,
    pub mean: Option<f64>,
    /// Sample standard deviation (n - 1 denominator).
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub median: Option<f64>,
    pub max: Option<f64>,
}

pub fn describe(values: &[f64]) -> Describe {
    let count = values.len();
    if count == 0 {
        return Describe::default();
    }
    let n = count as f64;
    let mean = values.iter().sum::<f64>() / n;
    let std = (count > 1).then(|| {
        let squares: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
        (squares / (n - 1.0)).sqrt()
    });

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = count / 2;
    let median = if count % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    };

    Describe {
        count,
        mean: Some(mean),
        std,
        min: sorted.first().copied(),
        median: Some(median),
        max: sorted.last().copied(),
    }
}

/// Length of the acceleration vector of every row.
pub fn magnitude(rows: &[TableRow]) -> Vec<f64> {
    rows.iter()
        .map(|r| (r.x * r.x + r.y * r.y + r.z * r.z).sqrt())
        .collect()
}

/// Root mean square of the acceleration vector over all rows.
pub fn rms(rows: &[TableRow]) -> Option<f64> {
    if rows.is_empty() {
        return None;
    }
    let sum: f64 = rows.iter().map(|r| r.x * r.x + r.y * r.y + r.z * r.z).sum();
    Some((sum / rows.len() as f64).sqrt())
}

/// One-sided amplitude spectrum.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Spectrum {
    /// Centre frequency of each bin in Hz.
    pub frequencies: Vec<f64>,
    pub magnitudes: Vec<f64>,
}

impl Spectrum {
    /// The strongest bin above DC as `(frequency, magnitude)`.
    pub fn peak(&self) -> Option<(f64, f64)> {
        self.frequencies
            .iter()
            .zip(&self.magnitudes)
            .skip(1)
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(f, m)| (*f, *m))
    }
}

fn hann(n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![1.0];
    }
    (0..n)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f64::consts::PI * i as f64 / (n - 1) as f64).cos()))
        .collect()
}

/// Spectrum of `samples` taken every `interval_s` seconds. The mean is
/// removed and a symmetric Hann window applied before transforming, and
/// only the non-negative frequency bins are kept.
pub fn spectrum(samples: &[f64], interval_s: f64) -> Spectrum {
    let n = samples.len();
    if n == 0 || interval_s <= 0.0 {
        return Spectrum::default();
    }

    let mean = samples.iter().sum::<f64>() / n as f64;
    let mut buffer: Vec<Complex<f64>> = samples
        .iter()
        .zip(hann(n))
        .map(|(v, w)| Complex::new((v - mean) * w, 0.0))
        .collect();

    let mut planner = FftPlanner::new();
    planner.plan_fft_forward(n).process(&mut buffer);

    let bins = n / 2 + 1;
    debug!("FFT of {n} samples at {interval_s} s, {bins} bins");
    Spectrum {
        frequencies: (0..bins).map(|k| k as f64 / (n as f64 * interval_s)).collect(),
        magnitudes: buffer[..bins].iter().map(|c| c.norm()).collect(),
    }
}

/// Everything computed for one sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorAnalysis {
    pub sensor_id: SensorId,
    pub interval_ms: f64,
    pub magnitude: Vec<f64>,
    pub rms: Option<f64>,
    /// x, y and z.
    pub spectra: [Spectrum; 3],
    /// x, y, z and normalized timestamp.
    pub stats: [Describe; 4],
}

/// Analyse one sensor of `table`. Returns `None` if it has no rows.
pub fn analyze(table: &SensorTable, sensor_id: SensorId, interval_ms: f64) -> Option<SensorAnalysis> {
    let rows = table.rows_for(sensor_id);
    if rows.is_empty() {
        return None;
    }
    let column = |f: fn(&TableRow) -> f64| rows.iter().map(f).collect::<Vec<_>>();
    let (x, y, z, t) = (
        column(|r| r.x),
        column(|r| r.y),
        column(|r| r.z),
        column(|r| r.normalized_timestamp),
    );
    let interval_s = interval_ms / 1000.0;

    Some(SensorAnalysis {
        sensor_id,
        interval_ms,
        magnitude: magnitude(&rows),
        rms: rms(&rows),
        spectra: [
            spectrum(&x, interval_s),
            spectrum(&y, interval_s),
            spectrum(&z, interval_s),
        ],
        stats: [describe(&x), describe(&y), describe(&z), describe(&t)],
    })
}
