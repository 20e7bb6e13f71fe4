//! CSV output of a recorded table. Each sensor gets two files in the
//! chosen directory:
//!
//! - `S_<id> data.csv`: the raw rows with their per-sensor index.
//! - `S_<id> stat analysis.csv`: count, mean, std, min, median and max of
//!   each acceleration axis and of the normalized timestamp.

use std::{
    fs,
    path::{Path, PathBuf},
};

use log::info;

use crate::analysis::{describe, Describe};
use crate::error::ExportError;
use crate::reading::SensorId;
use crate::table::{SensorTable, TableRow};

const DATA_HEADER: [&str; 7] = [
    "",
    "timestamp",
    "x-acceleration",
    "y-acceleration",
    "z-acceleration",
    "normalized_timestamp",
    "sensor_id",
];
const STATS_HEADER: [&str; 5] = [
    "",
    "x-acceleration",
    "y-acceleration",
    "z-acceleration",
    "normalized_timestamp",
];

pub fn data_path(dir: &Path, sensor_id: SensorId) -> PathBuf {
    dir.join(format!("S_{sensor_id} data.csv"))
}

pub fn stats_path(dir: &Path, sensor_id: SensorId) -> PathBuf {
    dir.join(format!("S_{sensor_id} stat analysis.csv"))
}

/// Write both files for each of `sensors` (every sensor in the table if
/// `None`), creating `dir` if needed. Sensors without rows are skipped.
/// Returns the paths written.
pub fn export_table(
    table: &SensorTable,
    dir: impl AsRef<Path>,
    sensors: Option<&[SensorId]>,
) -> Result<Vec<PathBuf>, ExportError> {
    if table.is_empty() {
        return Err(ExportError::NoData);
    }
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let ids: Vec<SensorId> = match sensors {
        Some(ids) => ids.to_vec(),
        None => table.sensors().into_iter().collect(),
    };
    let mut written = Vec::new();
    for id in ids {
        let rows = table.rows_for(id);
        if rows.is_empty() {
            continue;
        }
        let data = data_path(dir, id);
        write_data(&data, &rows)?;
        let stats = stats_path(dir, id);
        write_stats(&stats, &rows)?;
        info!("Exported sensor {id} to {}", dir.display());
        written.extend([data, stats]);
    }

    if written.is_empty() {
        return Err(ExportError::NoData);
    }
    Ok(written)
}

fn write_data(path: &Path, rows: &[TableRow]) -> Result<(), ExportError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(DATA_HEADER)?;
    for (index, row) in rows.iter().enumerate() {
        writer.write_record([
            index.to_string(),
            row.timestamp.to_string(),
            row.x.to_string(),
            row.y.to_string(),
            row.z.to_string(),
            row.normalized_timestamp.to_string(),
            row.sensor_id.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_stats(path: &Path, rows: &[TableRow]) -> Result<(), ExportError> {
    let getters: [fn(&TableRow) -> f64; 4] = [
        |r| r.x,
        |r| r.y,
        |r| r.z,
        |r| r.normalized_timestamp,
    ];
    let columns = getters.map(|f| describe(&rows.iter().map(f).collect::<Vec<_>>()));

    let cell = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_default();
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(STATS_HEADER)?;
    let lines: [(&str, fn(&Describe) -> Option<f64>); 6] = [
        ("count", |d| Some(d.count as f64)),
        ("mean", |d| d.mean),
        ("std", |d| d.std),
        ("min", |d| d.min),
        ("50%", |d| d.median),
        ("max", |d| d.max),
    ];
    for (name, stat) in lines {
        let mut record = vec![name.to_owned()];
        record.extend(columns.iter().map(|d| cell(stat(d))));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(sensor_id: SensorId, timestamp: f64, x: f64) -> TableRow {
        TableRow {
            sensor_id,
            timestamp,
            normalized_timestamp: timestamp - 1.0,
            x,
            y: 0.0,
            z: 9.8,
        }
    }

    #[test]
    fn empty_table_is_no_data() {
        let dir = tempfile::tempdir().unwrap();
        let err = export_table(&SensorTable::default(), dir.path(), None).unwrap_err();
        assert!(matches!(err, ExportError::NoData));
        assert_eq!(err.to_string(), "No data to process.");
    }

    #[test]
    fn writes_data_and_stats_per_sensor() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("run 1");
        let table = SensorTable::new(vec![
            row(0, 1.0, 1.0),
            row(0, 1.5, 3.0),
            row(4, 1.0, 2.0),
        ]);

        let written = export_table(&table, &out, None).unwrap();
        assert_eq!(written.len(), 4);

        let data = fs::read_to_string(data_path(&out, 0)).unwrap();
        assert_eq!(
            data,
            ",timestamp,x-acceleration,y-acceleration,z-acceleration,normalized_timestamp,sensor_id\n\
             0,1,1,0,9.8,0,0\n\
             1,1.5,3,0,9.8,0.5,0\n"
        );

        let stats = fs::read_to_string(stats_path(&out, 4)).unwrap();
        let lines: Vec<&str> = stats.lines().collect();
        assert_eq!(
            lines[0],
            ",x-acceleration,y-acceleration,z-acceleration,normalized_timestamp"
        );
        assert_eq!(lines[1], "count,1,1,1,1");
        // A single value has no sample deviation.
        assert_eq!(lines[3], "std,,,,");
        assert_eq!(lines[5], "50%,2,0,9.8,0");
    }

    #[test]
    fn only_selected_sensors_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let table = SensorTable::new(vec![row(0, 1.0, 1.0), row(1, 1.0, 1.0)]);

        let written = export_table(&table, dir.path(), Some(&[1, 7])).unwrap();
        assert_eq!(written, vec![data_path(dir.path(), 1), stats_path(dir.path(), 1)]);
        assert!(!data_path(dir.path(), 0).exists());

        let err = export_table(&table, dir.path(), Some(&[7])).unwrap_err();
        assert!(matches!(err, ExportError::NoData));
    }
}
