use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::path::Path;
use time::macros::format_description;
use time::OffsetDateTime;

use super::analysis::GrainSizeDistribution;
use super::constants::{GSD_COLUMNS, PERCENTILE_COLUMNS};
use super::error::ResultsError;
use super::unit::ProcessingUnit;

/// The statistics record (stats.txt). Fields serialize in alphabetical order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrainSizeStats {
    pub kurtosis: f64,
    pub mean: f64,
    pub skewness: f64,
    pub sorting: f64,
    /// Wall-clock completion time; the only field that differs between identical runs
    pub time: String,
}

impl GrainSizeStats {
    pub fn new(gsd: &GrainSizeDistribution, time: String) -> Self {
        Self {
            kurtosis: gsd.kurtosis,
            mean: gsd.mean,
            skewness: gsd.skewness,
            sorting: gsd.sorting,
            time,
        }
    }
}

/// Local time (UTC if the local offset cannot be determined) as `YYYY-MM-DD HH:MM:SS`
pub fn completion_timestamp() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    now.format(&format).unwrap_or_else(|_| now.to_string())
}

/// Write the statistics, percentile and histogram files of a unit, replacing earlier results
pub fn write_results(
    unit: &ProcessingUnit,
    gsd: &GrainSizeDistribution,
) -> Result<(), ResultsError> {
    write_results_with_time(unit, gsd, completion_timestamp())
}

pub fn write_results_with_time(
    unit: &ProcessingUnit,
    gsd: &GrainSizeDistribution,
    time: String,
) -> Result<(), ResultsError> {
    if gsd.percentiles.len() != gsd.percentile_values.len() {
        return Err(ResultsError::LengthMismatch(
            gsd.percentiles.len(),
            gsd.percentile_values.len(),
        ));
    }
    if gsd.bins.len() != gsd.frequencies.len() {
        return Err(ResultsError::LengthMismatch(
            gsd.bins.len(),
            gsd.frequencies.len(),
        ));
    }

    let stats = GrainSizeStats::new(gsd, time);
    std::fs::write(unit.stats_path(), serde_yaml::to_string(&stats)?)?;
    write_table(
        &unit.percentiles_path(),
        PERCENTILE_COLUMNS,
        &gsd.percentiles,
        &gsd.percentile_values,
    )?;
    write_table(&unit.gsd_path(), GSD_COLUMNS, &gsd.bins, &gsd.frequencies)?;
    Ok(())
}

fn write_table(
    path: &Path,
    columns: [&str; 2],
    labels: &[f64],
    values: &[f64],
) -> Result<(), ResultsError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(columns)?;
    for (label, value) in labels.iter().zip(values) {
        writer.write_record([label.to_string(), value.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a statistics record as an ordered mapping
pub fn read_stats(path: &Path) -> Result<Mapping, ResultsError> {
    if !path.exists() {
        return Err(ResultsError::BadFilePath(path.to_path_buf()));
    }
    let yaml_str = std::fs::read_to_string(path)?;
    match serde_yaml::from_str::<Value>(&yaml_str)? {
        Value::Mapping(m) => Ok(m),
        _ => Err(ResultsError::NotAMapping(path.to_path_buf())),
    }
}

/// Read a two-column table as raw (label, value) text pairs, checking the header
pub fn read_table(
    path: &Path,
    columns: [&'static str; 2],
) -> Result<Vec<(String, String)>, ResultsError> {
    if !path.exists() {
        return Err(ResultsError::BadFilePath(path.to_path_buf()));
    }
    let mut reader = csv::Reader::from_path(path)?;
    let header: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if header.len() != 2 || header[0] != columns[0] || header[1] != columns[1] {
        return Err(ResultsError::BadHeader {
            path: path.to_path_buf(),
            expected: columns,
            found: header,
        });
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let label = record.get(0).unwrap_or_default().trim().to_string();
        let value = record.get(1).unwrap_or_default().trim().to_string();
        rows.push((label, value));
    }
    Ok(rows)
}
