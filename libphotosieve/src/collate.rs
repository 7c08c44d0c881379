use std::path::Path;

use super::constants::{
    BIN_PREFIX, GSD_COLUMNS, IDENTITY_KEYS, PERCENTILE_COLUMNS, PERCENTILE_PREFIX,
};
use super::error::{CollateError, UnitError};
use super::results::{read_stats, read_table};
use super::unit::ProcessingUnit;
use super::unit_config::{render_scalar, UnitConfig};

/// One unit flattened into parallel key and value sequences.
///
/// Keys are, in order: the identity fields, configuration keys, statistics keys,
/// `p_`-prefixed percentile labels and `b_`-prefixed bin labels.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatRow {
    pub keys: Vec<String>,
    pub values: Vec<String>,
}

impl FlatRow {
    /// Read a unit's configuration, statistics, percentile and histogram files and flatten them
    pub fn from_unit(unit: &ProcessingUnit) -> Result<Self, UnitError> {
        let config = UnitConfig::read(unit)?;
        let stats = read_stats(&unit.stats_path())?;
        let percentiles = read_table(&unit.percentiles_path(), PERCENTILE_COLUMNS)?;
        let gsd = read_table(&unit.gsd_path(), GSD_COLUMNS)?;

        let mut keys: Vec<String> = IDENTITY_KEYS.iter().map(|k| k.to_string()).collect();
        let mut values: Vec<String> = vec![
            unit.directory_name(),
            unit.path().to_string_lossy().into_owned(),
            unit.parent_directory_name(),
        ];

        keys.extend(config.keys());
        values.extend(config.rendered_values());

        for (key, value) in stats.iter() {
            keys.push(render_scalar(key));
            values.push(render_scalar(value));
        }
        for (label, value) in percentiles {
            keys.push(format!("{PERCENTILE_PREFIX}{label}"));
            values.push(value);
        }
        for (label, value) in gsd {
            keys.push(format!("{BIN_PREFIX}{label}"));
            values.push(value);
        }

        Ok(Self { keys, values })
    }
}

/// Accumulates flattened rows for a single collation run.
///
/// The key sequence of the first row pushed becomes the canonical schema; every later
/// row must match it exactly (same keys, same order).
#[derive(Debug, Default)]
pub struct Collator {
    schema: Option<Vec<String>>,
    rows: Vec<Vec<String>>,
}

impl Collator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema(&self) -> Option<&[String]> {
        self.schema.as_deref()
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Append a row, or fail with `SchemaInconsistency` if its keys differ from the canonical schema
    pub fn push(&mut self, path: &Path, row: FlatRow) -> Result<(), CollateError> {
        if let Some(schema) = &self.schema {
            if *schema != row.keys {
                return Err(CollateError::SchemaInconsistency {
                    path: path.to_path_buf(),
                    expected: schema.clone(),
                    found: row.keys,
                });
            }
        } else {
            self.schema = Some(row.keys);
        }
        self.rows.push(row.values);
        Ok(())
    }

    /// Write the table with the schema as header row
    pub fn write_csv(&self, path: &Path) -> Result<(), CollateError> {
        let mut writer = csv::Writer::from_path(path)?;
        if let Some(schema) = &self.schema {
            writer.write_record(schema)?;
        }
        for row in self.rows.iter() {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}
