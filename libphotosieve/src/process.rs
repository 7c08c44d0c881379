use serde_yaml::Value;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;

use super::analysis::{analyze_grain_size, GrainSizeAnalyzer, ScaleVector};
use super::calibration::{calibration_file_for, CalibrationParams};
use super::collate::{Collator, FlatRow};
use super::error::{ProcessorError, UnitError};
use super::photodirs::{list_raw_images, make_photodir};
use super::results::write_results;
use super::undistort::DistortionCorrector;
use super::unit::{discover_units, ImageRole, ProcessingUnit};
use super::unit_config::UnitConfig;
use super::worker_status::{BatchStatus, Stage};

/// What happened to a unit that did not fail
#[derive(Debug, Clone, PartialEq)]
pub enum UnitOutcome {
    /// Work was done; carries the main product (unit directory or corrected image)
    Completed(PathBuf),
    /// Nothing to do, with the reason
    Skipped(String),
}

/// Per-unit results of one batch run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub completed: Vec<PathBuf>,
    pub skipped: Vec<(PathBuf, String)>,
    pub failed: Vec<(PathBuf, String)>,
}

impl BatchReport {
    /// Fold one unit result into the report, logging it against the unit path
    pub fn record(&mut self, path: &Path, result: Result<UnitOutcome, UnitError>) {
        match result {
            Ok(UnitOutcome::Completed(_)) => {
                log::info!("completed: {}", path.display());
                self.completed.push(path.to_path_buf());
            }
            Ok(UnitOutcome::Skipped(reason)) => {
                log::warn!("skipped: {} ({reason})", path.display());
                self.skipped.push((path.to_path_buf(), reason));
            }
            Err(e) => {
                log::error!("failed: {}: {e}", path.display());
                self.failed.push((path.to_path_buf(), e.to_string()));
            }
        }
    }

    pub fn n_units(&self) -> usize {
        self.completed.len() + self.skipped.len() + self.failed.len()
    }

    fn log_summary(&self, stage: Stage) {
        log::info!(
            "Finished {stage}: {} completed, {} skipped, {} failed.",
            self.completed.len(),
            self.skipped.len(),
            self.failed.len()
        );
    }
}

/// Walk root and apply op to every unit, isolating failures per unit
fn run_over_units<F>(
    root: &Path,
    stage: Stage,
    tx: &Sender<BatchStatus>,
    mut op: F,
) -> Result<BatchReport, ProcessorError>
where
    F: FnMut(&ProcessingUnit) -> Result<UnitOutcome, UnitError>,
{
    let mut report = BatchReport::default();
    for (idx, unit) in discover_units(root)?.enumerate() {
        tx.send(BatchStatus::new(idx + 1, unit.path(), stage))?;
        let result = op(&unit);
        report.record(unit.path(), result);
    }
    report.log_summary(stage);
    Ok(report)
}

/// Create one unit directory per photo found directly in target_dir.
///
/// Photos whose directory already exists are reported as failures and left untouched.
pub fn make_photodirs(
    target_dir: &Path,
    extension: &str,
    template: Option<&UnitConfig>,
    tx: &Sender<BatchStatus>,
) -> Result<BatchReport, ProcessorError> {
    let images = list_raw_images(target_dir, extension)?;
    log::info!(
        "Found {} .{extension} image(s) in {}",
        images.len(),
        target_dir.display()
    );
    if template.is_none() {
        log::warn!("No unit template configured; new directories will not be discoverable units.");
    }

    let mut report = BatchReport::default();
    let mut total_bytes: u64 = 0;
    for (idx, image) in images.iter().enumerate() {
        tx.send(BatchStatus::new(idx + 1, image, Stage::PhotoDirs))?;
        let result = make_photodir(image, template).map(|(dir, bytes)| {
            total_bytes += bytes;
            UnitOutcome::Completed(dir)
        });
        report.record(image, result);
    }
    log::info!("Copied {}", human_bytes::human_bytes(total_bytes as f64));
    report.log_summary(Stage::PhotoDirs);
    Ok(report)
}

/// Undistort the single uncorrected image of a unit.
///
/// Units that already hold a corrected image are skipped.
pub fn calibrate_unit(
    unit: &ProcessingUnit,
    corrector: &dyn DistortionCorrector,
    extension: &str,
    allow_legacy: bool,
) -> Result<UnitOutcome, UnitError> {
    if unit.is_calibrated(extension)? {
        return Ok(UnitOutcome::Skipped(String::from("already calibrated")));
    }
    let image = unit.select_image(ImageRole::Calibration, extension)?;
    let config = UnitConfig::read(unit)?;
    let calibration_path = calibration_file_for(unit, &config)?;
    let params = CalibrationParams::read_file(&calibration_path, allow_legacy)?;
    let corrected = corrector.correct(&image, &params)?;
    Ok(UnitOutcome::Completed(corrected))
}

pub fn calibrate_units(
    root: &Path,
    corrector: &dyn DistortionCorrector,
    extension: &str,
    allow_legacy: bool,
    tx: &Sender<BatchStatus>,
) -> Result<BatchReport, ProcessorError> {
    run_over_units(root, Stage::Calibrate, tx, |unit| {
        calibrate_unit(unit, corrector, extension, allow_legacy)
    })
}

/// Analyze the single image of a unit and write its statistics, percentile and histogram files
pub fn analyze_unit(
    unit: &ProcessingUnit,
    analyzer: &dyn GrainSizeAnalyzer,
    scales: &ScaleVector,
    extension: &str,
) -> Result<UnitOutcome, UnitError> {
    let config = UnitConfig::read(unit)?;
    let image = unit.select_image(ImageRole::Analysis, extension)?;
    let gsd = analyze_grain_size(analyzer, &image, &config, scales)?;
    write_results(unit, &gsd)?;
    Ok(UnitOutcome::Completed(unit.path().to_path_buf()))
}

pub fn analyze_units(
    root: &Path,
    analyzer: &dyn GrainSizeAnalyzer,
    scales: &ScaleVector,
    extension: &str,
    tx: &Sender<BatchStatus>,
) -> Result<BatchReport, ProcessorError> {
    run_over_units(root, Stage::Analyze, tx, |unit| {
        analyze_unit(unit, analyzer, scales, extension)
    })
}

/// Merge every analyzed unit under root into one table at output.
///
/// Units with unreadable results are reported and left out. A unit whose column schema
/// differs from the first collated unit aborts the whole run, and nothing is written.
pub fn collate_units(
    root: &Path,
    output: &Path,
    tx: &Sender<BatchStatus>,
) -> Result<BatchReport, ProcessorError> {
    let mut report = BatchReport::default();
    let mut collator = Collator::new();
    for (idx, unit) in discover_units(root)?.enumerate() {
        tx.send(BatchStatus::new(idx + 1, unit.path(), Stage::Collate))?;
        let row = match FlatRow::from_unit(&unit) {
            Ok(row) => row,
            Err(e) => {
                report.record(unit.path(), Err(e));
                continue;
            }
        };
        if let Err(e) = collator.push(unit.path(), row) {
            log::error!("Schema break at {}, aborting collation.", unit.path().display());
            log::error!("{e}");
            return Err(e.into());
        }
        report.record(
            unit.path(),
            Ok(UnitOutcome::Completed(unit.path().to_path_buf())),
        );
    }

    if collator.n_rows() == 0 {
        log::warn!(
            "No units under {} could be collated; {} was not written.",
            root.display(),
            output.display()
        );
    } else {
        collator.write_csv(output)?;
        log::info!(
            "Wrote {} row(s) to {}",
            collator.n_rows(),
            output.display()
        );
    }
    report.log_summary(Stage::Collate);
    Ok(report)
}

/// Set one configuration key to value in every unit under root
pub fn set_config_value(
    root: &Path,
    key: &str,
    value: Value,
    tx: &Sender<BatchStatus>,
) -> Result<BatchReport, ProcessorError> {
    run_over_units(root, Stage::SetKey, tx, |unit| {
        let mut config = UnitConfig::read(unit)?;
        config.set(key, value.clone());
        config.write(unit)?;
        Ok(UnitOutcome::Completed(unit.path().to_path_buf()))
    })
}
