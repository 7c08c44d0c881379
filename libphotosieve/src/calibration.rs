use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::constants::KEY_CALIBRATION_FILE;
use super::error::{CalibrationError, UnitConfigError};
use super::unit::ProcessingUnit;
use super::unit_config::UnitConfig;

/// File extension of calibration scripts written by older calibration toolboxes
const LEGACY_EXTENSION: &str = "py";
const MAX_COEFFICIENTS: usize = 5;

/// Pinhole camera intrinsics and Brown-Conrady distortion coefficients.
///
/// The YAML form is
///
/// ```yml
/// camera_matrix:
/// - [3000.0, 0.0, 2000.0]
/// - [0.0, 3000.0, 1500.0]
/// - [0.0, 0.0, 1.0]
/// distortion: [-0.12, 0.05, 0.0, 0.0, 0.0]
/// ```
///
/// Distortion coefficients are in the order k1, k2, p1, p2, k3; missing trailing
/// coefficients are treated as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationParams {
    pub camera_matrix: [[f64; 3]; 3],
    #[serde(default)]
    pub distortion: Vec<f64>,
}

impl CalibrationParams {
    /// Read calibration parameters from a file.
    ///
    /// Files ending in `.py` are legacy calibration scripts. Their contents are never
    /// executed: only the literal arrays bound to `K` and `d` are extracted, and only
    /// when `allow_legacy` is set.
    pub fn read_file(path: &Path, allow_legacy: bool) -> Result<Self, CalibrationError> {
        if !path.exists() {
            return Err(CalibrationError::BadFilePath(path.to_path_buf()));
        }
        let contents = std::fs::read_to_string(path)?;

        let is_legacy = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case(LEGACY_EXTENSION))
            .unwrap_or(false);
        let params = if is_legacy {
            if !allow_legacy {
                return Err(CalibrationError::LegacyFormatDisabled(path.to_path_buf()));
            }
            log::warn!(
                "Reading legacy calibration script {} (literal arrays only)",
                path.display()
            );
            Self::parse_legacy(&contents, path)?
        } else {
            serde_yaml::from_str::<Self>(&contents)?
        };

        params.validate()?;
        Ok(params)
    }

    /// Extract `K = ...([[...]])` and `d = ...([...])` literals from a calibration script
    fn parse_legacy(contents: &str, path: &Path) -> Result<Self, CalibrationError> {
        let k_values = legacy_array(contents, "K")?.ok_or(CalibrationError::LegacyMissingArray {
            path: path.to_path_buf(),
            name: "K",
        })?;
        let d_values = legacy_array(contents, "d")?.ok_or(CalibrationError::LegacyMissingArray {
            path: path.to_path_buf(),
            name: "d",
        })?;

        if k_values.len() != 9 {
            return Err(CalibrationError::BadCameraMatrix(format!(
                "expected 9 values for K, found {}",
                k_values.len()
            )));
        }
        let mut camera_matrix = [[0.0; 3]; 3];
        for (idx, value) in k_values.into_iter().enumerate() {
            camera_matrix[idx / 3][idx % 3] = value;
        }
        Ok(Self {
            camera_matrix,
            distortion: d_values,
        })
    }

    fn validate(&self) -> Result<(), CalibrationError> {
        if self.distortion.len() > MAX_COEFFICIENTS {
            return Err(CalibrationError::TooManyCoefficients(self.distortion.len()));
        }
        let all_finite = self
            .camera_matrix
            .iter()
            .flatten()
            .chain(self.distortion.iter())
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(CalibrationError::BadCameraMatrix(
                "non-finite value".to_string(),
            ));
        }
        if self.fx() <= 0.0 || self.fy() <= 0.0 {
            return Err(CalibrationError::BadCameraMatrix(
                "focal lengths must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn fx(&self) -> f64 {
        self.camera_matrix[0][0]
    }

    pub fn fy(&self) -> f64 {
        self.camera_matrix[1][1]
    }

    pub fn cx(&self) -> f64 {
        self.camera_matrix[0][2]
    }

    pub fn cy(&self) -> f64 {
        self.camera_matrix[1][2]
    }

    /// k1, k2, p1, p2, k3 with missing entries zeroed
    pub fn coefficients(&self) -> [f64; MAX_COEFFICIENTS] {
        let mut coeffs = [0.0; MAX_COEFFICIENTS];
        for (c, d) in coeffs.iter_mut().zip(&self.distortion) {
            *c = *d;
        }
        coeffs
    }

    /// Forward model: ideal normalized coordinates to distorted normalized coordinates
    pub fn distort_normalized(&self, x: f64, y: f64) -> (f64, f64) {
        let [k1, k2, p1, p2, k3] = self.coefficients();
        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        let r6 = r4 * r2;
        let radial = 1.0 + k1 * r2 + k2 * r4 + k3 * r6;
        let x_d = x * radial + 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x);
        let y_d = y * radial + p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y;
        (x_d, y_d)
    }
}

fn legacy_array(contents: &str, name: &str) -> Result<Option<Vec<f64>>, CalibrationError> {
    let pattern = format!(
        r"(?m)^\s*{}\s*=\s*(?:[A-Za-z_][\w.]*\s*\(\s*)?(\[[0-9eE+\-.,\s\[\]]*\])",
        regex::escape(name)
    );
    let assignment = Regex::new(&pattern)?;
    let number = Regex::new(r"[-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?")?;

    match assignment.captures(contents).and_then(|c| c.get(1)) {
        Some(literal) => number
            .find_iter(literal.as_str())
            .map(|m| {
                m.as_str()
                    .parse::<f64>()
                    .map_err(|_| CalibrationError::BadNumber(m.as_str().to_string()))
            })
            .collect::<Result<Vec<f64>, CalibrationError>>()
            .map(Some),
        None => Ok(None),
    }
}

/// Locate the calibration file named by a unit's configuration. Relative paths are
/// resolved against the unit directory.
pub fn calibration_file_for(
    unit: &ProcessingUnit,
    config: &UnitConfig,
) -> Result<PathBuf, UnitConfigError> {
    let path = config.get_path(KEY_CALIBRATION_FILE)?;
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(unit.path().join(path))
    }
}
