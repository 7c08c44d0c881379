use std::path::PathBuf;
use thiserror::Error;

use super::worker_status::BatchStatus;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Config contains an invalid scale vector: {0}")]
    BadScales(#[from] ScaleError),
}

#[derive(Debug, Error)]
pub enum UnitConfigError {
    #[error("Could not read unit configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("UnitConfig failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("UnitConfig failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("UnitConfig file {0:?} does not contain a key/value mapping")]
    NotAMapping(PathBuf),
    #[error("UnitConfig is missing required key '{0}'")]
    MissingKey(String),
    #[error("UnitConfig key '{key}' has an invalid value; expected {expected}")]
    BadValue { key: String, expected: &'static str },
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Could not walk root directory {0:?} as it does not exist or is not a directory")]
    BadRootPath(PathBuf),
    #[error("Discovery failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScaleError {
    #[error("Scale vector is empty")]
    Empty,
    #[error("Scale vector contains a non-positive or non-finite value: {0}")]
    NonPositive(f64),
    #[error("Scale vector is not strictly ascending at {0}")]
    NotAscending(f64),
    #[error("Could not parse scale value '{0}'")]
    Parse(String),
    #[error("Scale range would produce {0} scales; at most 10000 are allowed")]
    TooMany(f64),
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Analysis failed to read image: {0}")]
    ImageError(#[from] image::ImageError),
    #[error("Analysis failed because image {path:?} is too small ({width}x{height})")]
    ImageTooSmall {
        path: PathBuf,
        width: u32,
        height: u32,
    },
    #[error("Analysis failed because no scale fits within the image width limit of {0} px")]
    NoUsableScales(f64),
    #[error("Analysis failed because the wavelet spectrum carried no power")]
    EmptySpectrum,
    #[error("Analysis failed due to unit configuration error: {0}")]
    ConfigError(#[from] UnitConfigError),
}

#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("Could not load calibration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Calibration failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Calibration failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Calibration file {0:?} uses the legacy script format, which is disabled; set allow_legacy_calibration to read it")]
    LegacyFormatDisabled(PathBuf),
    #[error("Calibration file {path:?} is missing a literal array for '{name}'")]
    LegacyMissingArray { path: PathBuf, name: &'static str },
    #[error("Calibration failed to build a literal pattern: {0}")]
    PatternError(#[from] regex::Error),
    #[error("Calibration failed to parse number '{0}'")]
    BadNumber(String),
    #[error("Calibration has an invalid camera matrix: {0}")]
    BadCameraMatrix(String),
    #[error("Calibration has {0} distortion coefficients; at most 5 are supported")]
    TooManyCoefficients(usize),
    #[error("Calibration failed due to image error: {0}")]
    ImageError(#[from] image::ImageError),
    #[error("Calibration could not derive an output name for image {0:?}")]
    BadImageName(PathBuf),
}

#[derive(Debug, Error)]
pub enum ResultsError {
    #[error("Results file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Results failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Results failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Results failed due to CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("Results file {path:?} has header {found:?}; expected {expected:?}")]
    BadHeader {
        path: PathBuf,
        expected: [&'static str; 2],
        found: Vec<String>,
    },
    #[error("Results file {0:?} does not contain a key/value mapping")]
    NotAMapping(PathBuf),
    #[error("Results distribution has mismatched lengths: {0} labels and {1} values")]
    LengthMismatch(usize, usize),
}

#[derive(Debug, Error)]
pub enum DeblurError {
    #[error("Deblur failed due to image error: {0}")]
    ImageError(#[from] image::ImageError),
    #[error("Deblur radius must be positive, got {0}")]
    BadRadius(f64),
    #[error("Deblur tint must be within [0, 1], got {0}")]
    BadTint(f64),
}

/// Recoverable errors for a single processing unit. Batch drivers log these and move on.
#[derive(Debug, Error)]
pub enum UnitError {
    #[error("Unit {path:?} has {found} candidate image(s); exactly one is required")]
    ImageCount { path: PathBuf, found: usize },
    #[error("Unit failed due to configuration error: {0}")]
    Config(#[from] UnitConfigError),
    #[error("Unit failed due to analysis error: {0}")]
    Analysis(#[from] AnalysisError),
    #[error("Unit failed due to calibration error: {0}")]
    Calibration(#[from] CalibrationError),
    #[error("Unit failed due to results error: {0}")]
    Results(#[from] ResultsError),
    #[error("Unit failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum CollateError {
    #[error("Collation aborted: unit {path:?} has a column schema different from the first unit\nexpected: {expected:?}\nfound: {found:?}")]
    SchemaInconsistency {
        path: PathBuf,
        expected: Vec<String>,
        found: Vec<String>,
    },
    #[error("Collator failed due to CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("Collator failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}

/// Errors which abort an entire batch run.
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),
    #[error("Processor failed due to Collator error: {0}")]
    Collate(#[from] CollateError),
    #[error("Processor failed due to Send error: {0}")]
    SendError(#[from] std::sync::mpsc::SendError<BatchStatus>),
    #[error("Processor failed due to IO error: {0}")]
    IoError(#[from] std::io::Error),
}
