// Per-unit directory layout
pub const CONFIG_FILE_NAME: &str = "config.txt";
pub const STATS_FILE_NAME: &str = "stats.txt";
pub const PERCENTILES_FILE_NAME: &str = "percentiles.txt";
pub const GSD_FILE_NAME: &str = "gsd.txt";

pub const DEFAULT_IMAGE_EXTENSION: &str = "jpg";
/// Appended to the image stem for the distortion corrected copy
pub const CORRECTED_SUFFIX: &str = "_c";
/// Prefix of unit directories created from raw photos
pub const PHOTO_DIR_PREFIX: &str = "image_";

// Two-column table headers
pub const PERCENTILE_COLUMNS: [&str; 2] = ["percentiles", "vals"];
pub const GSD_COLUMNS: [&str; 2] = ["bins", "freqs"];

// Combined table columns
pub const IDENTITY_KEYS: [&str; 3] = ["dir_base", "dir_path", "dir_oneup_base"];
pub const PERCENTILE_PREFIX: &str = "p_";
pub const BIN_PREFIX: &str = "b_";

/// Cumulative fractions reported in the percentile table
pub const REPORTED_PERCENTILES: [f64; 10] =
    [0.05, 0.1, 0.16, 0.25, 0.3, 0.5, 0.75, 0.84, 0.9, 0.95];

// Required unit configuration keys
pub const KEY_DENSITY: &str = "density";
pub const KEY_RESOLUTION: &str = "resolution";
pub const KEY_DOFILTER: &str = "dofilter";
pub const KEY_MAXSCALE: &str = "maxscale";
pub const KEY_NOTES: &str = "notes";
pub const KEY_VERBOSE: &str = "verbose";
pub const KEY_CALIBRATION_FILE: &str = "calibration_file";
