//! # photosieve
//!
//! photosieve estimates grain-size distributions of sediment from photographs, written in
//! Rust. It walks a tree of *unit* directories (one photo each), optionally corrects lens
//! distortion, runs a wavelet-based grain-size estimator on every unit, and collates the
//! per-unit results into a single table.
//!
//! ## Building & Install
//!
//! To build and install the CLI use `cargo install --path ./photosieve_cli` from the top
//! level photosieve repository. To use the CLI see `photosieve_cli --help`.
//!
//! ## Units
//!
//! A unit is any directory that contains exactly one `config.txt`. Directories with no
//! `config.txt` are ignored. A unit holds one photo (extension set by the batch
//! configuration, matched case-insensitively) and, after analysis, three result files:
//!
//! ```text
//! image_DSC_0046/
//! |---- config.txt        unit configuration (YAML mapping)
//! |---- DSC_0046.JPG      raw photo
//! |---- DSC_0046_c.JPG    distortion corrected photo (after calibrate)
//! |---- stats.txt         kurtosis, mean, skewness, sorting, time (YAML)
//! |---- percentiles.txt   percentiles,vals (CSV)
//! |---- gsd.txt           bins,freqs (CSV)
//! ```
//!
//! Calibration uses the raw photo and is skipped when a corrected photo already exists.
//! Analysis uses the corrected photo when there is one and the raw photo otherwise.
//! Either way exactly one candidate photo must be present, otherwise the unit is
//! reported and skipped.
//!
//! Corrected photos are recognised by name alone: a raw photo whose stem already ends in
//! `_c` (`IMG_c.jpg`) is taken for a corrected one, so the unit counts as calibrated and
//! has no raw photo to calibrate. Rename such photos before running `calibrate`.
//!
//! ## Unit configuration
//!
//! `config.txt` is a YAML mapping. Keys used by the built in analyzer:
//!
//! ```yml
//! density: 10                    # analyze every 10th pixel row
//! resolution: 1.0                # length units per pixel
//! dofilter: 1                    # remove a linear trend from each row
//! maxscale: 8                    # largest scale allowed is image width / maxscale
//! notes: 8                       # scales per octave of the scale set, recorded with the results
//! verbose: 0
//! calibration_file: calibration.yml
//! ```
//!
//! Any extra keys are carried along into the collated table.
//!
//! ## Batch configuration
//!
//! Batch operations read a YAML file (`photosieve_cli new -p photosieve.yml` writes a
//! template):
//!
//! ```yml
//! root_path: None
//! output_path: None
//! image_extension: jpg
//! scales: [2.0, 2.378, ...]
//! allow_legacy_calibration: false
//! unit_template: {density: 10, ...}
//! ```
//!
//! ### Calibration files
//!
//! Calibration files are YAML with a 3x3 `camera_matrix` and up to five Brown-Conrady
//! `distortion` coefficients (k1, k2, p1, p2, k3). Older calibration scripts (`.py`)
//! can be read by setting `allow_legacy_calibration: true`; only the literal `K` and `d`
//! arrays are parsed, nothing is executed.
//!
//! ## Output
//!
//! Collation writes one CSV with a header row and one data row per unit. Columns are the
//! identity fields `dir_base, dir_path, dir_oneup_base`, then the configuration keys,
//! the statistics keys, `p_<percentile>` and `b_<bin>`. Every unit must produce the same
//! columns in the same order; a unit that does not aborts collation and no file is
//! written.
pub mod analysis;
pub mod calibration;
pub mod collate;
pub mod config;
pub mod constants;
pub mod deblur;
pub mod error;
pub mod photodirs;
pub mod process;
pub mod results;
pub mod undistort;
pub mod unit;
pub mod unit_config;
pub mod wavelet;
pub mod worker_status;
