use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;

use libphotosieve::analysis::{AnalysisParams, GrainSizeAnalyzer, GrainSizeDistribution, ScaleVector};
use libphotosieve::error::{AnalysisError, CollateError, ProcessorError};
use libphotosieve::process::{analyze_unit, analyze_units, collate_units, set_config_value};
use libphotosieve::unit::{discover_units, ProcessingUnit};
use libphotosieve::worker_status::BatchStatus;
use serde_yaml::Value;
use tempfile::tempdir;

const UNIT_CONFIG: &str =
    "density: 10\nresolution: 0.5\ndofilter: 1\nmaxscale: 8\nnotes: 4\nverbose: 0\n";

/// Returns a fixed distribution with n_percentiles percentiles and counts its calls
struct FixedAnalyzer {
    n_percentiles: usize,
    calls: Cell<usize>,
}

impl FixedAnalyzer {
    fn new(n_percentiles: usize) -> Self {
        Self {
            n_percentiles,
            calls: Cell::new(0),
        }
    }
}

impl GrainSizeAnalyzer for FixedAnalyzer {
    fn analyze(
        &self,
        _image: &Path,
        params: &AnalysisParams,
        scales: &ScaleVector,
    ) -> Result<GrainSizeDistribution, AnalysisError> {
        self.calls.set(self.calls.get() + 1);
        let percentiles: Vec<f64> = (1..=self.n_percentiles)
            .map(|i| i as f64 / (self.n_percentiles + 1) as f64)
            .collect();
        let bins: Vec<f64> = scales
            .as_slice()
            .iter()
            .map(|s| s * params.resolution)
            .collect();
        let n_bins = bins.len() as f64;
        Ok(GrainSizeDistribution {
            mean: 2.0,
            sorting: 0.5,
            skewness: 0.1,
            kurtosis: 3.0,
            percentile_values: percentiles.iter().map(|p| p * 4.0).collect(),
            percentiles,
            frequencies: vec![1.0 / n_bins; bins.len()],
            bins,
        })
    }
}

fn make_unit(root: &Path, name: &str, config: &str, images: &[&str]) -> PathBuf {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("config.txt"), config).unwrap();
    for image in images {
        fs::write(dir.join(image), b"not really a jpeg").unwrap();
    }
    dir
}

fn scales() -> ScaleVector {
    ScaleVector::try_from(vec![2.0, 4.0, 8.0]).unwrap()
}

fn discovered_names(root: &Path) -> Vec<String> {
    discover_units(root)
        .unwrap()
        .map(|unit| unit.directory_name())
        .collect()
}

#[test]
fn test_discovery_yields_only_marked_directories() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    make_unit(root, "site_a/image_1", UNIT_CONFIG, &[]);
    make_unit(root, "site_a/image_2", UNIT_CONFIG, &[]);
    fs::create_dir_all(root.join("site_b/empty")).unwrap();
    fs::write(root.join("site_b/notes.txt"), "not a marker").unwrap();
    // A directory named like the marker is not a marker
    fs::create_dir_all(root.join("site_c/config.txt")).unwrap();

    assert_eq!(discovered_names(root), vec!["image_1", "image_2"]);
}

#[test]
fn test_image_count_precondition() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    make_unit(root, "none", UNIT_CONFIG, &[]);
    make_unit(root, "one", UNIT_CONFIG, &["photo.jpg"]);
    make_unit(root, "two", UNIT_CONFIG, &["a.jpg", "b.JPG"]);
    let analyzer = FixedAnalyzer::new(3);
    let (tx, _rx) = channel::<BatchStatus>();

    let report = analyze_units(root, &analyzer, &scales(), "jpg", &tx).unwrap();

    assert_eq!(analyzer.calls.get(), 1);
    assert_eq!(report.completed.len(), 1);
    assert_eq!(report.failed.len(), 2);
    assert!(report.completed[0].ends_with("one"));
    assert!(!root.join("none").join("stats.txt").exists());
    assert!(!root.join("two").join("stats.txt").exists());
}

#[test]
fn test_collate_three_units() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    for name in ["u1", "u2", "u3"] {
        make_unit(root, &format!("beach/{name}"), UNIT_CONFIG, &["photo.jpg"]);
    }
    let analyzer = FixedAnalyzer::new(3);
    let (tx, _rx) = channel::<BatchStatus>();
    analyze_units(root, &analyzer, &scales(), "jpg", &tx).unwrap();

    let output = dir.path().join("combined.csv");
    let report = collate_units(root, &output, &tx).unwrap();
    assert_eq!(report.completed.len(), 3);

    let mut reader = csv::Reader::from_path(&output).unwrap();
    let header: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
    assert_eq!(
        header,
        vec![
            "dir_base",
            "dir_path",
            "dir_oneup_base",
            "density",
            "resolution",
            "dofilter",
            "maxscale",
            "notes",
            "verbose",
            "kurtosis",
            "mean",
            "skewness",
            "sorting",
            "time",
            "p_0.25",
            "p_0.5",
            "p_0.75",
            "b_1",
            "b_2",
            "b_4",
        ]
    );
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 3);
    let mut names: Vec<&str> = rows.iter().map(|r| &r[0]).collect();
    names.sort();
    assert_eq!(names, vec!["u1", "u2", "u3"]);
    assert!(rows.iter().all(|r| &r[2] == "beach"));
    assert!(rows.iter().all(|r| Path::new(&r[1]).is_absolute()));
}

#[test]
fn test_schema_break_aborts_without_output() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    make_unit(root, "a", UNIT_CONFIG, &["photo.jpg"]);
    make_unit(root, "b", UNIT_CONFIG, &["photo.jpg"]);
    let odd = make_unit(root, "c", UNIT_CONFIG, &["photo.jpg"]);
    let (tx, _rx) = channel::<BatchStatus>();
    analyze_units(root, &FixedAnalyzer::new(3), &scales(), "jpg", &tx).unwrap();
    // One unit ends up with a different number of percentiles
    analyze_unit(&ProcessingUnit::new(&odd), &FixedAnalyzer::new(4), &scales(), "jpg").unwrap();

    let output = dir.path().join("combined.csv");
    match collate_units(root, &output, &tx) {
        Err(ProcessorError::Collate(CollateError::SchemaInconsistency {
            path,
            expected,
            found,
        })) => {
            assert!(path.ends_with("c"));
            assert_eq!(found.len(), expected.len() + 1);
        }
        other => panic!("expected a schema inconsistency, got {other:?}"),
    }
    assert!(!output.exists());
}

#[test]
fn test_units_without_results_are_skipped_by_collation() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    make_unit(root, "a", UNIT_CONFIG, &["photo.jpg"]);
    make_unit(root, "b", UNIT_CONFIG, &["photo.jpg"]);
    let (tx, _rx) = channel::<BatchStatus>();
    analyze_unit(
        &ProcessingUnit::new(&root.join("a")),
        &FixedAnalyzer::new(3),
        &scales(),
        "jpg",
    )
    .unwrap();

    let output = dir.path().join("combined.csv");
    let report = collate_units(root, &output, &tx).unwrap();
    assert_eq!(report.completed.len(), 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(csv::Reader::from_path(&output).unwrap().records().count(), 1);
}

#[test]
fn test_nothing_to_collate_writes_nothing() {
    let dir = tempdir().unwrap();
    make_unit(dir.path(), "a", UNIT_CONFIG, &["photo.jpg"]);
    let (tx, _rx) = channel::<BatchStatus>();
    let output = dir.path().join("combined.csv");
    let report = collate_units(dir.path(), &output, &tx).unwrap();
    assert!(report.completed.is_empty());
    assert!(!output.exists());
}

#[test]
fn test_broken_unit_does_not_stop_the_batch() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    make_unit(root, "u1", UNIT_CONFIG, &["photo.jpg"]);
    make_unit(root, "u2", "density: [10\n", &["photo.jpg"]);
    make_unit(root, "u3", UNIT_CONFIG, &["photo.jpg"]);
    make_unit(root, "u4", UNIT_CONFIG, &["photo.jpg"]);
    let (tx, rx) = channel::<BatchStatus>();

    let report = analyze_units(root, &FixedAnalyzer::new(3), &scales(), "jpg", &tx).unwrap();

    assert_eq!(report.completed.len(), 3);
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].0.ends_with("u2"));
    for name in ["u1", "u3", "u4"] {
        assert!(root.join(name).join("stats.txt").is_file());
    }
    let seen: Vec<usize> = rx.try_iter().map(|s| s.units_seen).collect();
    assert_eq!(seen, vec![1, 2, 3, 4]);
}

#[test]
fn test_rerun_overwrites_results() {
    let dir = tempdir().unwrap();
    let unit = ProcessingUnit::new(&make_unit(dir.path(), "a", UNIT_CONFIG, &["photo.jpg"]));
    let analyzer = FixedAnalyzer::new(3);

    analyze_unit(&unit, &analyzer, &scales(), "jpg").unwrap();
    let first: Vec<String> = [unit.percentiles_path(), unit.gsd_path()]
        .iter()
        .map(|p| fs::read_to_string(p).unwrap())
        .collect();
    let first_stats = fs::read_to_string(unit.stats_path()).unwrap();

    analyze_unit(&unit, &analyzer, &scales(), "jpg").unwrap();
    let second: Vec<String> = [unit.percentiles_path(), unit.gsd_path()]
        .iter()
        .map(|p| fs::read_to_string(p).unwrap())
        .collect();
    let second_stats = fs::read_to_string(unit.stats_path()).unwrap();

    assert_eq!(first, second);
    let without_time = |s: &str| -> Vec<String> {
        s.lines()
            .filter(|l| !l.starts_with("time"))
            .map(String::from)
            .collect()
    };
    assert_eq!(without_time(&first_stats), without_time(&second_stats));
    assert_eq!(first[0].lines().count(), 4);
}

#[test]
fn test_set_key_then_collate() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    make_unit(root, "a", UNIT_CONFIG, &["photo.jpg"]);
    make_unit(root, "b", UNIT_CONFIG, &["photo.jpg"]);
    let (tx, _rx) = channel::<BatchStatus>();

    set_config_value(root, "site", Value::from("north beach"), &tx).unwrap();
    analyze_units(root, &FixedAnalyzer::new(3), &scales(), "jpg", &tx).unwrap();
    let output = dir.path().join("combined.csv");
    collate_units(root, &output, &tx).unwrap();

    let mut reader = csv::Reader::from_path(&output).unwrap();
    let header = reader.headers().unwrap().clone();
    let site = header.iter().position(|h| h == "site").unwrap();
    assert_eq!(site, 9);
    for record in reader.records() {
        assert_eq!(&record.unwrap()[site], "north beach");
    }
}

/// Fails on any image whose path contains `fail_on`, otherwise behaves like FixedAnalyzer
struct SelectiveAnalyzer {
    fail_on: &'static str,
    inner: FixedAnalyzer,
}

impl GrainSizeAnalyzer for SelectiveAnalyzer {
    fn analyze(
        &self,
        image: &Path,
        params: &AnalysisParams,
        scales: &ScaleVector,
    ) -> Result<GrainSizeDistribution, AnalysisError> {
        if image.to_string_lossy().contains(self.fail_on) {
            return Err(AnalysisError::NoUsableScales(0.0));
        }
        self.inner.analyze(image, params, scales)
    }
}

#[test]
fn test_analysis_failure_does_not_stop_the_batch() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    make_unit(root, "u1", UNIT_CONFIG, &["photo.jpg"]);
    make_unit(root, "u2", UNIT_CONFIG, &["blurry.jpg"]);
    make_unit(root, "u3", UNIT_CONFIG, &["photo.jpg"]);
    let analyzer = SelectiveAnalyzer {
        fail_on: "blurry",
        inner: FixedAnalyzer::new(3),
    };
    let (tx, rx) = channel::<BatchStatus>();

    let report = analyze_units(root, &analyzer, &scales(), "jpg", &tx).unwrap();

    assert_eq!(analyzer.inner.calls.get(), 2);
    assert_eq!(report.completed.len(), 2);
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].0.ends_with("u2"));
    assert!(root.join("u1").join("stats.txt").is_file());
    assert!(root.join("u3").join("stats.txt").is_file());
    assert!(!root.join("u2").join("stats.txt").exists());
    assert_eq!(rx.try_iter().count(), 3);

    // Collation still runs over the units that produced results
    let output = dir.path().join("combined.csv");
    let report = collate_units(root, &output, &tx).unwrap();
    assert_eq!(report.completed.len(), 2);
    assert_eq!(csv::Reader::from_path(&output).unwrap().records().count(), 2);
}
