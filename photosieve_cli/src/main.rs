use clap::{value_parser, Arg, ArgMatches, Command};
use indicatif::{MultiProgress, ProgressBar};
use indicatif_log_bridge::LogWrapper;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Sender};
use std::time::Duration;

use libphotosieve::analysis::ScaleVector;
use libphotosieve::config::Config;
use libphotosieve::deblur::deblur_file;
use libphotosieve::error::{ConfigError, ProcessorError};
use libphotosieve::process::{
    analyze_units, calibrate_units, collate_units, make_photodirs, set_config_value, BatchReport,
};
use libphotosieve::undistort::BrownConradyCorrector;
use libphotosieve::unit_config::parse_scalar;
use libphotosieve::wavelet::WaveletAnalyzer;
use libphotosieve::worker_status::BatchStatus;

const DEFAULT_CONFIG_PATH: &str = "photosieve.yml";

fn make_template_config(path: &Path) -> Result<(), ConfigError> {
    Config::default().write_config_file(path)
}

/// `MIN,MAX,NOTES` as an octave-spaced scale vector
fn parse_octaves(text: &str) -> Result<ScaleVector, String> {
    let fields: Vec<&str> = text.split(',').map(|f| f.trim()).collect();
    if fields.len() != 3 {
        return Err(format!("expected MIN,MAX,NOTES, got '{text}'"));
    }
    let min: f64 = fields[0].parse().map_err(|e| format!("bad MIN: {e}"))?;
    let max: f64 = fields[1].parse().map_err(|e| format!("bad MAX: {e}"))?;
    let notes: u32 = fields[2].parse().map_err(|e| format!("bad NOTES: {e}"))?;
    ScaleVector::octaves(min, max, notes).map_err(|e| e.to_string())
}

/// Scales from the command line if given, otherwise from the batch configuration
fn select_scales(args: &ArgMatches, config: &Config) -> Result<ScaleVector, String> {
    if let Some(text) = args.get_one::<String>("scales") {
        text.parse::<ScaleVector>().map_err(|e| e.to_string())
    } else if let Some(text) = args.get_one::<String>("octaves") {
        parse_octaves(text)
    } else {
        config.scale_vector().map_err(|e| e.to_string())
    }
}

/// Run a batch driver on a worker thread, showing a spinner with the unit being processed
fn run_batch<F>(pb_manager: &MultiProgress, task: F)
where
    F: FnOnce(Sender<BatchStatus>) -> Result<BatchReport, ProcessorError> + Send + 'static,
{
    let spinner = pb_manager.add(ProgressBar::new_spinner());
    let (tx, rx) = channel::<BatchStatus>();
    let handle = std::thread::spawn(move || task(tx));

    loop {
        std::thread::sleep(Duration::from_millis(100));
        while let Ok(status) = rx.try_recv() {
            spinner.set_message(format!(
                "{} #{}: {}",
                status.stage,
                status.units_seen,
                status.unit.to_string_lossy()
            ));
        }
        spinner.tick();

        if handle.is_finished() {
            match handle.join() {
                Ok(result) => match result {
                    Ok(report) if report.failed.is_empty() => {
                        log::info!("Batch finished over {} unit(s).", report.n_units())
                    }
                    Ok(report) => {
                        log::warn!(
                            "Batch finished with {} failed unit(s); see the errors above.",
                            report.failed.len()
                        )
                    }
                    Err(e) => log::error!("Batch failed with error: {e}"),
                },
                Err(_) => log::error!("Failed to join batch task!"),
            }
            break;
        }
    }

    spinner.finish_and_clear();
}

fn main() {
    // Create a cli
    let matches = Command::new("photosieve_cli")
        .about("Grain-size analysis of sediment photographs")
        .arg_required_else_help(true)
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .global(true)
                .default_value(DEFAULT_CONFIG_PATH)
                .help("Path to the batch configuration file"),
        )
        .arg(
            Arg::new("root")
                .short('r')
                .long("root")
                .global(true)
                .help("Override the root_path of the configuration"),
        )
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .subcommand(
            Command::new("photodirs").about("Make a unit directory for every photo in the root"),
        )
        .subcommand(Command::new("calibrate").about("Correct lens distortion in every unit"))
        .subcommand(
            Command::new("analyze")
                .about("Estimate the grain-size distribution of every unit")
                .arg(
                    Arg::new("scales")
                        .long("scales")
                        .conflicts_with("octaves")
                        .help("Comma separated ascending scales in pixels"),
                )
                .arg(
                    Arg::new("octaves")
                        .long("octaves")
                        .help("MIN,MAX,NOTES: scales from MIN to MAX with NOTES per octave"),
                ),
        )
        .subcommand(
            Command::new("collate")
                .about("Combine the results of every unit into one table")
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .help("Override the output_path of the configuration"),
                ),
        )
        .subcommand(
            Command::new("set-key")
                .about("Set one key of every unit configuration")
                .arg(Arg::new("key").required(true))
                .arg(Arg::new("value").required(true)),
        )
        .subcommand(
            Command::new("deblur")
                .about("Tinted high-pass filter of a single image")
                .arg(Arg::new("image").required(true))
                .arg(Arg::new("output").required(true))
                .arg(
                    Arg::new("radius")
                        .long("radius")
                        .value_parser(value_parser!(f64))
                        .default_value("20"),
                )
                .arg(
                    Arg::new("tint")
                        .long("tint")
                        .value_parser(value_parser!(f64))
                        .default_value("1")
                        .help("0 keeps the input image, 1 gives the pure high-pass"),
                ),
        )
        .get_matches();

    // Initialize feedback
    let logger = simplelog::TermLogger::new(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );

    let pb_manager = MultiProgress::new();

    LogWrapper::new(pb_manager.clone(), logger)
        .try_init()
        .expect("Could not create logging/progress!");

    // Parse the cli
    let config_path = matches
        .get_one::<String>("path")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    match matches.subcommand() {
        Some(("new", _)) => {
            log::info!(
                "Making a template config at {}...",
                config_path.to_string_lossy()
            );
            match make_template_config(&config_path) {
                Ok(()) => log::info!("Done."),
                Err(e) => log::error!("{e}"),
            }
            return;
        }
        Some(("deblur", args)) => {
            let (Some(image), Some(output)) = (
                args.get_one::<String>("image"),
                args.get_one::<String>("output"),
            ) else {
                log::error!("deblur requires an IMAGE and an OUTPUT path");
                return;
            };
            let radius = args.get_one::<f64>("radius").copied().unwrap_or(20.0);
            let tint = args.get_one::<f64>("tint").copied().unwrap_or(1.0);
            log::info!("Filtering {image} with radius {radius} and tint {tint}...");
            match deblur_file(Path::new(image), Path::new(output), radius, tint) {
                Ok(()) => log::info!("Wrote {output}"),
                Err(e) => log::error!("{e}"),
            }
            return;
        }
        _ => (),
    }

    // Load our config
    log::info!("Loading config from {}...", config_path.to_string_lossy());
    let mut config = match Config::read_config_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };
    if let Some(root) = matches.get_one::<String>("root") {
        config.root_path = PathBuf::from(root);
    }
    log::info!("Config successfully loaded.");
    log::info!("Root Path: {}", config.root_path.to_string_lossy());
    log::info!("Image Extension: {}", config.image_extension);
    if !config.does_root_exist() {
        log::error!(
            "Root path {} is not a directory!",
            config.root_path.to_string_lossy()
        );
        return;
    }

    let root = config.root_path.clone();
    let extension = config.image_extension.clone();
    match matches.subcommand() {
        Some(("photodirs", _)) => {
            let template = config.unit_template_config();
            run_batch(&pb_manager, move |tx| {
                make_photodirs(&root, &extension, template.as_ref(), &tx)
            });
        }
        Some(("calibrate", _)) => {
            let allow_legacy = config.allow_legacy_calibration;
            if allow_legacy {
                log::warn!("Legacy calibration scripts are enabled.");
            }
            run_batch(&pb_manager, move |tx| {
                calibrate_units(&root, &BrownConradyCorrector, &extension, allow_legacy, &tx)
            });
        }
        Some(("analyze", args)) => {
            let scales = match select_scales(args, &config) {
                Ok(s) => s,
                Err(e) => {
                    log::error!("Invalid scales: {e}");
                    return;
                }
            };
            log::info!("Scales: {:?}", scales.as_slice());
            run_batch(&pb_manager, move |tx| {
                analyze_units(&root, &WaveletAnalyzer::new(), &scales, &extension, &tx)
            });
        }
        Some(("collate", args)) => {
            let output = args
                .get_one::<String>("output")
                .map(PathBuf::from)
                .unwrap_or_else(|| config.output_path.clone());
            log::info!("Output Path: {}", output.to_string_lossy());
            run_batch(&pb_manager, move |tx| collate_units(&root, &output, &tx));
        }
        Some(("set-key", args)) => {
            let (Some(key), Some(value)) = (
                args.get_one::<String>("key").cloned(),
                args.get_one::<String>("value"),
            ) else {
                log::error!("set-key requires a KEY and a VALUE");
                return;
            };
            let value = parse_scalar(value);
            log::info!("Setting {key} to {value:?} in every unit...");
            run_batch(&pb_manager, move |tx| set_config_value(&root, &key, value, &tx));
        }
        _ => log::error!("Unknown subcommand; see --help"),
    }

    log::info!("Done.");
}
