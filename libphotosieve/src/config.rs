use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};

use super::analysis::ScaleVector;
use super::constants::{
    DEFAULT_IMAGE_EXTENSION, KEY_CALIBRATION_FILE, KEY_DENSITY, KEY_DOFILTER, KEY_MAXSCALE,
    KEY_NOTES, KEY_RESOLUTION, KEY_VERBOSE,
};
use super::error::ConfigError;
use super::unit_config::UnitConfig;

/// Structure representing the batch configuration. Contains pathing and analysis settings.
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Tree walked for processing units
    pub root_path: PathBuf,
    /// Destination of the combined table
    pub output_path: PathBuf,
    pub image_extension: String,
    /// Scale hypotheses in pixels, strictly ascending
    pub scales: Vec<f64>,
    /// Permit reading literal arrays out of legacy `.py` calibration scripts
    pub allow_legacy_calibration: bool,
    /// Written as config.txt into every new photo directory
    pub unit_template: Option<Mapping>,
}

impl Default for Config {
    /// Generate a new Config object. Paths will be empty/invalid
    fn default() -> Self {
        // Two to 128 pixels, four scales per octave
        let scales = (0..=24)
            .map(|i| 2.0 * 2f64.powf(i as f64 / 4.0))
            .collect();

        let mut template = Mapping::new();
        template.insert(Value::from(KEY_DENSITY), Value::from(10));
        template.insert(Value::from(KEY_RESOLUTION), Value::from(1.0));
        template.insert(Value::from(KEY_DOFILTER), Value::from(1));
        template.insert(Value::from(KEY_MAXSCALE), Value::from(8));
        template.insert(Value::from(KEY_NOTES), Value::from(8));
        template.insert(Value::from(KEY_VERBOSE), Value::from(0));
        template.insert(Value::from(KEY_CALIBRATION_FILE), Value::from("calibration.yml"));

        Self {
            root_path: PathBuf::from("None"),
            output_path: PathBuf::from("None"),
            image_extension: String::from(DEFAULT_IMAGE_EXTENSION),
            scales,
            allow_legacy_calibration: false,
            unit_template: Some(template),
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Write the configuration to a YAML file
    pub fn write_config_file(&self, config_path: &Path) -> Result<(), ConfigError> {
        let yaml_str = serde_yaml::to_string(self)?;
        std::fs::write(config_path, yaml_str)?;
        Ok(())
    }

    /// Validated scale vector
    pub fn scale_vector(&self) -> Result<ScaleVector, ConfigError> {
        Ok(ScaleVector::try_from(self.scales.clone())?)
    }

    pub fn does_root_exist(&self) -> bool {
        self.root_path.is_dir()
    }

    pub fn unit_template_config(&self) -> Option<UnitConfig> {
        self.unit_template.clone().map(UnitConfig::from_mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("photosieve.yml");
        let config = Config::default();
        config.write_config_file(&path).unwrap();
        let read_back = Config::read_config_file(&path).unwrap();
        assert_eq!(read_back, config);
        assert_eq!(read_back.scale_vector().unwrap().len(), 25);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            Config::read_config_file(&dir.path().join("nope.yml")),
            Err(ConfigError::BadFilePath(_))
        ));
    }

    #[test]
    fn test_bad_scales() {
        let config = Config {
            scales: vec![4.0, 2.0],
            ..Default::default()
        };
        assert!(matches!(
            config.scale_vector(),
            Err(ConfigError::BadScales(_))
        ));
    }

    #[test]
    fn test_template_has_analysis_keys() {
        let template = Config::default().unit_template_config().unwrap();
        assert_eq!(template.get_u32(KEY_DENSITY).unwrap(), 10);
        assert_eq!(template.keys().len(), 7);
    }
}
