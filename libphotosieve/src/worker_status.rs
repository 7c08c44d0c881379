use std::path::{Path, PathBuf};

/// The batch operation a status message belongs to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Stage {
    #[default]
    PhotoDirs,
    Calibrate,
    Analyze,
    Collate,
    SetKey,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::PhotoDirs => "photodirs",
            Stage::Calibrate => "calibrate",
            Stage::Analyze => "analyze",
            Stage::Collate => "collate",
            Stage::SetKey => "set-key",
        };
        write!(f, "{name}")
    }
}

/// Sent by a batch driver before it starts on each unit
#[derive(Debug, Clone, Default)]
pub struct BatchStatus {
    pub units_seen: usize,
    pub unit: PathBuf,
    pub stage: Stage,
}

impl BatchStatus {
    pub fn new(units_seen: usize, unit: &Path, stage: Stage) -> Self {
        Self {
            units_seen,
            unit: unit.to_path_buf(),
            stage,
        }
    }
}
