use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::constants::{
    CONFIG_FILE_NAME, CORRECTED_SUFFIX, GSD_FILE_NAME, PERCENTILES_FILE_NAME, STATS_FILE_NAME,
};
use super::error::{DiscoveryError, UnitError};

/// Which images of a unit an operation is allowed to pick from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRole {
    /// Raw (not yet corrected) images only
    Calibration,
    /// Corrected images if any exist, raw images otherwise
    Analysis,
}

/// A ProcessingUnit is a directory holding one photograph and its configuration.
///
/// Units have no explicit construction step; they are found by walking a tree with
/// [`discover_units`]. The identity of a unit is its path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingUnit {
    path: PathBuf,
}

impl ProcessingUnit {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Basename of the unit directory
    pub fn directory_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Basename of the directory one level up, empty at the filesystem root
    pub fn parent_directory_name(&self) -> String {
        self.path
            .parent()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn config_path(&self) -> PathBuf {
        self.path.join(CONFIG_FILE_NAME)
    }

    pub fn stats_path(&self) -> PathBuf {
        self.path.join(STATS_FILE_NAME)
    }

    pub fn percentiles_path(&self) -> PathBuf {
        self.path.join(PERCENTILES_FILE_NAME)
    }

    pub fn gsd_path(&self) -> PathBuf {
        self.path.join(GSD_FILE_NAME)
    }

    /// All image files directly inside the unit, sorted by name
    pub fn image_files(&self, extension: &str) -> Result<Vec<PathBuf>, std::io::Error> {
        let mut images: Vec<PathBuf> = Vec::new();
        for item in self.path.read_dir()? {
            let item_path = item?.path();
            if item_path.is_file() && has_extension(&item_path, extension) {
                images.push(item_path);
            }
        }
        images.sort();
        Ok(images)
    }

    /// A unit is calibrated once it holds a distortion corrected image
    pub fn is_calibrated(&self, extension: &str) -> Result<bool, std::io::Error> {
        Ok(self
            .image_files(extension)?
            .iter()
            .any(|p| is_corrected_image(p)))
    }

    /// Pick the single image an operation should run on.
    ///
    /// Zero or several candidates violate the unit precondition and yield
    /// `UnitError::ImageCount`.
    pub fn select_image(&self, role: ImageRole, extension: &str) -> Result<PathBuf, UnitError> {
        let (corrected, raw): (Vec<PathBuf>, Vec<PathBuf>) = self
            .image_files(extension)?
            .into_iter()
            .partition(|p| is_corrected_image(p));

        let mut candidates = match role {
            ImageRole::Calibration => raw,
            ImageRole::Analysis if !corrected.is_empty() => corrected,
            ImageRole::Analysis => raw,
        };

        if candidates.len() == 1 {
            Ok(candidates.remove(0))
        } else {
            Err(UnitError::ImageCount {
                path: self.path.clone(),
                found: candidates.len(),
            })
        }
    }
}

/// Case-insensitive extension test
pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

/// True if the file stem carries the corrected-image suffix.
///
/// Only the name is checked, so a raw photo whose stem already ends in `_c`
/// (`IMG_c.jpg`) is taken for a corrected image.
pub fn is_corrected_image(path: &Path) -> bool {
    path.file_stem()
        .map(|s| s.to_string_lossy().ends_with(CORRECTED_SUFFIX))
        .unwrap_or(false)
}

fn count_marker_files(dir: &Path) -> Result<usize, std::io::Error> {
    let mut count = 0;
    for item in dir.read_dir()? {
        let item = item?;
        if item.file_name() == CONFIG_FILE_NAME && item.path().is_file() {
            count += 1;
        }
    }
    Ok(count)
}

/// Lazy depth-first walk yielding every directory that holds exactly one marker file.
///
/// Unreadable entries are logged and skipped. The walker cannot be restarted;
/// call [`discover_units`] again to re-walk the filesystem.
pub struct UnitWalker {
    walker: walkdir::IntoIter,
}

impl Iterator for UnitWalker {
    type Item = ProcessingUnit;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.walker.next()? {
                Ok(entry) => {
                    if !entry.file_type().is_dir() {
                        continue;
                    }
                    match count_marker_files(entry.path()) {
                        Ok(1) => return Some(ProcessingUnit::new(entry.path())),
                        Ok(_) => continue,
                        Err(e) => {
                            log::warn!("Could not list directory {}: {e}", entry.path().display())
                        }
                    }
                }
                Err(e) => log::warn!("Skipping unreadable entry during discovery: {e}"),
            }
        }
    }
}

/// Begin walking the tree under root. The root is canonicalized so that units carry absolute paths.
pub fn discover_units(root: &Path) -> Result<UnitWalker, DiscoveryError> {
    if !root.is_dir() {
        return Err(DiscoveryError::BadRootPath(root.to_path_buf()));
    }
    let root = std::fs::canonicalize(root)?;
    Ok(UnitWalker {
        walker: WalkDir::new(root).sort_by_file_name().into_iter(),
    })
}
