use std::path::{Path, PathBuf};

use super::constants::{CONFIG_FILE_NAME, PHOTO_DIR_PREFIX};
use super::error::UnitError;
use super::unit::has_extension;
use super::unit_config::UnitConfig;

/// Raw photos sitting directly inside target_dir, sorted by name
pub fn list_raw_images(target_dir: &Path, extension: &str) -> Result<Vec<PathBuf>, std::io::Error> {
    let mut images: Vec<PathBuf> = Vec::new();
    for item in target_dir.read_dir()? {
        let item_path = item?.path();
        if item_path.is_file() && has_extension(&item_path, extension) {
            images.push(item_path);
        }
    }
    images.sort();
    Ok(images)
}

/// `<dir>/DSC_0046.JPG` gets the unit directory `<dir>/image_DSC_0046`
pub fn photodir_path(image: &Path) -> PathBuf {
    let stem = image
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    image.with_file_name(format!("{PHOTO_DIR_PREFIX}{stem}"))
}

/// Create the unit directory for one photo and copy the photo into it.
///
/// Fails if the directory already exists, so earlier work is never overwritten.
/// Returns the new directory and the number of bytes copied.
pub fn make_photodir(
    image: &Path,
    template: Option<&UnitConfig>,
) -> Result<(PathBuf, u64), UnitError> {
    let dir = photodir_path(image);
    std::fs::create_dir(&dir)?;
    let file_name = image.file_name().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "image path has no file name")
    })?;
    let bytes = std::fs::copy(image, dir.join(file_name))?;
    if let Some(config) = template {
        config.write_file(&dir.join(CONFIG_FILE_NAME))?;
    }
    Ok((dir, bytes))
}
