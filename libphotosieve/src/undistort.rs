use image::{Rgb, RgbImage};
use std::path::{Path, PathBuf};

use super::calibration::CalibrationParams;
use super::constants::CORRECTED_SUFFIX;
use super::error::CalibrationError;

/// Round-off allowance when testing whether a projected sample is in frame
const EDGE_TOLERANCE: f64 = 1e-6;

/// Something that can write a distortion corrected copy of an image.
///
/// Returns the path of the corrected image, which sits next to the input.
pub trait DistortionCorrector {
    fn correct(&self, image: &Path, params: &CalibrationParams)
        -> Result<PathBuf, CalibrationError>;
}

/// Undistorts with the Brown-Conrady radial + tangential model.
///
/// Every output pixel is projected through the distortion model and bilinearly sampled
/// from the input. The output keeps the input camera matrix, so the image is not
/// rescaled; samples that land outside the input frame are black.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrownConradyCorrector;

impl DistortionCorrector for BrownConradyCorrector {
    fn correct(
        &self,
        image: &Path,
        params: &CalibrationParams,
    ) -> Result<PathBuf, CalibrationError> {
        let out_path = corrected_image_path(image)?;
        let src = image::open(image)?.to_rgb8();
        let corrected = undistort_image(&src, params);
        corrected.save(&out_path)?;
        Ok(out_path)
    }
}

/// Correct one image with the default corrector
pub fn correct_distortion(
    image: &Path,
    params: &CalibrationParams,
) -> Result<PathBuf, CalibrationError> {
    BrownConradyCorrector.correct(image, params)
}

/// `<dir>/<stem>.<ext>` becomes `<dir>/<stem>_c.<ext>`
pub fn corrected_image_path(image: &Path) -> Result<PathBuf, CalibrationError> {
    let stem = image
        .file_stem()
        .ok_or_else(|| CalibrationError::BadImageName(image.to_path_buf()))?
        .to_string_lossy();
    let name = match image.extension() {
        Some(ext) => format!("{stem}{CORRECTED_SUFFIX}.{}", ext.to_string_lossy()),
        None => format!("{stem}{CORRECTED_SUFFIX}"),
    };
    Ok(image.with_file_name(name))
}

pub fn undistort_image(src: &RgbImage, params: &CalibrationParams) -> RgbImage {
    let (fx, fy, cx, cy) = (params.fx(), params.fy(), params.cx(), params.cy());
    RgbImage::from_fn(src.width(), src.height(), |u, v| {
        let x = (u as f64 - cx) / fx;
        let y = (v as f64 - cy) / fy;
        let (x_d, y_d) = params.distort_normalized(x, y);
        sample_bilinear(src, fx * x_d + cx, fy * y_d + cy)
    })
}

fn sample_bilinear(src: &RgbImage, x: f64, y: f64) -> Rgb<u8> {
    let max_x = (src.width() - 1) as f64;
    let max_y = (src.height() - 1) as f64;
    let inside = x >= -EDGE_TOLERANCE
        && y >= -EDGE_TOLERANCE
        && x <= max_x + EDGE_TOLERANCE
        && y <= max_y + EDGE_TOLERANCE;
    if !inside {
        return Rgb([0, 0, 0]);
    }
    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);
    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(src.width() - 1);
    let y1 = (y0 + 1).min(src.height() - 1);
    let tx = x - x0 as f64;
    let ty = y - y0 as f64;

    let p00 = src.get_pixel(x0, y0);
    let p10 = src.get_pixel(x1, y0);
    let p01 = src.get_pixel(x0, y1);
    let p11 = src.get_pixel(x1, y1);
    let mut out = [0u8; 3];
    for (c, value) in out.iter_mut().enumerate() {
        let top = p00[c] as f64 * (1.0 - tx) + p10[c] as f64 * tx;
        let bottom = p01[c] as f64 * (1.0 - tx) + p11[c] as f64 * tx;
        *value = (top * (1.0 - ty) + bottom * ty).round().clamp(0.0, 255.0) as u8;
    }
    Rgb(out)
}
