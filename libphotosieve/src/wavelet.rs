//! Built-in grain-size estimator.
//!
//! A spectral approach in the spirit of digital grain sizing: the mean Morlet wavelet
//! power of sampled image rows is evaluated at each scale hypothesis, and the resulting
//! spectrum is treated as the frequency distribution of grain sizes
//! (`grain size = scale × resolution`).
//!
//! The estimator reads `density`, `resolution`, `dofilter` and `maxscale`. The `notes`
//! key is only recorded with the results, since the scales come from the `ScaleVector`.
use ndarray::Array2;
use std::path::Path;

use super::analysis::{AnalysisParams, GrainSizeAnalyzer, GrainSizeDistribution, ScaleVector};
use super::constants::REPORTED_PERCENTILES;
use super::error::AnalysisError;

/// Morlet centre frequency
const OMEGA0: f64 = 6.0;
/// Kernel support on each side, in units of the scale
const KERNEL_HALF_WIDTH: f64 = 4.0;
/// Rows are box-decimated so the kernel scale spans at least this many samples
const TARGET_SCALE_SAMPLES: f64 = 4.0;
const MIN_IMAGE_WIDTH: usize = 8;

#[derive(Debug, Clone, Copy, Default)]
pub struct WaveletAnalyzer;

impl WaveletAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl GrainSizeAnalyzer for WaveletAnalyzer {
    fn analyze(
        &self,
        image: &Path,
        params: &AnalysisParams,
        scales: &ScaleVector,
    ) -> Result<GrainSizeDistribution, AnalysisError> {
        let gray = load_grayscale(image)?;
        let (height, width) = gray.dim();
        if width < MIN_IMAGE_WIDTH || height == 0 {
            return Err(AnalysisError::ImageTooSmall {
                path: image.to_path_buf(),
                width: width as u32,
                height: height as u32,
            });
        }

        let max_scale = width as f64 / params.maxscale;
        let usable: Vec<f64> = scales
            .as_slice()
            .iter()
            .copied()
            .filter(|&s| s <= max_scale)
            .collect();
        if usable.is_empty() {
            return Err(AnalysisError::NoUsableScales(max_scale));
        }

        let rows: Vec<Vec<f64>> = (0..height)
            .step_by(params.density as usize)
            .map(|r| {
                let mut row: Vec<f64> = gray.row(r).iter().map(|&v| v as f64).collect();
                if params.dofilter {
                    remove_linear_trend(&mut row);
                } else {
                    remove_mean(&mut row);
                }
                row
            })
            .collect();

        if params.verbose {
            log::info!(
                "Analyzing {} ({}x{}) with {} rows and {} scales",
                image.display(),
                width,
                height,
                rows.len(),
                usable.len()
            );
        }

        let mut power: Vec<f64> = Vec::with_capacity(usable.len());
        for &scale in usable.iter() {
            let total: f64 = rows.iter().map(|row| mean_wavelet_power(row, scale)).sum();
            let scale_power = total / rows.len() as f64;
            if params.verbose {
                log::info!("Scale {scale:.3} px -> power {scale_power:.6e}");
            }
            power.push(scale_power);
        }

        let bins: Vec<f64> = usable.iter().map(|s| s * params.resolution).collect();
        GrainSizeDistribution::from_histogram(bins, &power, &REPORTED_PERCENTILES)
            .ok_or(AnalysisError::EmptySpectrum)
    }
}

/// Load an image from disk as a (rows, cols) luminance matrix
fn load_grayscale(path: &Path) -> Result<Array2<f32>, AnalysisError> {
    let img = image::open(path)?.into_luma8();
    let (width, height) = img.dimensions();
    Ok(Array2::from_shape_fn(
        (height as usize, width as usize),
        |(r, c)| img.get_pixel(c as u32, r as u32)[0] as f32,
    ))
}

fn remove_mean(row: &mut [f64]) {
    let mean = row.iter().sum::<f64>() / row.len() as f64;
    row.iter_mut().for_each(|v| *v -= mean);
}

/// Least-squares line removal, flattening illumination gradients along the row
fn remove_linear_trend(row: &mut [f64]) {
    let n = row.len() as f64;
    let x_mean = (n - 1.0) / 2.0;
    let y_mean = row.iter().sum::<f64>() / n;
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (i, &y) in row.iter().enumerate() {
        let dx = i as f64 - x_mean;
        sxy += dx * (y - y_mean);
        sxx += dx * dx;
    }
    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
    for (i, v) in row.iter_mut().enumerate() {
        *v -= y_mean + slope * (i as f64 - x_mean);
    }
}

/// Mean Morlet power of a row at one scale, rectified by the scale.
///
/// Returns 0 if the row is shorter than the kernel.
fn mean_wavelet_power(row: &[f64], scale: f64) -> f64 {
    let step = ((scale / TARGET_SCALE_SAMPLES).floor() as usize).max(1);
    let decimated: Vec<f64> = row
        .chunks(step)
        .map(|c| c.iter().sum::<f64>() / c.len() as f64)
        .collect();
    let s = scale / step as f64;

    let half = (KERNEL_HALF_WIDTH * s).ceil() as isize;
    let mut kernel: Vec<(f64, f64)> = (-half..=half)
        .map(|k| {
            let t = k as f64 / s;
            let envelope = (-0.5 * t * t).exp();
            (envelope * (OMEGA0 * t).cos(), envelope * (OMEGA0 * t).sin())
        })
        .collect();
    let energy: f64 = kernel.iter().map(|(re, im)| re * re + im * im).sum();
    let norm = energy.sqrt();
    kernel
        .iter_mut()
        .for_each(|(re, im)| {
            *re /= norm;
            *im /= norm;
        });

    if decimated.len() < kernel.len() {
        return 0.0;
    }
    let n_positions = decimated.len() - kernel.len() + 1;
    let mut total = 0.0;
    for start in 0..n_positions {
        let mut re = 0.0;
        let mut im = 0.0;
        for (x, (k_re, k_im)) in decimated[start..start + kernel.len()].iter().zip(&kernel) {
            re += x * k_re;
            im += x * k_im;
        }
        total += re * re + im * im;
    }
    total / n_positions as f64 / scale
}
