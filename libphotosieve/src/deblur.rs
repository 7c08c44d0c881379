//! Tinted high-pass filtering to accentuate grain edges before analysis.
//!
//! The local mean is taken over a circular neighbourhood and subtracted from the frame;
//! the tint then blends the high-pass result over the original frame.
use image::{Rgb, RgbImage};
use ndarray::Array2;
use std::path::Path;

use super::error::DeblurError;

/// Filter an image file and write the result to output
pub fn deblur_file(input: &Path, output: &Path, radius: f64, tint: f64) -> Result<(), DeblurError> {
    let frame = image::open(input)?.to_rgb8();
    let filtered = tinted_highpass(&frame, radius, tint)?;
    filtered.save(output)?;
    Ok(())
}

/// Tinted high-pass filter.
///
/// `tint = 0` returns the input frame, `tint = 1` returns the pure high-pass
/// (frame minus circular local mean, clamped at zero).
pub fn tinted_highpass(frame: &RgbImage, radius: f64, tint: f64) -> Result<RgbImage, DeblurError> {
    if !(radius.is_finite() && radius > 0.0) {
        return Err(DeblurError::BadRadius(radius));
    }
    if !(0.0..=1.0).contains(&tint) {
        return Err(DeblurError::BadTint(tint));
    }

    let half_widths = circular_half_widths(radius);
    let (width, height) = frame.dimensions();
    let mut averages: Vec<Array2<f64>> = Vec::with_capacity(3);
    for channel in 0..3 {
        let plane = Array2::from_shape_fn((height as usize, width as usize), |(r, c)| {
            frame.get_pixel(c as u32, r as u32)[channel] as f64
        });
        averages.push(circular_mean(&plane, &half_widths));
    }

    Ok(RgbImage::from_fn(width, height, |x, y| {
        let source = frame.get_pixel(x, y);
        let mut out = [0u8; 3];
        for (channel, value) in out.iter_mut().enumerate() {
            let original = source[channel] as f64;
            let highpass = (original - averages[channel][[y as usize, x as usize]]).clamp(0.0, 255.0);
            *value = (tint * highpass + (1.0 - tint) * original)
                .round()
                .clamp(0.0, 255.0) as u8;
        }
        Rgb(out)
    }))
}

/// Horizontal half-width of the circular kernel for each row offset, from -center to +center.
///
/// The kernel dimension is twice the radius, forced odd.
fn circular_half_widths(radius: f64) -> Vec<(isize, isize)> {
    let mut dim = (radius * 2.0) as isize;
    if dim % 2 == 0 {
        dim += 1;
    }
    let center = dim / 2;
    (-center..=center)
        .filter_map(|dy| {
            let remaining = radius * radius - (dy * dy) as f64;
            if remaining < 0.0 {
                None
            } else {
                Some((dy, (remaining.sqrt().floor() as isize).min(center)))
            }
        })
        .collect()
}

/// Mean over the circular neighbourhood of every pixel, using only samples inside the frame
fn circular_mean(plane: &Array2<f64>, half_widths: &[(isize, isize)]) -> Array2<f64> {
    let (rows, cols) = plane.dim();
    let mut prefix = Array2::<f64>::zeros((rows, cols + 1));
    for r in 0..rows {
        for c in 0..cols {
            prefix[[r, c + 1]] = prefix[[r, c]] + plane[[r, c]];
        }
    }

    Array2::from_shape_fn((rows, cols), |(r, c)| {
        let mut total = 0.0;
        let mut count = 0.0;
        for &(dy, half) in half_widths {
            let row = r as isize + dy;
            if row < 0 || row >= rows as isize {
                continue;
            }
            let start = (c as isize - half).max(0) as usize;
            let end = ((c as isize + half) as usize).min(cols - 1);
            total += prefix[[row as usize, end + 1]] - prefix[[row as usize, start]];
            count += (end + 1 - start) as f64;
        }
        total / count
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn checkerboard() -> RgbImage {
        RgbImage::from_fn(16, 12, |x, y| {
            if (x / 2 + y / 2) % 2 == 0 {
                Rgb([200, 180, 160])
            } else {
                Rgb([40, 60, 80])
            }
        })
    }

    #[test]
    fn test_zero_tint_is_identity() {
        let frame = checkerboard();
        assert_eq!(tinted_highpass(&frame, 3.0, 0.0).unwrap(), frame);
    }

    #[test]
    fn test_half_tint_blends() {
        let frame = RgbImage::from_pixel(6, 6, Rgb([90, 90, 90]));
        let out = tinted_highpass(&frame, 2.0, 0.5).unwrap();
        assert!(out.pixels().all(|p| *p == Rgb([45, 45, 45])));
    }

    #[test]
    fn test_flat_image_has_no_highpass() {
        let frame = RgbImage::from_pixel(10, 10, Rgb([90, 90, 90]));
        let out = tinted_highpass(&frame, 2.5, 1.0).unwrap();
        assert!(out.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }

    #[test]
    fn test_highpass_keeps_bright_edges() {
        let frame = checkerboard();
        let out = tinted_highpass(&frame, 2.0, 1.0).unwrap();
        // Bright squares sit above their local mean, dark squares below it
        assert!(out.get_pixel(0, 0)[0] > 0);
        assert_eq!(out.get_pixel(2, 0)[0], 0);
    }

    #[test]
    fn test_kernel_shape() {
        let widths = circular_half_widths(2.0);
        assert_eq!(widths, vec![(-2, 0), (-1, 1), (0, 2), (1, 1), (2, 0)]);
        assert_eq!(circular_half_widths(0.4), vec![(0, 0)]);
    }

    #[test]
    fn test_invalid_arguments() {
        let frame = checkerboard();
        assert!(matches!(
            tinted_highpass(&frame, 0.0, 0.5),
            Err(DeblurError::BadRadius(_))
        ));
        assert!(matches!(
            tinted_highpass(&frame, 2.0, 1.5),
            Err(DeblurError::BadTint(_))
        ));
    }

    #[test]
    fn test_deblur_file() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.png");
        let output = dir.path().join("out.png");
        checkerboard().save(&input).unwrap();
        deblur_file(&input, &output, 2.0, 0.0).unwrap();
        assert_eq!(image::open(&output).unwrap().to_rgb8(), checkerboard());
    }
}
