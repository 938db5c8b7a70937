//! PSNR and SSIM computed on the 8-bit luma plane.

use ndarray::{Array2, Array3};

use crate::error::MetricError;

pub const DATA_RANGE: f64 = 255.0;
pub const SSIM_WINDOW: usize = 7;
const K1: f64 = 0.01;
const K2: f64 = 0.03;

/// Quantize a [0, 1] sample to 8 bits.
pub fn to_u8(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// BT.601 luma of a `(3, H, W)` RGB array, computed after 8-bit quantization
/// and rounded back to integer levels.
pub fn luma(img: &Array3<f32>) -> Array2<f64> {
    let (_, height, width) = img.dim();
    Array2::from_shape_fn((height, width), |(y, x)| {
        let r = to_u8(img[[0, y, x]]) as f64;
        let g = to_u8(img[[1, y, x]]) as f64;
        let b = to_u8(img[[2, y, x]]) as f64;
        (0.299 * r + 0.587 * g + 0.114 * b).round()
    })
}

fn check_shapes(a: &[usize], b: &[usize]) -> Result<(), MetricError> {
    if a != b {
        return Err(MetricError::ShapeMismatch {
            left: a.to_vec(),
            right: b.to_vec(),
        });
    }
    Ok(())
}

pub fn psnr(a: &Array2<f64>, b: &Array2<f64>) -> Result<f64, MetricError> {
    check_shapes(a.shape(), b.shape())?;

    let mse = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        / a.len().max(1) as f64;
    if mse == 0.0 {
        return Ok(f64::INFINITY);
    }

    Ok(10.0 * (DATA_RANGE * DATA_RANGE / mse).log10())
}

// Summed-area table with a zero first row and column.
fn integral(img: &Array2<f64>) -> Array2<f64> {
    let (height, width) = img.dim();
    let mut table = Array2::zeros((height + 1, width + 1));
    for y in 0..height {
        let mut row = 0.0;
        for x in 0..width {
            row += img[[y, x]];
            table[[y + 1, x + 1]] = table[[y, x + 1]] + row;
        }
    }
    table
}

fn window_sum(table: &Array2<f64>, y: usize, x: usize, size: usize) -> f64 {
    table[[y + size, x + size]] - table[[y, x + size]] - table[[y + size, x]] + table[[y, x]]
}

/// Mean SSIM over every 7x7 window lying inside the image, with uniform
/// weights and sample covariance.
pub fn ssim(a: &Array2<f64>, b: &Array2<f64>) -> Result<f64, MetricError> {
    check_shapes(a.shape(), b.shape())?;

    let (height, width) = a.dim();
    if height < SSIM_WINDOW || width < SSIM_WINDOW {
        return Err(MetricError::ImageTooSmall {
            height,
            width,
            window: SSIM_WINDOW,
        });
    }

    let sum_a = integral(a);
    let sum_b = integral(b);
    let sum_aa = integral(&(a * a));
    let sum_bb = integral(&(b * b));
    let sum_ab = integral(&(a * b));

    let n = (SSIM_WINDOW * SSIM_WINDOW) as f64;
    let cov_norm = n / (n - 1.0);
    let c1 = (K1 * DATA_RANGE).powi(2);
    let c2 = (K2 * DATA_RANGE).powi(2);

    let mut total = 0.0;
    let mut count = 0usize;
    for y in 0..=height - SSIM_WINDOW {
        for x in 0..=width - SSIM_WINDOW {
            let ux = window_sum(&sum_a, y, x, SSIM_WINDOW) / n;
            let uy = window_sum(&sum_b, y, x, SSIM_WINDOW) / n;
            let uxx = window_sum(&sum_aa, y, x, SSIM_WINDOW) / n;
            let uyy = window_sum(&sum_bb, y, x, SSIM_WINDOW) / n;
            let uxy = window_sum(&sum_ab, y, x, SSIM_WINDOW) / n;

            let vx = cov_norm * (uxx - ux * ux);
            let vy = cov_norm * (uyy - uy * uy);
            let vxy = cov_norm * (uxy - ux * uy);

            let numerator = (2.0 * ux * uy + c1) * (2.0 * vxy + c2);
            let denominator = (ux * ux + uy * uy + c1) * (vx + vy + c2);
            total += numerator / denominator;
            count += 1;
        }
    }

    Ok(total / count as f64)
}

pub fn psnr_luma(restored: &Array3<f32>, target: &Array3<f32>) -> Result<f64, MetricError> {
    check_shapes(restored.shape(), target.shape())?;
    psnr(&luma(restored), &luma(target))
}

pub fn ssim_luma(restored: &Array3<f32>, target: &Array3<f32>) -> Result<f64, MetricError> {
    check_shapes(restored.shape(), target.shape())?;
    ssim(&luma(restored), &luma(target))
}
