use ndarray::{s, Array3};
use rand::Rng;

use crate::error::PatchError;

/// Top-left corner of a `patch`-sized square crop inside an `height` x `width` image.
///
/// An image exactly `patch` rows tall is cropped at the origin. Otherwise the
/// row is drawn from `[0, height - patch)` and the column from `[0, width - patch)`.
pub fn sample_origin<R: Rng + ?Sized>(
    height: usize,
    width: usize,
    patch: usize,
    rng: &mut R,
) -> Result<(usize, usize), PatchError> {
    if patch == 0 || patch > height || patch > width {
        return Err(PatchError::InvalidPatchSize {
            patch,
            height,
            width,
        });
    }

    if height == patch {
        return Ok((0, 0));
    }

    let row = rng.gen_range(0..height - patch);
    let col = if width > patch {
        rng.gen_range(0..width - patch)
    } else {
        0
    };
    Ok((row, col))
}

pub fn crop(img: &Array3<f32>, (row, col): (usize, usize), patch: usize) -> Array3<f32> {
    img.slice(s![.., row..row + patch, col..col + patch]).to_owned()
}

/// Crops both images at one shared origin. The images must have the same shape.
pub fn crop_pair<R: Rng + ?Sized>(
    clean: &Array3<f32>,
    noisy: &Array3<f32>,
    patch: usize,
    rng: &mut R,
) -> Result<(Array3<f32>, Array3<f32>), PatchError> {
    if clean.dim() != noisy.dim() {
        return Err(PatchError::PairShapeMismatch {
            clean: clean.dim(),
            noisy: noisy.dim(),
        });
    }
    let (_, height, width) = clean.dim();
    let origin = sample_origin(height, width, patch, rng)?;
    Ok((crop(clean, origin, patch), crop(noisy, origin, patch)))
}
