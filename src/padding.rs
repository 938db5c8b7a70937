use ndarray::{s, Array3};

use crate::error::PaddingError;

/// Where the unpadded source sits inside a padded canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub top: usize,
    pub left: usize,
    pub height: usize,
    pub width: usize,
}

impl Region {
    pub fn extract(&self, img: &Array3<f32>) -> Array3<f32> {
        img.slice(s![
            ..,
            self.top..self.top + self.height,
            self.left..self.left + self.width
        ])
        .to_owned()
    }
}

/// Placement of an `height` x `width` image centered on a `canvas` square.
/// Odd pad amounts put the smaller half on the top/left edge.
pub fn centered_region(height: usize, width: usize, canvas: usize) -> Result<Region, PaddingError> {
    if height > canvas || width > canvas {
        return Err(PaddingError::CanvasTooSmall {
            canvas,
            height,
            width,
        });
    }

    Ok(Region {
        top: (canvas - height) / 2,
        left: (canvas - width) / 2,
        height,
        width,
    })
}

/// Zero-pad a `(C, H, W)` image onto a centered `canvas` x `canvas` square.
pub fn pad_to_canvas(img: &Array3<f32>, canvas: usize) -> Result<(Array3<f32>, Region), PaddingError> {
    let (channels, height, width) = img.dim();
    let region = centered_region(height, width, canvas)?;

    let mut out = Array3::zeros((channels, canvas, canvas));
    out.slice_mut(s![
        ..,
        region.top..region.top + height,
        region.left..region.left + width
    ])
    .assign(img);

    Ok((out, region))
}

/// Pad to the smallest square whose side is a multiple of `factor`, with a
/// `(1, X, X)` mask marking the source pixels.
pub fn expand_to_square(img: &Array3<f32>, factor: usize) -> Result<(Array3<f32>, Array3<f32>), PaddingError> {
    if factor == 0 {
        return Err(PaddingError::ZeroFactor);
    }

    let (_, height, width) = img.dim();
    let side = height.max(width).div_ceil(factor) * factor;
    let (padded, region) = pad_to_canvas(img, side)?;

    let mut mask = Array3::zeros((1, side, side));
    mask.slice_mut(s![
        ..,
        region.top..region.top + height,
        region.left..region.left + width
    ])
    .fill(1.0);

    Ok((padded, mask))
}
