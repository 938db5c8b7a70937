use std::path::Path;

use image::RgbImage;
use ndarray::Array3;

use crate::error::{DatasetError, DatasetResult};
use crate::metrics::to_u8;

/// Decode an image file into a `(3, H, W)` array with values in [0, 1].
pub fn load_chw(path: &Path) -> DatasetResult<Array3<f32>> {
    let _span = tracing::trace_span!("Decode image", path = %path.display()).entered();
    let img = image::open(path)
        .map_err(|source| DatasetError::Image {
            path: path.to_path_buf(),
            source,
        })?
        .into_rgb8();

    Ok(rgb_to_chw(&img))
}

/// Convert 8-bit RGB into channel-first floats normalized to [0, 1].
pub fn rgb_to_chw(img: &RgbImage) -> Array3<f32> {
    let (width, height) = img.dimensions();
    Array3::from_shape_fn((3, height as usize, width as usize), |(c, y, x)| {
        img.get_pixel(x as u32, y as u32).0[c] as f32 / 255.0
    })
}

/// Quantize a `(3, H, W)` array in [0, 1] back to an 8-bit RGB image.
pub fn chw_to_rgb(chw: &Array3<f32>) -> RgbImage {
    let (_, height, width) = chw.dim();
    RgbImage::from_fn(width as u32, height as u32, |x, y| {
        let (x, y) = (x as usize, y as usize);
        image::Rgb([
            to_u8(chw[[0, y, x]]),
            to_u8(chw[[1, y, x]]),
            to_u8(chw[[2, y, x]]),
        ])
    })
}

pub fn save_chw(chw: &Array3<f32>, path: &Path) -> Result<(), image::ImageError> {
    chw_to_rgb(chw).save(path)
}

/// Base file name of a path, used to name result files.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
