use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("directory does not exist: {path}")]
    MissingDirectory { path: PathBuf },
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no numeric identifier found in file name {path}")]
    NoIdentifierFound { path: PathBuf },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatchError {
    #[error("patch size {patch} does not fit a {height}x{width} image")]
    InvalidPatchSize {
        patch: usize,
        height: usize,
        width: usize,
    },
    #[error("cannot crop a {noisy:?} image alongside a {clean:?} image")]
    PairShapeMismatch {
        clean: (usize, usize, usize),
        noisy: (usize, usize, usize),
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaddingError {
    #[error("canvas {canvas}x{canvas} is smaller than the {height}x{width} image")]
    CanvasTooSmall {
        canvas: usize,
        height: usize,
        width: usize,
    },
    #[error("square factor must be positive")]
    ZeroFactor,
}

#[derive(Debug, Error, PartialEq)]
pub enum NoiseError {
    #[error("noise level must be finite and non-negative, got {0}")]
    InvalidSigma(f32),
}

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error(transparent)]
    Match(#[from] MatchError),
    #[error(transparent)]
    Patch(#[from] PatchError),
    #[error(transparent)]
    Padding(#[from] PaddingError),
    #[error(transparent)]
    Noise(#[from] NoiseError),
    #[error("image decode error at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("clean image {clean} is {clean_size:?} but noisy image {noisy} is {noisy_size:?}")]
    SizeMismatch {
        clean: PathBuf,
        noisy: PathBuf,
        clean_size: (usize, usize),
        noisy_size: (usize, usize),
    },
    #[error("dataset is empty")]
    Empty,
}

#[derive(Debug, Error, PartialEq)]
pub enum MetricError {
    #[error("images differ in shape: {left:?} vs {right:?}")]
    ShapeMismatch {
        left: Vec<usize>,
        right: Vec<usize>,
    },
    #[error("image {height}x{width} is smaller than the {window}x{window} SSIM window")]
    ImageTooSmall {
        height: usize,
        width: usize,
        window: usize,
    },
}

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("safetensors error: {0}")]
    SafeTensors(#[from] safetensors::SafeTensorError),
    #[error("unsupported dtype {dtype} for tensor '{name}'")]
    UnsupportedDtype { name: String, dtype: String },
    #[error("checkpoint keys match neither the plain nor the 'module.' scheme, missing: {missing:?}")]
    FormatError { missing: Vec<String> },
    #[error("tensor '{name}' has shape {actual:?}, expected {expected:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    #[error("checkpoint contains no convolution layers")]
    NoLayers,
}

#[derive(Debug, Error)]
pub enum EvalError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error(transparent)]
    Metric(#[from] MetricError),
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
    #[error("restored image for {name} has shape {actual:?}, expected {expected:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    #[error("failed to write {path}: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type DatasetResult<T> = Result<T, DatasetError>;
