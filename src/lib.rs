pub mod augment;
pub mod batcher;
pub mod checkpoint;
pub mod config;
pub mod dataset;
pub mod error;
pub mod image_io;
pub mod infer;
pub mod matcher;
pub mod metrics;
pub mod model;
pub mod noise;
pub mod padding;
pub mod patch;
