use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::MatchError;

pub const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

/// What to do with a degraded file whose name carries no digits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchPolicy {
    /// Skip the file and log a warning.
    #[default]
    Lenient,
    /// Fail the whole scan.
    Strict,
}

/// A degraded image and its ground truth.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImagePair {
    pub noisy: PathBuf,
    pub clean: PathBuf,
}

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Every image file directly inside `dir`, sorted by path.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>, MatchError> {
    if !dir.is_dir() {
        return Err(MatchError::MissingDirectory {
            path: dir.to_path_buf(),
        });
    }

    let io_err = |source| MatchError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() && is_image_file(&path) {
            files.push(path);
        }
    }
    files.sort();

    Ok(files)
}

/// Pairs degraded images with ground truth named `{id}_clean.{ext}`, where
/// `id` is the first run of digits in the degraded file name.
#[derive(Debug, Clone)]
pub struct NameMatcher {
    input_dir: PathBuf,
    gt_dir: PathBuf,
    policy: MatchPolicy,
    digits: Regex,
}

impl NameMatcher {
    pub fn new(root: &Path, input_dir: &str, gt_dir: &str, policy: MatchPolicy) -> Self {
        Self {
            input_dir: root.join(input_dir),
            gt_dir: root.join(gt_dir),
            policy,
            digits: Regex::new("[0-9]+").expect("digit pattern is valid"),
        }
    }

    pub fn extract_identifier<'a>(&self, file_name: &'a str) -> Option<&'a str> {
        self.digits.find(file_name).map(|m| m.as_str())
    }

    pub fn ground_truth_for(&self, noisy: &Path) -> Result<Option<PathBuf>, MatchError> {
        let file_name = noisy
            .file_name()
            .map(|name| name.to_string_lossy())
            .unwrap_or_default();

        let Some(id) = self.extract_identifier(&file_name) else {
            return match self.policy {
                MatchPolicy::Strict => Err(MatchError::NoIdentifierFound {
                    path: noisy.to_path_buf(),
                }),
                MatchPolicy::Lenient => {
                    tracing::warn!("Skipping {}: no numeric identifier", noisy.display());
                    Ok(None)
                }
            };
        };

        let ext = noisy
            .extension()
            .map(|ext| ext.to_string_lossy())
            .unwrap_or_default();
        let clean = self.gt_dir.join(format!("{id}_clean.{ext}"));

        if clean.is_file() {
            Ok(Some(clean))
        } else {
            tracing::debug!("No ground truth for {}", noisy.display());
            Ok(None)
        }
    }

    pub fn match_pairs(&self) -> Result<Vec<ImagePair>, MatchError> {
        if !self.gt_dir.is_dir() {
            return Err(MatchError::MissingDirectory {
                path: self.gt_dir.clone(),
            });
        }

        let candidates = list_images(&self.input_dir)?;
        let total = candidates.len();
        let mut pairs = Vec::with_capacity(total);
        for noisy in candidates {
            if let Some(clean) = self.ground_truth_for(&noisy)? {
                pairs.push(ImagePair { noisy, clean });
            }
        }

        tracing::info!(
            "Matched {} of {} images in {}",
            pairs.len(),
            total,
            self.input_dir.display()
        );
        Ok(pairs)
    }
}
