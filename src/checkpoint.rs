//! Safetensors state dicts and the key lookup used to bind them to a model.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use safetensors::tensor::{SafeTensors, TensorView};
use safetensors::{serialize_to_file, Dtype};

use crate::error::CheckpointError;

/// Prefix `DataParallel`-style wrappers put in front of every parameter name.
pub const DATA_PARALLEL_PREFIX: &str = "module.";

#[derive(Clone, Debug, PartialEq)]
pub struct TensorEntry {
    pub shape: Vec<usize>,
    pub values: Vec<f32>,
}

/// How checkpoint keys relate to model parameter names.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyScheme {
    Plain,
    DataParallel,
}

impl KeyScheme {
    pub fn key(self, name: &str) -> String {
        match self {
            KeyScheme::Plain => name.to_string(),
            KeyScheme::DataParallel => format!("{DATA_PARALLEL_PREFIX}{name}"),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct StateDict {
    tensors: HashMap<String, TensorEntry>,
}

impl StateDict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, shape: Vec<usize>, values: Vec<f32>) {
        self.tensors.insert(name.into(), TensorEntry { shape, values });
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.tensors.keys().map(String::as_str)
    }

    pub fn load(path: &Path) -> Result<Self, CheckpointError> {
        let buffer = fs::read(path).map_err(|source| CheckpointError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let tensors = SafeTensors::deserialize(&buffer)?;

        let mut dict = Self::new();
        for (name, tensor) in tensors.tensors() {
            let values: Vec<f32> = match tensor.dtype() {
                Dtype::F32 => tensor
                    .data()
                    .chunks_exact(4)
                    .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                    .collect(),
                Dtype::F64 => tensor
                    .data()
                    .chunks_exact(8)
                    .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]) as f32)
                    .collect(),
                other => {
                    return Err(CheckpointError::UnsupportedDtype {
                        name,
                        dtype: format!("{other:?}"),
                    })
                }
            };
            dict.insert(name, tensor.shape().to_vec(), values);
        }

        tracing::info!("Loaded {} tensors from {}", dict.len(), path.display());
        Ok(dict)
    }

    pub fn save(&self, path: &Path) -> Result<(), CheckpointError> {
        let bytes: HashMap<&str, Vec<u8>> = self
            .tensors
            .iter()
            .map(|(name, entry)| {
                let data = entry.values.iter().flat_map(|v| v.to_le_bytes()).collect();
                (name.as_str(), data)
            })
            .collect();

        let mut views = Vec::with_capacity(self.tensors.len());
        for (name, entry) in &self.tensors {
            let view = TensorView::new(Dtype::F32, entry.shape.clone(), &bytes[name.as_str()])?;
            views.push((name.as_str(), view));
        }

        serialize_to_file(views, &None, path)?;
        Ok(())
    }

    /// Look every parameter up under the plain names first, then under the
    /// `module.` prefix. The first scheme covering all of `expected` wins.
    pub fn resolve(&self, expected: &[String]) -> Result<(KeyScheme, HashMap<String, TensorEntry>), CheckpointError> {
        let mut missing = Vec::new();

        for scheme in [KeyScheme::Plain, KeyScheme::DataParallel] {
            let absent: Vec<String> = expected
                .iter()
                .filter(|name| !self.tensors.contains_key(&scheme.key(name)))
                .cloned()
                .collect();

            if absent.is_empty() {
                let resolved = expected
                    .iter()
                    .map(|name| (name.clone(), self.tensors[&scheme.key(name)].clone()))
                    .collect();
                tracing::debug!("Checkpoint keys resolved with {scheme:?} scheme");
                return Ok((scheme, resolved));
            }

            if scheme == KeyScheme::Plain {
                missing = absent;
            }
        }

        Err(CheckpointError::FormatError { missing })
    }
}
