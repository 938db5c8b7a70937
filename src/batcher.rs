use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};
use ndarray::{Array3, ShapeError};

use crate::dataset::{InputItem, PairItem};

/// `(C, H, W)` array to a tensor on `device`.
pub fn chw_to_tensor<B: Backend>(img: &Array3<f32>, device: &B::Device) -> Tensor<B, 3> {
    let (channels, height, width) = img.dim();
    let values: Vec<f32> = img.iter().copied().collect();
    Tensor::<B, 3>::from_data(Data::new(values, Shape::new([channels, height, width])).convert(), device)
}

pub fn tensor_to_chw<B: Backend>(tensor: Tensor<B, 3>) -> Result<Array3<f32>, ShapeError> {
    let data = tensor.into_data().convert::<f32>();
    let [channels, height, width] = data.shape.dims;
    Array3::from_shape_vec((channels, height, width), data.value)
}

#[derive(Clone, Debug)]
pub struct PairBatcher<B: Backend> {
    device: B::Device,
}

#[derive(Clone, Debug)]
pub struct PairBatch<B: Backend> {
    pub clean: Tensor<B, 4>,
    pub noisy: Tensor<B, 4>,
    pub clean_names: Vec<String>,
    pub noisy_names: Vec<String>,
}

impl<B: Backend> PairBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<PairItem, PairBatch<B>> for PairBatcher<B> {
    fn batch(&self, items: Vec<PairItem>) -> PairBatch<B> {
        let clean = items
            .iter()
            .map(|item| chw_to_tensor::<B>(&item.clean, &self.device).unsqueeze::<4>())
            .collect();

        let noisy = items
            .iter()
            .map(|item| chw_to_tensor::<B>(&item.noisy, &self.device).unsqueeze::<4>())
            .collect();

        let clean = Tensor::cat(clean, 0);
        let noisy = Tensor::cat(noisy, 0);

        PairBatch {
            clean,
            noisy,
            clean_names: items.iter().map(|item| item.clean_name.clone()).collect(),
            noisy_names: items.iter().map(|item| item.noisy_name.clone()).collect(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct InputBatch<B: Backend> {
    pub images: Tensor<B, 4>,
    pub names: Vec<String>,
}

impl<B: Backend> Batcher<InputItem, InputBatch<B>> for PairBatcher<B> {
    fn batch(&self, items: Vec<InputItem>) -> InputBatch<B> {
        let images = items
            .iter()
            .map(|item| chw_to_tensor::<B>(&item.image, &self.device).unsqueeze::<4>())
            .collect();

        InputBatch {
            images: Tensor::cat(images, 0),
            names: items.into_iter().map(|item| item.name).collect(),
        }
    }
}
