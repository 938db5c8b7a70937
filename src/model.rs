use burn::config::Config;
use burn::module::{Module, Param, ParamId};
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::{PaddingConfig2d, Relu};
use burn::tensor::{backend::Backend, Data, Shape, Tensor};

use crate::checkpoint::{StateDict, TensorEntry};
use crate::error::CheckpointError;

const CHANNELS: usize = 3;
const KERNEL: usize = 3;

/// Anything mapping a noisy `[N, 3, H, W]` batch to a restored batch of the same shape.
pub trait Restorer<B: Backend> {
    fn restore(&self, noisy: Tensor<B, 4>) -> Tensor<B, 4>;
}

/// Passes the input through; scores the degraded images themselves.
#[derive(Clone, Copy, Debug, Default)]
pub struct Identity;

impl<B: Backend> Restorer<B> for Identity {
    fn restore(&self, noisy: Tensor<B, 4>) -> Tensor<B, 4> {
        noisy
    }
}

#[derive(Config, Debug)]
pub struct RestorerConfig {
    #[config(default = 3)]
    pub num_layers: usize,
    /// Add the input back onto the convolution output.
    #[config(default = true)]
    pub residual: bool,
}

impl RestorerConfig {
    pub fn parameter_names(&self) -> Vec<String> {
        (0..self.num_layers)
            .flat_map(|i| [format!("layers.{i}.weight"), format!("layers.{i}.bias")])
            .collect()
    }

    /// Bind checkpoint weights to a [`ConvRestorer`].
    pub fn init_from<B: Backend>(&self, dict: &StateDict, device: &B::Device) -> Result<ConvRestorer<B>, CheckpointError> {
        if self.num_layers == 0 {
            return Err(CheckpointError::NoLayers);
        }
        let (_, weights) = dict.resolve(&self.parameter_names())?;

        let mut layers = Vec::with_capacity(self.num_layers);
        let mut in_channels = CHANNELS;
        for i in 0..self.num_layers {
            let weight_name = format!("layers.{i}.weight");
            let weight = &weights[&weight_name];
            let out_channels = weight.shape.first().copied().unwrap_or(0);
            let out_channels = if i + 1 == self.num_layers { CHANNELS } else { out_channels };
            check_shape(&weight_name, weight, &[out_channels, in_channels, KERNEL, KERNEL])?;

            let bias_name = format!("layers.{i}.bias");
            let bias = &weights[&bias_name];
            check_shape(&bias_name, bias, &[out_channels])?;

            let mut conv = Conv2dConfig::new([in_channels, out_channels], [KERNEL, KERNEL])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(device);
            conv.weight = Param::initialized(
                ParamId::new(),
                Tensor::from_data(
                    Data::new(weight.values.clone(), Shape::new([out_channels, in_channels, KERNEL, KERNEL])).convert(),
                    device,
                ),
            );
            conv.bias = Some(Param::initialized(
                ParamId::new(),
                Tensor::from_data(Data::new(bias.values.clone(), Shape::new([out_channels])).convert(), device),
            ));
            layers.push(conv);
            in_channels = out_channels;
        }

        Ok(ConvRestorer {
            layers,
            activation: Relu::new(),
            residual: self.residual,
        })
    }
}

fn check_shape(name: &str, entry: &TensorEntry, expected: &[usize]) -> Result<(), CheckpointError> {
    if entry.shape != expected || entry.values.len() != expected.iter().product::<usize>() {
        return Err(CheckpointError::ShapeMismatch {
            name: name.to_string(),
            expected: expected.to_vec(),
            actual: entry.shape.clone(),
        });
    }
    Ok(())
}

/// A stack of 3x3 convolutions with ReLU in between.
#[derive(Module, Debug)]
pub struct ConvRestorer<B: Backend> {
    layers: Vec<Conv2d<B>>,
    activation: Relu,
    residual: bool,
}

impl<B: Backend> ConvRestorer<B> {
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let last = self.layers.len().saturating_sub(1);

        let mut x = input.clone();
        for (i, conv) in self.layers.iter().enumerate() {
            x = conv.forward(x);
            if i < last {
                x = self.activation.forward(x);
            }
        }

        if self.residual {
            x + input
        } else {
            x
        }
    }
}

impl<B: Backend> Restorer<B> for ConvRestorer<B> {
    fn restore(&self, noisy: Tensor<B, 4>) -> Tensor<B, 4> {
        self.forward(noisy)
    }
}
