use ndarray::Array3;
use ndarray_rand::rand_distr::Normal;
use ndarray_rand::RandomExt;
use rand::Rng;

use crate::error::NoiseError;

/// Zero-mean Gaussian noise with a standard deviation given in 8-bit units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GaussianNoise {
    sigma: f32,
}

impl GaussianNoise {
    pub fn new(sigma: f32) -> Result<Self, NoiseError> {
        if !sigma.is_finite() || sigma < 0.0 {
            return Err(NoiseError::InvalidSigma(sigma));
        }
        Ok(Self { sigma })
    }

    pub fn sigma(&self) -> f32 {
        self.sigma
    }

    /// Noisy copy of `clean`, clipped to [0, 1].
    pub fn apply<R: Rng + ?Sized>(&self, clean: &Array3<f32>, rng: &mut R) -> Array3<f32> {
        if self.sigma == 0.0 {
            return clean.clone();
        }

        let std = self.sigma / 255.0;
        // validated in `new`
        let normal = Normal::new(0.0f32, std).expect("finite non-negative std");
        let noise = Array3::random_using(clean.raw_dim(), normal, rng);
        (clean + &noise).mapv_into(|v| v.clamp(0.0, 1.0))
    }
}
