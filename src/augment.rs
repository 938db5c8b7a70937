//! The eight rotations and reflections of a square, applied in the (H, W)
//! plane of channel-first arrays.

use ndarray::{s, Array3, ArrayView3};
use rand::Rng;

pub type Transform = fn(ArrayView3<f32>) -> Array3<f32>;

/// Indexed by [`Augmentation::index`].
pub const TRANSFORMS: [Transform; 8] = [
    identity,
    rot90,
    rot180,
    rot270,
    flip_h,
    flip_v,
    flip_h_rot90,
    flip_v_rot90,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Augmentation {
    Identity,
    Rot90,
    Rot180,
    Rot270,
    FlipH,
    FlipV,
    FlipHRot90,
    FlipVRot90,
}

impl Augmentation {
    pub const ALL: [Augmentation; 8] = [
        Augmentation::Identity,
        Augmentation::Rot90,
        Augmentation::Rot180,
        Augmentation::Rot270,
        Augmentation::FlipH,
        Augmentation::FlipV,
        Augmentation::FlipHRot90,
        Augmentation::FlipVRot90,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Uniform draw over all eight transforms.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }

    pub fn apply(self, img: &Array3<f32>) -> Array3<f32> {
        TRANSFORMS[self.index()](img.view())
    }

    pub fn apply_pair(self, clean: &Array3<f32>, noisy: &Array3<f32>) -> (Array3<f32>, Array3<f32>) {
        (self.apply(clean), self.apply(noisy))
    }
}

fn identity(img: ArrayView3<f32>) -> Array3<f32> {
    img.to_owned()
}

/// Counter-clockwise quarter turn.
fn rot90(img: ArrayView3<f32>) -> Array3<f32> {
    img.slice(s![.., .., ..;-1]).permuted_axes([0, 2, 1]).to_owned()
}

fn rot180(img: ArrayView3<f32>) -> Array3<f32> {
    img.slice(s![.., ..;-1, ..;-1]).to_owned()
}

fn rot270(img: ArrayView3<f32>) -> Array3<f32> {
    img.slice(s![.., ..;-1, ..]).permuted_axes([0, 2, 1]).to_owned()
}

fn flip_h(img: ArrayView3<f32>) -> Array3<f32> {
    img.slice(s![.., .., ..;-1]).to_owned()
}

fn flip_v(img: ArrayView3<f32>) -> Array3<f32> {
    img.slice(s![.., ..;-1, ..]).to_owned()
}

// rot90 after a horizontal flip is a transpose
fn flip_h_rot90(img: ArrayView3<f32>) -> Array3<f32> {
    img.permuted_axes([0, 2, 1]).to_owned()
}

// rot90 after a vertical flip is an anti-transpose
fn flip_v_rot90(img: ArrayView3<f32>) -> Array3<f32> {
    img.slice(s![.., ..;-1, ..;-1]).permuted_axes([0, 2, 1]).to_owned()
}
