use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use burn::data::dataset::Dataset;
use ndarray::Array3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::augment::Augmentation;
use crate::config::LoaderConfig;
use crate::error::{DatasetError, DatasetResult};
use crate::image_io::{file_name, load_chw};
use crate::matcher::{list_images, ImagePair, NameMatcher};
use crate::noise::GaussianNoise;
use crate::padding::{pad_to_canvas, Region};
use crate::patch::crop_pair;

/// One clean/noisy sample, both `(3, H, W)` in [0, 1].
#[derive(Clone, Debug)]
pub struct PairItem {
    pub clean: Array3<f32>,
    pub noisy: Array3<f32>,
    pub clean_name: String,
    pub noisy_name: String,
}

/// A padded evaluation pair. `region` locates the source pixels in the canvas.
#[derive(Clone, Debug)]
pub struct ValidationItem {
    pub clean: Array3<f32>,
    pub noisy: Array3<f32>,
    pub clean_name: String,
    pub noisy_name: String,
    pub region: Region,
}

/// An input image with no ground truth.
#[derive(Clone, Debug)]
pub struct InputItem {
    pub image: Array3<f32>,
    pub name: String,
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

// Index arithmetic shared by every `try_get`: out-of-range indices wrap.
fn wrap(index: usize, len: usize) -> DatasetResult<usize> {
    if len == 0 {
        return Err(DatasetError::Empty);
    }
    Ok(index % len)
}

// burn's `Dataset::get` has no error channel.
fn logged<T>(index: usize, result: DatasetResult<T>) -> Option<T> {
    result
        .map_err(|err| tracing::error!("Failed to load item {index}: {err}"))
        .ok()
}

fn load_pair(pair: &ImagePair) -> DatasetResult<(Array3<f32>, Array3<f32>)> {
    let clean = load_chw(&pair.clean)?;
    let noisy = load_chw(&pair.noisy)?;

    let (_, ch, cw) = clean.dim();
    let (_, nh, nw) = noisy.dim();
    if (ch, cw) != (nh, nw) {
        return Err(DatasetError::SizeMismatch {
            clean: pair.clean.clone(),
            noisy: pair.noisy.clone(),
            clean_size: (ch, cw),
            noisy_size: (nh, nw),
        });
    }

    Ok((clean, noisy))
}

fn crop_and_augment<R: Rng + ?Sized>(
    clean: &Array3<f32>,
    noisy: &Array3<f32>,
    patch_size: usize,
    rng: &mut R,
) -> DatasetResult<(Array3<f32>, Array3<f32>)> {
    let (clean, noisy) = crop_pair(clean, noisy, patch_size, rng)?;
    Ok(Augmentation::random(rng).apply_pair(&clean, &noisy))
}

/// Training pairs: random `patch_size` crops under a random shared augmentation.
#[derive(Debug)]
pub struct PairedDataset {
    pairs: Vec<ImagePair>,
    patch_size: usize,
    rng: Mutex<StdRng>,
}

impl PairedDataset {
    /// Matches `root/{input_dir}` against `root/{gt_dir}`.
    pub fn new(root: &Path, config: &LoaderConfig) -> DatasetResult<Self> {
        let pairs = NameMatcher::new(root, &config.input_dir, &config.gt_dir, config.policy).match_pairs()?;
        tracing::info!("Training dataset contains {} pairs", pairs.len());

        Ok(Self::from_pairs(pairs, config.patch_size, config.seed))
    }

    pub fn from_pairs(pairs: Vec<ImagePair>, patch_size: usize, seed: Option<u64>) -> Self {
        Self {
            pairs,
            patch_size,
            rng: Mutex::new(seeded_rng(seed)),
        }
    }

    pub fn pairs(&self) -> &[ImagePair] {
        &self.pairs
    }

    /// Replace the generator, e.g. with a per-worker seed.
    pub fn reseed(&self, seed: u64) {
        *self.rng.lock().unwrap_or_else(PoisonError::into_inner) = StdRng::seed_from_u64(seed);
    }

    pub fn try_get(&self, index: usize) -> DatasetResult<PairItem> {
        let pair = &self.pairs[wrap(index, self.pairs.len())?];
        let (clean, noisy) = load_pair(pair)?;

        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        self.sample(pair, &clean, &noisy, &mut *rng)
    }

    pub fn try_get_with<R: Rng + ?Sized>(&self, index: usize, rng: &mut R) -> DatasetResult<PairItem> {
        let pair = &self.pairs[wrap(index, self.pairs.len())?];
        let (clean, noisy) = load_pair(pair)?;
        self.sample(pair, &clean, &noisy, rng)
    }

    fn sample<R: Rng + ?Sized>(
        &self,
        pair: &ImagePair,
        clean: &Array3<f32>,
        noisy: &Array3<f32>,
        rng: &mut R,
    ) -> DatasetResult<PairItem> {
        let (clean, noisy) = crop_and_augment(clean, noisy, self.patch_size, rng)?;
        Ok(PairItem {
            clean,
            noisy,
            clean_name: file_name(&pair.clean),
            noisy_name: file_name(&pair.noisy),
        })
    }
}

impl Dataset<PairItem> for PairedDataset {
    fn get(&self, index: usize) -> Option<PairItem> {
        if index >= self.len() {
            return None;
        }
        logged(index, self.try_get(index))
    }

    fn len(&self) -> usize {
        self.pairs.len()
    }
}

/// Clean images only; the noisy side is synthesized on every retrieval.
#[derive(Debug)]
pub struct GaussianDataset {
    files: Vec<PathBuf>,
    patch_size: usize,
    noise: GaussianNoise,
    rng: Mutex<StdRng>,
}

impl GaussianDataset {
    /// Every image directly inside `dir`, with noise level `config.noise_level`.
    pub fn new(dir: &Path, config: &LoaderConfig) -> DatasetResult<Self> {
        let files = list_images(dir)?;
        let noise = GaussianNoise::new(config.noise_level)?;
        tracing::info!(
            "Gaussian dataset contains {} images, sigma {}",
            files.len(),
            noise.sigma()
        );

        Ok(Self {
            files,
            patch_size: config.patch_size,
            noise,
            rng: Mutex::new(seeded_rng(config.seed)),
        })
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn reseed(&self, seed: u64) {
        *self.rng.lock().unwrap_or_else(PoisonError::into_inner) = StdRng::seed_from_u64(seed);
    }

    pub fn try_get(&self, index: usize) -> DatasetResult<PairItem> {
        let path = &self.files[wrap(index, self.files.len())?];
        let clean = load_chw(path)?;

        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        self.sample(path, &clean, &mut *rng)
    }

    pub fn try_get_with<R: Rng + ?Sized>(&self, index: usize, rng: &mut R) -> DatasetResult<PairItem> {
        let path = &self.files[wrap(index, self.files.len())?];
        let clean = load_chw(path)?;
        self.sample(path, &clean, rng)
    }

    fn sample<R: Rng + ?Sized>(&self, path: &Path, clean: &Array3<f32>, rng: &mut R) -> DatasetResult<PairItem> {
        let noisy = self.noise.apply(clean, rng);
        let (clean, noisy) = crop_and_augment(clean, &noisy, self.patch_size, rng)?;
        let name = file_name(path);

        Ok(PairItem {
            clean,
            noisy,
            clean_name: name.clone(),
            noisy_name: name,
        })
    }
}

impl Dataset<PairItem> for GaussianDataset {
    fn get(&self, index: usize) -> Option<PairItem> {
        if index >= self.len() {
            return None;
        }
        logged(index, self.try_get(index))
    }

    fn len(&self) -> usize {
        self.files.len()
    }
}

/// Evaluation pairs, zero-padded onto a fixed square canvas instead of cropped.
#[derive(Debug, Clone)]
pub struct ValidationDataset {
    pairs: Vec<ImagePair>,
    canvas_size: usize,
}

impl ValidationDataset {
    pub fn new(root: &Path, config: &LoaderConfig) -> DatasetResult<Self> {
        let pairs = NameMatcher::new(root, &config.input_dir, &config.gt_dir, config.policy).match_pairs()?;
        tracing::info!(
            "Validation dataset contains {} pairs, canvas {}",
            pairs.len(),
            config.canvas_size
        );

        Ok(Self::from_pairs(pairs, config.canvas_size))
    }

    pub fn from_pairs(pairs: Vec<ImagePair>, canvas_size: usize) -> Self {
        Self { pairs, canvas_size }
    }

    pub fn pairs(&self) -> &[ImagePair] {
        &self.pairs
    }

    pub fn try_get(&self, index: usize) -> DatasetResult<ValidationItem> {
        let pair = &self.pairs[wrap(index, self.pairs.len())?];
        let (clean, noisy) = load_pair(pair)?;

        let (clean, region) = pad_to_canvas(&clean, self.canvas_size)?;
        let (noisy, _) = pad_to_canvas(&noisy, self.canvas_size)?;

        Ok(ValidationItem {
            clean,
            noisy,
            clean_name: file_name(&pair.clean),
            noisy_name: file_name(&pair.noisy),
            region,
        })
    }
}

impl Dataset<ValidationItem> for ValidationDataset {
    fn get(&self, index: usize) -> Option<ValidationItem> {
        if index >= self.len() {
            return None;
        }
        logged(index, self.try_get(index))
    }

    fn len(&self) -> usize {
        self.pairs.len()
    }
}

/// Inputs without ground truth: test sets and super-resolution sources.
#[derive(Debug, Clone)]
pub struct UnpairedDataset {
    files: Vec<PathBuf>,
}

impl UnpairedDataset {
    /// Images under `root/input`.
    pub fn test(root: &Path) -> DatasetResult<Self> {
        Self::from_dir(&root.join("input"))
    }

    pub fn from_dir(dir: &Path) -> DatasetResult<Self> {
        let files = list_images(dir)?;
        tracing::info!("Found {} input images in {}", files.len(), dir.display());
        Ok(Self { files })
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn try_get(&self, index: usize) -> DatasetResult<InputItem> {
        let path = &self.files[wrap(index, self.files.len())?];
        Ok(InputItem {
            image: load_chw(path)?,
            name: file_name(path),
        })
    }
}

impl Dataset<InputItem> for UnpairedDataset {
    fn get(&self, index: usize) -> Option<InputItem> {
        if index >= self.len() {
            return None;
        }
        logged(index, self.try_get(index))
    }

    fn len(&self) -> usize {
        self.files.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::matcher::test::{scratch_dir, write_png};
    use crate::matcher::MatchPolicy;
    use image::RgbImage;
    use std::fs;

    fn write_solid(path: &Path, width: u32, height: u32, value: u8) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        RgbImage::from_pixel(width, height, image::Rgb([value; 3])).save(path).unwrap();
    }

    fn paired_root(tag: &str, width: u32, height: u32) -> PathBuf {
        let root = scratch_dir(tag);
        for i in 1..=5 {
            write_png(&root.join(format!("data/rain{i}.png")), width, height);
        }
        for i in [1, 3, 5] {
            write_png(&root.join(format!("gt/{i}_clean.png")), width, height);
        }
        root
    }

    #[test]
    fn check_length() {
        let root = paired_root("length", 8, 8);
        let dataset = PairedDataset::new(&root, &LoaderConfig::new().with_patch_size(4)).unwrap();
        assert_eq!(3, dataset.len());
        fs::remove_dir_all(root).ok();
    }

    #[test]
    fn patches_have_configured_size() {
        let root = paired_root("patches", 40, 24);
        let config = LoaderConfig::new().with_patch_size(16).with_seed(Some(11));
        let dataset = PairedDataset::new(&root, &config).unwrap();

        for index in 0..dataset.len() * 4 {
            let item = dataset.try_get(index).unwrap();
            assert_eq!(item.clean.dim(), (3, 16, 16));
            assert_eq!(item.noisy.dim(), (3, 16, 16));
            assert!(item.clean_name.ends_with("_clean.png"));
        }
        assert!(dataset.get(3).is_none());
        fs::remove_dir_all(root).ok();
    }

    #[test]
    fn pair_stays_aligned_through_crop_and_augment() {
        let root = scratch_dir("aligned");
        // same gradient in both files: any misalignment shows up as a pixel diff
        write_png(&root.join("data/7.png"), 30, 20);
        write_png(&root.join("gt/7_clean.png"), 30, 20);
        let dataset = PairedDataset::new(&root, &LoaderConfig::new().with_patch_size(8)).unwrap();

        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..32 {
            let item = dataset.try_get_with(0, &mut rng).unwrap();
            assert_eq!(item.clean, item.noisy);
        }
        fs::remove_dir_all(root).ok();
    }

    #[test]
    fn equal_seeds_reproduce_items() {
        let root = paired_root("seeded", 32, 32);
        let config = LoaderConfig::new().with_patch_size(8).with_seed(Some(99));
        let first = PairedDataset::new(&root, &config).unwrap();
        let second = PairedDataset::new(&root, &config).unwrap();

        for index in 0..3 {
            assert_eq!(first.try_get(index).unwrap().clean, second.try_get(index).unwrap().clean);
        }

        first.reseed(4);
        second.reseed(4);
        assert_eq!(first.try_get(1).unwrap().noisy, second.try_get(1).unwrap().noisy);
        fs::remove_dir_all(root).ok();
    }

    #[test]
    fn oversized_patch_surfaces_as_error() {
        let root = paired_root("oversized", 8, 8);
        let dataset = PairedDataset::new(&root, &LoaderConfig::new().with_patch_size(16)).unwrap();
        assert!(matches!(dataset.try_get(0), Err(DatasetError::Patch(_))));
        assert!(dataset.get(0).is_none());
        fs::remove_dir_all(root).ok();
    }

    #[test]
    fn mismatched_sizes_are_rejected() {
        let root = scratch_dir("mismatch");
        write_png(&root.join("data/1.png"), 10, 10);
        write_png(&root.join("gt/1_clean.png"), 12, 10);
        let dataset = ValidationDataset::new(&root, &LoaderConfig::new()).unwrap();
        assert!(matches!(dataset.try_get(0), Err(DatasetError::SizeMismatch { .. })));
        fs::remove_dir_all(root).ok();
    }

    #[test]
    fn gaussian_with_zero_sigma_returns_clean_patch() {
        let root = scratch_dir("gaussian");
        write_solid(&root.join("a.png"), 20, 20, 200);
        write_solid(&root.join("b.png"), 20, 20, 10);
        let config = LoaderConfig::new()
            .with_patch_size(8)
            .with_noise_level(0.0)
            .with_seed(Some(1));
        let dataset = GaussianDataset::new(&root, &config).unwrap();

        assert_eq!(dataset.len(), 2);
        let item = dataset.try_get(0).unwrap();
        assert_eq!(item.clean.dim(), (3, 8, 8));
        assert_eq!(item.noisy, item.clean);
        assert!(item.clean.iter().all(|v| *v == 200.0 / 255.0));
        assert_eq!(item.clean_name, "a.png");
        assert_eq!(item.noisy_name, "a.png");
        fs::remove_dir_all(root).ok();
    }

    #[test]
    fn gaussian_retrieval_is_not_idempotent() {
        let root = scratch_dir("gaussian_noisy");
        write_solid(&root.join("a.png"), 16, 16, 128);
        let config = LoaderConfig::new().with_patch_size(16).with_noise_level(25.0);
        let dataset = GaussianDataset::new(&root, &config).unwrap();

        let first = dataset.try_get(0).unwrap();
        let second = dataset.try_get(0).unwrap();
        assert_ne!(first.noisy, second.noisy);
        assert!(first.noisy.iter().all(|v| (0.0..=1.0).contains(v)));
        fs::remove_dir_all(root).ok();
    }

    #[test]
    fn gaussian_equal_seeds_reproduce_items() {
        let root = scratch_dir("gaussian_seeded");
        write_png(&root.join("a.png"), 24, 24);
        write_png(&root.join("b.png"), 24, 24);
        let config = LoaderConfig::new()
            .with_patch_size(8)
            .with_noise_level(15.0)
            .with_seed(Some(7));
        let first = GaussianDataset::new(&root, &config).unwrap();
        let second = GaussianDataset::new(&root, &config).unwrap();

        for index in 0..2 {
            let (a, b) = (first.try_get(index).unwrap(), second.try_get(index).unwrap());
            assert_eq!(a.clean, b.clean);
            assert_eq!(a.noisy, b.noisy);
        }

        first.reseed(11);
        second.reseed(11);
        assert_eq!(first.try_get(1).unwrap().noisy, second.try_get(1).unwrap().noisy);

        let mut rng = StdRng::seed_from_u64(5);
        let external = first.try_get_with(0, &mut rng).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        assert_eq!(second.try_get_with(0, &mut rng).unwrap().noisy, external.noisy);
        fs::remove_dir_all(root).ok();
    }

    #[test]
    fn validation_items_are_padded_and_sorted() {
        let root = scratch_dir("validation");
        for i in [2, 10, 1] {
            write_png(&root.join(format!("data/{i}.png")), 30, 20);
            write_png(&root.join(format!("gt/{i}_clean.png")), 30, 20);
        }
        let config = LoaderConfig::new().with_canvas_size(32).with_policy(MatchPolicy::Strict);
        let dataset = ValidationDataset::new(&root, &config).unwrap();

        let names: Vec<_> = (0..3).map(|i| dataset.get(i).unwrap().noisy_name).collect();
        assert_eq!(names, ["1.png", "10.png", "2.png"]);

        let item = dataset.get(0).unwrap();
        assert_eq!(item.clean.dim(), (3, 32, 32));
        assert_eq!(
            item.region,
            Region {
                top: 6,
                left: 1,
                height: 20,
                width: 30
            }
        );
        assert_eq!(item.clean[[0, 0, 0]], 0.0);
        fs::remove_dir_all(root).ok();
    }

    #[test]
    fn validation_rejects_small_canvas() {
        let root = paired_root("canvas", 40, 40);
        let dataset = ValidationDataset::new(&root, &LoaderConfig::new().with_canvas_size(32)).unwrap();
        assert!(matches!(dataset.try_get(0), Err(DatasetError::Padding(_))));
        fs::remove_dir_all(root).ok();
    }

    #[test]
    fn unpaired_test_layout() {
        let root = scratch_dir("unpaired");
        write_png(&root.join("input/b.png"), 6, 5);
        write_png(&root.join("input/a.png"), 6, 5);
        let dataset = UnpairedDataset::test(&root).unwrap();

        assert_eq!(dataset.len(), 2);
        let item = dataset.get(0).unwrap();
        assert_eq!(item.name, "a.png");
        assert_eq!(item.image.dim(), (3, 5, 6));
        assert_eq!(dataset.try_get(3).unwrap().name, "b.png");
        fs::remove_dir_all(root).ok();
    }

    #[test]
    fn empty_dataset_reports_empty() {
        let root = scratch_dir("empty");
        fs::create_dir_all(root.join("input")).unwrap();
        let dataset = UnpairedDataset::test(&root).unwrap();
        assert_eq!(dataset.len(), 0);
        assert!(matches!(dataset.try_get(0), Err(DatasetError::Empty)));
        fs::remove_dir_all(root).ok();
    }
}
