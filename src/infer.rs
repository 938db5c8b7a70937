use std::fs;
use std::path::Path;
use std::time::Instant;

use burn::data::dataset::Dataset;
use burn::tensor::backend::Backend;
use serde::{Serialize, Serializer};

use crate::batcher::{chw_to_tensor, tensor_to_chw};
use crate::checkpoint::StateDict;
use crate::config::EvalConfig;
use crate::dataset::ValidationDataset;
use crate::error::EvalError;
use crate::image_io::save_chw;
use crate::metrics::{psnr_luma, ssim_luma};
use crate::model::{Identity, Restorer};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ImageScore {
    pub name: String,
    #[serde(serialize_with = "score_value")]
    pub psnr: f64,
    #[serde(serialize_with = "score_value")]
    pub ssim: f64,
    pub latency_ms: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct EvalSummary {
    pub samples: usize,
    #[serde(serialize_with = "score_value")]
    pub mean_psnr: f64,
    #[serde(serialize_with = "score_value")]
    pub mean_ssim: f64,
    pub mean_latency_ms: f64,
    pub per_image: Vec<ImageScore>,
}

// JSON has no infinity; identical images score "inf" rather than null.
fn score_value<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() {
        serializer.serialize_f64(*value)
    } else if value.is_nan() {
        serializer.serialize_str("nan")
    } else if value.is_sign_positive() {
        serializer.serialize_str("inf")
    } else {
        serializer.serialize_str("-inf")
    }
}

impl EvalSummary {
    fn from_scores(per_image: Vec<ImageScore>) -> Self {
        let samples = per_image.len();
        if samples == 0 {
            return Self::default();
        }

        let mean = |f: fn(&ImageScore) -> f64| per_image.iter().map(f).sum::<f64>() / samples as f64;
        Self {
            samples,
            mean_psnr: mean(|s| s.psnr),
            mean_ssim: mean(|s| s.ssim),
            mean_latency_ms: mean(|s| s.latency_ms),
            per_image,
        }
    }
}

/// The checkpointed restorer named by `config.weights`, or [`Identity`] without one.
pub fn load_restorer<B: Backend + 'static>(
    config: &EvalConfig,
    device: &B::Device,
) -> Result<Box<dyn Restorer<B>>, EvalError> {
    match &config.weights {
        Some(weights) => {
            let dict = StateDict::load(Path::new(weights))?;
            let model = config.restorer.init_from::<B>(&dict, device)?;
            tracing::info!("===>Testing using weights: {weights} ({} layers)", model.num_layers());
            Ok(Box::new(model))
        }
        None => {
            tracing::warn!("No weights given, scoring the degraded inputs");
            Ok(Box::new(Identity))
        }
    }
}

/// Restore every validation pair, score it against ground truth on the source
/// region, and optionally write the restored image into `result_dir`.
pub fn evaluate<B: Backend, R: Restorer<B> + ?Sized>(
    restorer: &R,
    dataset: &ValidationDataset,
    result_dir: Option<&Path>,
    device: &B::Device,
) -> Result<EvalSummary, EvalError> {
    if let Some(dir) = result_dir {
        fs::create_dir_all(dir).map_err(|source| EvalError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let mut scores = Vec::with_capacity(dataset.len());
    for index in 0..dataset.len() {
        let item = dataset.try_get(index)?;
        let (channels, height, width) = item.noisy.dim();
        let noisy = chw_to_tensor::<B>(&item.noisy, device).unsqueeze::<4>();

        let start = Instant::now();
        let restored = restorer.restore(noisy).clamp(0.0, 1.0);
        let dims = restored.dims();
        if dims != [1, channels, height, width] {
            return Err(EvalError::ShapeMismatch {
                name: item.noisy_name,
                expected: vec![1, channels, height, width],
                actual: dims.to_vec(),
            });
        }
        let restored = tensor_to_chw(restored.squeeze::<3>(0)).map_err(|_| EvalError::ShapeMismatch {
            name: item.noisy_name.clone(),
            expected: vec![channels, height, width],
            actual: dims.to_vec(),
        })?;
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

        let restored = item.region.extract(&restored);
        let target = item.region.extract(&item.clean);
        let score = ImageScore {
            psnr: psnr_luma(&restored, &target)?,
            ssim: ssim_luma(&restored, &target)?,
            latency_ms,
            name: item.clean_name,
        };
        tracing::debug!(
            "{}: PSNR {:.4}, SSIM {:.4}, {:.2} ms",
            score.name,
            score.psnr,
            score.ssim,
            score.latency_ms
        );

        if let Some(dir) = result_dir {
            let path = dir.join(&score.name);
            save_chw(&restored, &path).map_err(|source| EvalError::Save { path, source })?;
        }
        scores.push(score);
    }

    let summary = EvalSummary::from_scores(scores);
    tracing::info!(
        "[RESULTS] PSNR: {:.4}, SSIM: {:.4}, Average time: {:.4} ms",
        summary.mean_psnr,
        summary.mean_ssim,
        summary.mean_latency_ms
    );
    Ok(summary)
}

/// Build the dataset and restorer described by `config` and evaluate.
pub fn infer<B: Backend + 'static>(config: &EvalConfig, device: &B::Device) -> Result<EvalSummary, EvalError> {
    let dataset = ValidationDataset::new(Path::new(&config.input_dir), &config.loader)?;
    let restorer = load_restorer::<B>(config, device)?;
    let result_dir = Path::new(&config.result_dir);

    evaluate(
        restorer.as_ref(),
        &dataset,
        config.save_images.then_some(result_dir),
        device,
    )
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::LoaderConfig;
    use crate::matcher::test::{scratch_dir, write_png};
    use crate::model::RestorerConfig;
    use burn::backend::NdArray;
    use burn::tensor::Tensor;

    type TestBackend = NdArray<f32>;

    fn validation_root(tag: &str) -> std::path::PathBuf {
        let root = scratch_dir(tag);
        for i in [4, 9] {
            write_png(&root.join(format!("data/{i}.png")), 24, 16);
            write_png(&root.join(format!("gt/{i}_clean.png")), 24, 16);
        }
        root
    }

    fn eval_config(root: &Path, restorer: RestorerConfig) -> EvalConfig {
        EvalConfig::new(
            root.to_string_lossy().into_owned(),
            LoaderConfig::new().with_canvas_size(32),
            restorer,
        )
        .with_result_dir(root.join("results").to_string_lossy().into_owned())
    }

    struct Darken;

    impl<B: Backend> Restorer<B> for Darken {
        fn restore(&self, noisy: Tensor<B, 4>) -> Tensor<B, 4> {
            noisy * 0.5
        }
    }

    struct Crop;

    impl<B: Backend> Restorer<B> for Crop {
        fn restore(&self, noisy: Tensor<B, 4>) -> Tensor<B, 4> {
            let [n, c, h, w] = noisy.dims();
            noisy.slice([0..n, 0..c, 0..h - 1, 0..w])
        }
    }

    #[test]
    fn identity_on_matching_pairs_is_perfect() {
        let root = validation_root("eval_identity");
        let config = eval_config(&root, RestorerConfig::new());
        let summary = infer::<TestBackend>(&config, &Default::default()).unwrap();

        assert_eq!(summary.samples, 2);
        assert_eq!(summary.mean_psnr, f64::INFINITY);
        assert!((summary.mean_ssim - 1.0).abs() < 1e-12);
        assert_eq!(summary.per_image[0].name, "4_clean.png");

        let saved = image::open(root.join("results/9_clean.png")).unwrap().into_rgb8();
        assert_eq!(saved.dimensions(), (24, 16));
        fs::remove_dir_all(root).ok();
    }

    #[test]
    fn degraded_output_lowers_scores() {
        let root = validation_root("eval_darken");
        let dataset = ValidationDataset::new(&root, &LoaderConfig::new().with_canvas_size(32)).unwrap();
        let summary = evaluate::<TestBackend, _>(&Darken, &dataset, None, &Default::default()).unwrap();

        assert!(summary.mean_psnr.is_finite());
        assert!(summary.mean_psnr < 30.0);
        assert!(summary.mean_ssim < 1.0);
        assert!(!root.join("results").exists());
        fs::remove_dir_all(root).ok();
    }

    #[test]
    fn wrong_output_shape_is_reported() {
        let root = validation_root("eval_shape");
        let dataset = ValidationDataset::new(&root, &LoaderConfig::new().with_canvas_size(32)).unwrap();
        let result = evaluate::<TestBackend, _>(&Crop, &dataset, None, &Default::default());
        assert!(matches!(result, Err(EvalError::ShapeMismatch { .. })));
        fs::remove_dir_all(root).ok();
    }

    #[test]
    fn checkpoint_weights_drive_the_restorer() {
        let root = validation_root("eval_weights");
        let mut dict = StateDict::new();
        dict.insert("module.layers.0.weight", vec![3, 3, 3, 3], vec![0.0; 81]);
        dict.insert("module.layers.0.bias", vec![3], vec![0.0; 3]);
        let weights = root.join("model_best.safetensors");
        dict.save(&weights).unwrap();

        let config = eval_config(&root, RestorerConfig::new().with_num_layers(1))
            .with_weights(Some(weights.to_string_lossy().into_owned()))
            .with_save_images(false);
        let summary = infer::<TestBackend>(&config, &Default::default()).unwrap();

        // zero body plus residual is the identity
        assert_eq!(summary.mean_psnr, f64::INFINITY);
        assert!(!root.join("results").exists());
        fs::remove_dir_all(root).ok();
    }

    #[test]
    fn mismatched_checkpoint_fails_loading() {
        let root = validation_root("eval_badckpt");
        let mut dict = StateDict::new();
        dict.insert("net.layers.0.weight", vec![3, 3, 3, 3], vec![0.0; 81]);
        let weights = root.join("model.safetensors");
        dict.save(&weights).unwrap();

        let config = eval_config(&root, RestorerConfig::new()).with_weights(Some(weights.to_string_lossy().into_owned()));
        let result = load_restorer::<TestBackend>(&config, &Default::default());
        assert!(matches!(
            result,
            Err(EvalError::Checkpoint(crate::error::CheckpointError::FormatError { .. }))
        ));
        fs::remove_dir_all(root).ok();
    }

    #[test]
    fn perfect_scores_survive_the_json_report() {
        let summary = EvalSummary::from_scores(vec![
            ImageScore {
                name: "1_clean.png".to_string(),
                psnr: f64::INFINITY,
                ssim: 1.0,
                latency_ms: 2.0,
            },
            ImageScore {
                name: "2_clean.png".to_string(),
                psnr: 30.0,
                ssim: 0.5,
                latency_ms: 4.0,
            },
        ]);
        let json = serde_json::to_value(&summary).unwrap();

        assert_eq!(json["mean_psnr"], "inf");
        assert_eq!(json["mean_ssim"], 0.75);
        assert_eq!(json["mean_latency_ms"], 3.0);
        assert_eq!(json["per_image"][0]["psnr"], "inf");
        assert_eq!(json["per_image"][1]["psnr"], 30.0);
    }

    #[test]
    fn empty_summary_is_zeroed() {
        assert_eq!(EvalSummary::from_scores(Vec::new()), EvalSummary::default());
    }
}
