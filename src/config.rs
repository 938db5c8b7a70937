use burn::config::Config;

use crate::matcher::MatchPolicy;
use crate::model::RestorerConfig;

/// Settings shared by every dataset variant.
#[derive(Config, Debug)]
pub struct LoaderConfig {
    /// Sub-folder holding the degraded images.
    #[config(default = "String::from(\"data\")")]
    pub input_dir: String,

    /// Sub-folder holding the `{id}_clean` ground truth.
    #[config(default = "String::from(\"gt\")")]
    pub gt_dir: String,

    /// Side of the square training patch.
    #[config(default = 128)]
    pub patch_size: usize,

    /// Side of the square canvas validation images are padded onto.
    #[config(default = 768)]
    pub canvas_size: usize,

    /// Gaussian noise std in 8-bit units.
    #[config(default = 5.0)]
    pub noise_level: f32,

    #[config(default = "MatchPolicy::Lenient")]
    pub policy: MatchPolicy,

    /// Fixed seed for the dataset's generator; entropy when absent.
    #[config(default = "None")]
    pub seed: Option<u64>,
}

#[derive(Config, Debug)]
pub struct EvalConfig {
    pub input_dir: String,

    #[config(default = "String::from(\"./results\")")]
    pub result_dir: String,

    /// Safetensors checkpoint; the identity baseline runs without one.
    #[config(default = "None")]
    pub weights: Option<String>,

    #[config(default = true)]
    pub save_images: bool,

    pub loader: LoaderConfig,

    pub restorer: RestorerConfig,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_follow_reference_layout() {
        let config = LoaderConfig::new();
        assert_eq!(config.input_dir, "data");
        assert_eq!(config.gt_dir, "gt");
        assert_eq!(config.patch_size, 128);
        assert_eq!(config.canvas_size, 768);
        assert_eq!(config.policy, MatchPolicy::Lenient);
        assert!(config.seed.is_none());
    }

    #[test]
    fn eval_config_survives_json() {
        let config = EvalConfig::new(
            "./val".to_string(),
            LoaderConfig::new().with_seed(Some(7)).with_canvas_size(256),
            RestorerConfig::new().with_num_layers(5),
        );
        let path = std::env::temp_dir().join(format!("restore_data_config_{}.json", std::process::id()));
        config.save(&path).unwrap();
        let loaded = EvalConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.input_dir, "./val");
        assert_eq!(loaded.loader.seed, Some(7));
        assert_eq!(loaded.loader.canvas_size, 256);
        assert_eq!(loaded.restorer.num_layers, 5);
        assert!(loaded.save_images);
    }
}
