use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use burn::backend::wgpu::WgpuDevice;
use burn::backend::{NdArray, Wgpu};
use burn::config::Config;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use restore_data::config::{EvalConfig, LoaderConfig};
use restore_data::infer::infer;
use restore_data::matcher::MatchPolicy;
use restore_data::model::RestorerConfig;

/// Restore a validation set and report PSNR/SSIM against ground truth.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Validation root holding `data/` and `gt/`
    #[arg(long, default_value = "./test/")]
    input_dir: PathBuf,

    /// Directory for restored images
    #[arg(long, default_value = "./results/")]
    result_dir: PathBuf,

    /// Safetensors checkpoint; without one the degraded inputs are scored
    #[arg(long)]
    weights: Option<PathBuf>,

    /// Convolution layers in the restorer
    #[arg(long, default_value_t = 3)]
    num_layers: usize,

    /// Disable the global residual connection
    #[arg(long)]
    no_residual: bool,

    /// Side of the square canvas images are padded onto
    #[arg(long, default_value_t = 768)]
    canvas: usize,

    /// Skip writing restored images
    #[arg(long)]
    no_save_images: bool,

    /// Fail on degraded file names without a numeric id
    #[arg(long)]
    strict: bool,

    /// JSON evaluation config; replaces the flags above
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run on the wgpu backend instead of the CPU
    #[arg(long)]
    gpu: bool,
}

impl Cli {
    fn eval_config(&self) -> Result<EvalConfig> {
        if let Some(path) = &self.config {
            return EvalConfig::load(path).with_context(|| format!("failed to load config {}", path.display()));
        }

        let policy = if self.strict {
            MatchPolicy::Strict
        } else {
            MatchPolicy::Lenient
        };
        let loader = LoaderConfig::new()
            .with_canvas_size(self.canvas)
            .with_policy(policy);
        let restorer = RestorerConfig::new()
            .with_num_layers(self.num_layers)
            .with_residual(!self.no_residual);

        Ok(EvalConfig::new(self.input_dir.to_string_lossy().into_owned(), loader, restorer)
            .with_result_dir(self.result_dir.to_string_lossy().into_owned())
            .with_weights(self.weights.as_ref().map(|p| p.to_string_lossy().into_owned()))
            .with_save_images(!self.no_save_images))
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = cli.eval_config()?;

    if !PathBuf::from(&config.input_dir).exists() {
        anyhow::bail!("Input directory does not exist: {:?}", config.input_dir);
    }
    std::fs::create_dir_all(&config.result_dir)
        .with_context(|| format!("failed to create {}", config.result_dir))?;
    config
        .save(format!("{}/config.json", config.result_dir))
        .context("failed to save config")?;

    let summary = if cli.gpu {
        infer::<Wgpu>(&config, &WgpuDevice::default())?
    } else {
        infer::<NdArray>(&config, &Default::default())?
    };

    let report = PathBuf::from(&config.result_dir).join("metrics.json");
    let file = File::create(&report).with_context(|| format!("failed to create {}", report.display()))?;
    serde_json::to_writer_pretty(file, &summary).context("failed to write metrics report")?;
    tracing::info!("Metrics written to {}", report.display());
    Ok(())
}
