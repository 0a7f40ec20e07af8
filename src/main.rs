use anyhow::{ensure, Context, Result};
use clap::Parser;
use rayon::ThreadPoolBuilder;
use tracing_subscriber::EnvFilter;

use cnn_features::{Config, ImageProcessor};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::parse();
    config.validate()?;

    ensure!(config.model_path.exists(), "Model path does not exist");
    ensure!(config.input_dir.exists(), "Input directory does not exist");

    // normalization fans out over this pool
    ThreadPoolBuilder::new()
        .num_threads(config.num_threads)
        .build_global()?;

    let model_path = config.model_path.clone();
    let mut processor = ImageProcessor::with_onnx_model(config)
        .with_context(|| format!("Failed to load model: {}", model_path.display()))?;

    let processed = processor.process_directory()?;
    tracing::info!("Processed {processed} image(s)");

    Ok(())
}
