use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};

use crate::errors::{FeatureError, Result};
use crate::model::{BackendOptions, DEFAULT_MEAN_BGR};
use crate::pool::PoolStrategy;
use crate::regions::{validate_threshold, SlidingWindowConfig};

/// Where the regions of each image come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RegionSource {
    /// The whole image as a single region.
    Full,
    /// Dense square sliding windows.
    Sliding,
    /// Sliding windows, keeping only those mostly outside the foreground mask.
    Pruned,
    /// Boxes read from a `y1 x1 y2 x2` file per image.
    File,
}

#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Config {
    pub input_dir: PathBuf,

    #[arg(default_value = "output")]
    pub output_dir: PathBuf,

    #[arg(short, long)]
    pub model_path: PathBuf,

    /// Name of the network output used as feature vector.
    #[arg(short, long)]
    pub layer: String,

    #[arg(short, long, default_value_t = 16)]
    pub batch_size: usize,

    #[arg(short, long, value_enum, default_value_t = RegionSource::Full)]
    pub regions: RegionSource,

    /// Directory of segmentation masks, mirroring the input tree (`.png`).
    #[arg(long)]
    pub mask_dir: Option<PathBuf>,

    /// Directory of box files, mirroring the input tree (`.txt`).
    #[arg(long)]
    pub bbox_dir: Option<PathBuf>,

    /// Windows whose foreground fraction reaches this value are dropped.
    #[arg(long, default_value_t = 0.1)]
    pub bg_threshold: f32,

    #[arg(long, default_value_t = 0.2)]
    pub window_ratio: f32,

    #[arg(long, default_value_t = 50)]
    pub min_window: u32,

    #[arg(long, default_value_t = 0.5)]
    pub stride_ratio: f32,

    #[arg(long, default_value_t = 10)]
    pub min_stride: u32,

    /// Input side used when the model does not fix its spatial size.
    #[arg(long, default_value_t = 227)]
    pub input_size: u32,

    /// Per-channel means subtracted from the input, BGR order.
    #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_MEAN_BGR)]
    pub mean: Vec<f32>,

    /// L2-normalize every region descriptor.
    #[arg(short, long)]
    pub normalize: bool,

    /// Aggregate the region descriptors of an image into one.
    #[arg(short, long, value_parser = check_pool)]
    pub pool: Option<PoolStrategy>,

    #[arg(short, long, default_value_t = 0)]
    pub device_id: i32,

    /// Worker threads for inference and normalization, 0 picks a default.
    #[arg(long, default_value_t = 0)]
    pub num_threads: usize,

    /// Dump crops, image and mask of every processed image here.
    #[arg(long)]
    pub debug_dir: Option<PathBuf>,
}

impl Config {
    /// Check constraints between options that clap cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(FeatureError::invalid_argument(
                "batch_size",
                "must be at least 1",
            ));
        }
        if self.layer.is_empty() {
            return Err(FeatureError::invalid_argument("layer", "must not be empty"));
        }
        if self.input_size == 0 {
            return Err(FeatureError::invalid_argument(
                "input_size",
                "must be at least 1",
            ));
        }
        if self.mean.len() != 3 {
            return Err(FeatureError::invalid_argument(
                "mean",
                format!("expected 3 values, got {}", self.mean.len()),
            ));
        }

        match self.regions {
            RegionSource::Full => {}
            RegionSource::Sliding => self.sliding_windows().validate()?,
            RegionSource::Pruned => {
                self.sliding_windows().validate()?;
                validate_threshold(self.bg_threshold)?;
                require_dir("mask_dir", self.mask_dir.as_deref())?;
            }
            RegionSource::File => require_dir("bbox_dir", self.bbox_dir.as_deref())?,
        }
        Ok(())
    }

    pub fn sliding_windows(&self) -> SlidingWindowConfig {
        SlidingWindowConfig {
            window_ratio: self.window_ratio,
            min_size_x: self.min_window,
            min_size_y: self.min_window,
            stride_ratio: self.stride_ratio,
            min_stride: self.min_stride,
        }
    }

    pub fn backend_options(&self) -> BackendOptions {
        let mut mean_bgr = DEFAULT_MEAN_BGR;
        mean_bgr
            .iter_mut()
            .zip(&self.mean)
            .for_each(|(dst, src)| *dst = *src);
        BackendOptions {
            device_id: self.device_id,
            num_threads: self.num_threads,
            input_size: (self.input_size, self.input_size),
            mean_bgr,
        }
    }
}

fn require_dir(field: &str, dir: Option<&Path>) -> Result<()> {
    match dir {
        Some(_) => Ok(()),
        None => Err(FeatureError::Configuration {
            message: format!("`--{}` is required for this region source", field.replace('_', "-")),
        }),
    }
}

fn check_pool(s: &str) -> std::result::Result<PoolStrategy, String> {
    s.parse().map_err(|e: FeatureError| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["cnn-features", "images", "-m", "net.onnx", "-l", "fc7"];
        argv.extend_from_slice(args);
        Config::parse_from(argv)
    }

    #[test]
    fn test_defaults() -> Result<()> {
        let config = parse(&[]);
        config.validate()?;

        assert_eq!(config.output_dir, PathBuf::from("output"));
        assert_eq!(config.batch_size, 16);
        assert_eq!(config.regions, RegionSource::Full);
        assert_eq!(config.mean, DEFAULT_MEAN_BGR.to_vec());
        assert_eq!(config.pool, None);
        assert!(!config.normalize);
        Ok(())
    }

    #[test]
    fn test_pool_parsing() {
        let config = parse(&["--pool", "avg", "--normalize"]);
        assert_eq!(config.pool, Some(PoolStrategy::Avg));
        assert!(config.normalize);

        let mut argv = vec!["cnn-features", "images", "-m", "net.onnx", "-l", "fc7"];
        argv.extend_from_slice(&["--pool", "max"]);
        assert!(Config::try_parse_from(argv).is_err());
    }

    #[test]
    fn test_validation() {
        let mut config = parse(&[]);
        config.batch_size = 0;
        assert!(config.validate().unwrap_err().is_configuration());

        let config = parse(&["--regions", "pruned"]);
        assert!(config.validate().is_err());

        let config = parse(&["--regions", "pruned", "--mask-dir", "masks"]);
        assert!(config.validate().is_ok());

        let config = parse(&["--regions", "pruned", "--mask-dir", "m", "--bg-threshold", "0"]);
        assert!(config.validate().is_err());

        let config = parse(&["--regions", "file"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_backend_options() {
        let config = parse(&["--mean", "1,2,3", "--input-size", "224", "-d", "1"]);
        let options = config.backend_options();
        assert_eq!(options.mean_bgr, [1.0, 2.0, 3.0]);
        assert_eq!(options.input_size, (224, 224));
        assert_eq!(options.device_id, 1);
    }
}
