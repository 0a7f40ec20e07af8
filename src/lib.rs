pub mod batch;
pub mod config;
pub mod debug;
pub mod errors;
pub mod extractor;
pub mod io;
pub mod model;
pub mod normalize;
pub mod pool;
pub mod region;
pub mod regions;
pub mod traits;

pub mod mocks;

use image::{GrayImage, RgbImage};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};

pub use batch::{BatchPartitioner, ImageBatch, Padding};
pub use config::{Config, RegionSource};
pub use errors::{FeatureError, Result};
pub use extractor::{extract_features, FeatureExtractor, FeatureSet, FeatureVector};
pub use model::OnnxBackend;
pub use normalize::l2_normalize;
pub use pool::{pool, pool_in_place, PoolStrategy};
pub use region::Region;
pub use traits::InferenceBackend;

/// Per-image pipeline: regions, crops, features, normalization and pooling.
pub struct ImageProcessor<B: InferenceBackend> {
    extractor: FeatureExtractor<B>,
    config: Config,
}

impl<B: InferenceBackend> ImageProcessor<B> {
    pub fn new(backend: B, config: Config) -> Result<Self> {
        config.validate()?;
        if let Some(fixed) = backend.fixed_batch_size() {
            if fixed != config.batch_size {
                return Err(FeatureError::Configuration {
                    message: format!(
                        "model only accepts batches of {fixed}, but batch size is {}",
                        config.batch_size
                    ),
                });
            }
        }
        let extractor = FeatureExtractor::new(backend, config.layer.clone(), config.batch_size)?;
        Ok(Self { extractor, config })
    }

    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Extract descriptors for every image under the input directory and
    /// write them to the output directory, one `.txt` per image.
    ///
    /// Images are processed one after another since the backend is not
    /// reentrant. Returns the number of images processed.
    pub fn process_directory(&mut self) -> Result<usize> {
        let input_path = self.config.input_dir.clone();
        let output_path = self.config.output_dir.clone();

        let image_files = io::collect_images(&input_path);
        if image_files.is_empty() {
            tracing::warn!("No images to process in {}", input_path.display());
            return Ok(0);
        }

        fs::create_dir_all(&output_path).map_err(|e| FeatureError::FileSystem {
            path: output_path.clone(),
            operation: "output directory creation".to_string(),
            source: e,
        })?;

        let pb = ProgressBar::new(image_files.len() as u64);
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
        ) {
            pb.set_style(style.progress_chars("#>-"));
        }

        for relative in &image_files {
            let features = self.process_single_image(relative)?;
            let output_file = output_path.join(relative).with_extension("txt");
            io::write_features(&output_file, &features)?;
            pb.inc(1);
        }

        pb.finish_and_clear();
        tracing::info!(
            "Wrote features of {} image(s) to {}",
            image_files.len(),
            output_path.display()
        );
        Ok(image_files.len())
    }

    /// Run the pipeline on one image, given relative to the input directory.
    pub fn process_single_image(&mut self, relative: &Path) -> Result<FeatureSet> {
        let input_file = self.config.input_dir.join(relative);
        let image = image::open(&input_file)
            .map_err(|e| FeatureError::ImageProcessing {
                path: input_file.display().to_string(),
                operation: "image loading".to_string(),
                source: Box::new(e),
            })?
            .into_rgb8();

        let (regions, mask) = self.collect_regions(relative, &image)?;
        if regions.is_empty() {
            tracing::warn!("No regions for {}", relative.display());
        }

        let crops = regions
            .iter()
            .map(|region| region.crop(&image))
            .collect::<Result<Vec<_>>>()?;

        if let Some(debug_dir) = &self.config.debug_dir {
            let dir = debug_dir.join(relative.with_extension(""));
            debug::store_windows(&dir, &crops, &image, mask.as_ref())?;
        }

        self.describe(&crops)
    }

    /// Features for already cropped regions, normalized and pooled as
    /// configured.
    pub fn describe(&mut self, crops: &[RgbImage]) -> Result<FeatureSet> {
        let mut features = self.extractor.extract(crops)?;
        if self.config.normalize {
            normalize::l2_normalize(&mut features);
        }
        if let Some(strategy) = self.config.pool {
            pool::pool_in_place(&mut features, strategy)?;
        }
        Ok(features)
    }

    /// Regions of `image` according to the configured source, with the mask
    /// used for pruning if any.
    ///
    /// A missing mask or box file yields no regions.
    fn collect_regions(
        &self,
        relative: &Path,
        image: &RgbImage,
    ) -> Result<(Vec<Region>, Option<GrayImage>)> {
        let (width, height) = image.dimensions();
        match self.config.regions {
            RegionSource::Full => Ok((vec![Region::full(width, height)?], None)),
            RegionSource::Sliding => Ok((
                regions::sliding_windows(width, height, &self.config.sliding_windows()),
                None,
            )),
            RegionSource::Pruned => {
                let mask_path = companion_path(self.config.mask_dir.as_deref(), relative, "png")?;
                let mask = match regions::load_mask(&mask_path) {
                    Ok(mask) => mask,
                    Err(e) if e.is_not_found() => {
                        tracing::warn!("Mask {} not found", mask_path.display());
                        return Ok((Vec::new(), None));
                    }
                    Err(e) => return Err(e),
                };
                let windows =
                    regions::sliding_windows(width, height, &self.config.sliding_windows());
                let kept = regions::prune_with_mask(
                    &mask,
                    (width, height),
                    &windows,
                    self.config.bg_threshold,
                )?;
                tracing::debug!(
                    "{}: kept {}/{} background windows",
                    relative.display(),
                    kept.len(),
                    windows.len()
                );
                Ok((kept, Some(mask)))
            }
            RegionSource::File => {
                let bbox_path = companion_path(self.config.bbox_dir.as_deref(), relative, "txt")?;
                let boxes = io::load_regions(&bbox_path)?;
                let (inside, outside): (Vec<Region>, Vec<Region>) = boxes
                    .into_iter()
                    .partition(|r| r.fits_within(width, height));
                if !outside.is_empty() {
                    tracing::warn!(
                        "{}: dropped {} box(es) outside the image",
                        relative.display(),
                        outside.len()
                    );
                }
                Ok((inside, None))
            }
        }
    }
}

/// Path of the file accompanying `relative` in a mirrored directory tree.
fn companion_path(dir: Option<&Path>, relative: &Path, extension: &str) -> Result<PathBuf> {
    let dir = dir.ok_or_else(|| FeatureError::Configuration {
        message: format!("no directory configured for `.{extension}` companions"),
    })?;
    Ok(dir.join(relative).with_extension(extension))
}

impl ImageProcessor<OnnxBackend> {
    pub fn with_onnx_model(config: Config) -> Result<Self> {
        let backend = OnnxBackend::new(&config.model_path, &config.backend_options())?;
        Self::new(backend, config)
    }
}
