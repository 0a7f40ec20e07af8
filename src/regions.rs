//! Candidate region generation over an image.
//!
//! Regions come from one of three producers: the whole image, a dense grid of
//! square sliding windows, or a precomputed box list (see [`crate::io`]).
//! Sliding windows can additionally be pruned against a foreground mask to
//! keep only background-like windows.

use std::path::Path;

use image::{imageops, imageops::FilterType, GenericImageView, GrayImage};

use crate::errors::{FeatureError, Result};
use crate::region::Region;

/// Parameters of the sliding window grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlidingWindowConfig {
    /// Window side as a fraction of the image side.
    pub window_ratio: f32,
    pub min_size_x: u32,
    pub min_size_y: u32,
    /// Stride as a fraction of the window side.
    pub stride_ratio: f32,
    pub min_stride: u32,
}

impl Default for SlidingWindowConfig {
    fn default() -> Self {
        Self {
            window_ratio: 0.2,
            min_size_x: 50,
            min_size_y: 50,
            stride_ratio: 0.5,
            min_stride: 10,
        }
    }
}

impl SlidingWindowConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.window_ratio > 0.0 && self.window_ratio <= 1.0) {
            return Err(FeatureError::invalid_argument(
                "window_ratio",
                format!("must be in (0, 1], got {}", self.window_ratio),
            ));
        }
        if !(self.stride_ratio > 0.0) {
            return Err(FeatureError::invalid_argument(
                "stride_ratio",
                format!("must be positive, got {}", self.stride_ratio),
            ));
        }
        if self.min_size_x == 0 || self.min_size_y == 0 || self.min_stride == 0 {
            return Err(FeatureError::invalid_argument(
                "sliding window",
                "minimum window size and stride must be at least 1",
            ));
        }
        Ok(())
    }

    /// Side of the square window for an image of the given size.
    pub fn window_size(&self, width: u32, height: u32) -> u32 {
        let x = ((self.window_ratio * width as f32) as u32).max(self.min_size_x);
        let y = ((self.window_ratio * height as f32) as u32).max(self.min_size_y);
        x.min(y)
    }

    /// Step between consecutive windows along both axes.
    pub fn stride(&self, window: u32) -> u32 {
        ((self.stride_ratio * window as f32) as u32).max(self.min_stride)
    }
}

/// Dense square windows over a `width` x `height` image.
///
/// Window origins run over `x < width - side` (outer) and
/// `y < height - side` (inner). An image not larger than one window yields
/// no windows.
pub fn sliding_windows(width: u32, height: u32, config: &SlidingWindowConfig) -> Vec<Region> {
    let side = config.window_size(width, height);
    let stride = config.stride(side).max(1) as usize;
    if side == 0 || width <= side || height <= side {
        return Vec::new();
    }

    (0..width - side)
        .step_by(stride)
        .flat_map(|x| {
            (0..height - side)
                .step_by(stride)
                .filter_map(move |y| Region::new(x, y, side, side).ok())
        })
        .collect()
}

/// Fraction of `region` covered by foreground in `mask`, in `[0, 1]`.
///
/// The mask is read as intensities where 255 is full foreground; the sum is
/// taken directly over the region.
pub fn foreground_fraction(mask: &GrayImage, region: &Region) -> f32 {
    if region.area() == 0 || !region.fits_within(mask.width(), mask.height()) {
        return 0.0;
    }
    let view = imageops::crop_imm(mask, region.x(), region.y(), region.width(), region.height());
    let sum: u64 = view.pixels().map(|(_, _, p)| p[0] as u64).sum();
    (sum as f64 / (255.0 * region.area() as f64)) as f32
}

/// Keep only the regions whose foreground fraction is below `threshold`.
///
/// The mask is resized to the image size first. `threshold` must lie in
/// `(0, 1]`, so regions without foreground are always kept.
pub fn prune_with_mask(
    mask: &GrayImage,
    image_size: (u32, u32),
    regions: &[Region],
    threshold: f32,
) -> Result<Vec<Region>> {
    validate_threshold(threshold)?;
    let (width, height) = image_size;
    let resized;
    let mask = if mask.dimensions() == image_size {
        mask
    } else {
        resized = imageops::resize(mask, width, height, FilterType::Triangle);
        &resized
    };

    Ok(regions
        .iter()
        .filter(|r| foreground_fraction(mask, r) < threshold)
        .copied()
        .collect())
}

pub fn validate_threshold(threshold: f32) -> Result<()> {
    if threshold > 0.0 && threshold <= 1.0 {
        Ok(())
    } else {
        Err(FeatureError::invalid_argument(
            "bg_threshold",
            format!("must be in (0, 1], got {threshold}"),
        ))
    }
}

/// Load a segmentation mask as grayscale.
pub fn load_mask(path: &Path) -> Result<GrayImage> {
    if !path.is_file() {
        return Err(FeatureError::FileSystem {
            path: path.to_path_buf(),
            operation: "mask lookup".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "mask file does not exist"),
        });
    }
    let mask = image::open(path).map_err(|e| FeatureError::ImageProcessing {
        path: path.display().to_string(),
        operation: "mask loading".to_string(),
        source: Box::new(e),
    })?;
    Ok(mask.into_luma8())
}
