use crate::batch::{ImageBatch, Padding};
use crate::errors::{FeatureError, Result};
use crate::traits::InferenceBackend;
use image::{Rgb, RgbImage};
use ndarray::{ArrayD, IxDyn};

/// Deterministic backend for tests.
///
/// Each slot's feature vector is `[p, p + 1, ..., p + dim - 1]` where `p` is
/// the red channel of the slot image's top-left pixel. The output is shaped
/// `[batch, dim, 1, 1]` like a convolutional layer.
#[derive(Debug, Clone)]
pub struct StubBackend {
    layer: String,
    dim: usize,
    padding: Padding,
    fixed_batch: Option<usize>,
    batch_sizes: Vec<usize>,
}

impl StubBackend {
    pub fn new(layer: &str, dim: usize) -> Self {
        Self {
            layer: layer.to_string(),
            dim,
            padding: Padding::RepeatFirst,
            fixed_batch: None,
            batch_sizes: Vec::new(),
        }
    }

    pub const fn with_padding(mut self, padding: Padding) -> Self {
        self.padding = padding;
        self
    }

    /// Report `batch_size` as the only accepted batch size.
    pub const fn with_fixed_batch(mut self, batch_size: usize) -> Self {
        self.fixed_batch = Some(batch_size);
        self
    }

    /// Slot count of every forward call so far, in call order.
    pub fn batch_sizes(&self) -> &[usize] {
        &self.batch_sizes
    }
}

impl InferenceBackend for StubBackend {
    fn forward(&mut self, batch: &ImageBatch<'_, RgbImage>, layer: &str) -> Result<ArrayD<f32>> {
        self.batch_sizes.push(batch.len());
        if layer != self.layer {
            return Err(FeatureError::inference(
                "forward",
                format!("unknown layer `{layer}`"),
            ));
        }

        let values = batch
            .iter()
            .flat_map(|image| {
                let base = image.get_pixel_checked(0, 0).map_or(0.0, |p| p[0] as f32);
                (0..self.dim).map(move |k| base + k as f32)
            })
            .collect();
        Ok(ArrayD::from_shape_vec(
            IxDyn(&[batch.len(), self.dim, 1, 1]),
            values,
        )?)
    }

    fn padding(&self) -> Padding {
        self.padding
    }

    fn fixed_batch_size(&self) -> Option<usize> {
        self.fixed_batch
    }
}

/// Solid-colour test image whose every channel equals `value`.
pub fn solid_image(width: u32, height: u32, value: u8) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb([value, value, value]))
}
