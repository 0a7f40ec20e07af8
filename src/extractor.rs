use image::RgbImage;
use ndarray::ArrayD;

use crate::batch::{BatchPartitioner, ImageBatch};
use crate::errors::{FeatureError, Result};
use crate::traits::InferenceBackend;

/// Dense feature vector taken from one slot of a layer output.
pub type FeatureVector = Vec<f32>;

/// Feature vectors index-aligned with the input crops.
pub type FeatureSet = Vec<FeatureVector>;

/// Runs crops through an inference backend batch by batch and collects one
/// feature vector per crop.
pub struct FeatureExtractor<B: InferenceBackend> {
    backend: B,
    layer: String,
    partitioner: BatchPartitioner,
}

impl<B: InferenceBackend> FeatureExtractor<B> {
    /// The partitioner pads according to what the backend requires.
    pub fn new(backend: B, layer: impl Into<String>, batch_size: usize) -> Result<Self> {
        let layer = layer.into();
        if layer.is_empty() {
            return Err(FeatureError::invalid_argument("layer", "must not be empty"));
        }
        let partitioner = BatchPartitioner::new(batch_size)?.with_padding(backend.padding());
        Ok(Self {
            backend,
            layer,
            partitioner,
        })
    }

    pub fn layer(&self) -> &str {
        &self.layer
    }

    pub const fn batch_size(&self) -> usize {
        self.partitioner.batch_size()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Extract one feature vector per image, in input order.
    ///
    /// Batches run one after another; each layer output is fully copied out
    /// before the next forward call. Any backend failure aborts the run.
    pub fn extract(&mut self, images: &[RgbImage]) -> Result<FeatureSet> {
        let batches = self.partitioner.partition(images);
        let total = batches.len();
        let mut features = FeatureSet::with_capacity(images.len());
        let mut dim: Option<usize> = None;

        for batch in &batches {
            let tensor = self.backend.forward(batch, &self.layer)?;
            let vectors = split_batch_output(&tensor, batch)?;

            if let Some(first) = vectors.first() {
                match dim {
                    Some(expected) if expected != first.len() => {
                        return Err(FeatureError::Dimension {
                            context: format!(
                                "layer `{}` output of batch {}",
                                self.layer,
                                batch.index()
                            ),
                            expected,
                            actual: first.len(),
                        });
                    }
                    _ => dim = Some(first.len()),
                }
            }

            features.extend(vectors);
            tracing::debug!(
                "Batch {}/{} ({} images) done",
                batch.index() + 1,
                total,
                batch.real_len()
            );
        }

        debug_assert_eq!(features.len(), images.len());
        Ok(features)
    }
}

/// Copy the per-sample vectors of the real slots out of a layer output.
///
/// The output holds `batch.len()` contiguous slots of `D = len / batch.len()`
/// values; padding slots are skipped.
pub fn split_batch_output<T>(
    tensor: &ArrayD<f32>,
    batch: &ImageBatch<'_, T>,
) -> Result<FeatureSet> {
    let slots = batch.len();
    if slots == 0 {
        return Ok(FeatureSet::new());
    }
    if tensor.ndim() == 0 || tensor.shape()[0] != slots {
        return Err(FeatureError::Dimension {
            context: "layer output batch axis".to_string(),
            expected: slots,
            actual: tensor.shape().first().copied().unwrap_or(0),
        });
    }

    let dim = tensor.len() / slots;
    if dim == 0 {
        return Err(FeatureError::inference(
            "output extraction",
            format!("layer output {:?} has no features per slot", tensor.shape()),
        ));
    }

    let contiguous = tensor.as_standard_layout();
    let data = contiguous
        .as_slice()
        .ok_or_else(|| FeatureError::inference("output extraction", "tensor is not contiguous"))?;

    Ok(data
        .chunks_exact(dim)
        .take(batch.real_len())
        .map(<[f32]>::to_vec)
        .collect())
}

/// Extract features from `images` with a borrowed backend.
pub fn extract_features<B: InferenceBackend>(
    backend: &mut B,
    images: &[RgbImage],
    layer: &str,
    batch_size: usize,
) -> Result<FeatureSet> {
    FeatureExtractor::new(backend, layer, batch_size)?.extract(images)
}
