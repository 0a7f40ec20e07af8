use image::RgbImage;
use ndarray::ArrayD;

use crate::batch::{ImageBatch, Padding};
use crate::errors::Result;

/// A loaded network that turns a batch of crops into a feature tensor.
///
/// The extractor depends on this abstraction rather than on a concrete engine,
/// so it can be driven by ONNX Runtime in production and by a deterministic
/// stub in tests.
///
/// `forward` takes `&mut self`: a backend owns a single output buffer that is
/// overwritten by every call, so calls on one instance are strictly
/// sequential.
pub trait InferenceBackend {
    /// Run the network on every slot of `batch` (padding included) and return
    /// the output of the layer called `layer`.
    ///
    /// The first axis of the returned tensor indexes batch slots; each slot
    /// owns a contiguous run of `len / batch.len()` values.
    fn forward(&mut self, batch: &ImageBatch<'_, RgbImage>, layer: &str) -> Result<ArrayD<f32>>;

    /// Padding the engine needs for a short final batch.
    fn padding(&self) -> Padding {
        Padding::RepeatFirst
    }

    /// Batch size the engine was built for, `None` if any size is accepted.
    fn fixed_batch_size(&self) -> Option<usize> {
        None
    }
}

impl<B: InferenceBackend + ?Sized> InferenceBackend for &mut B {
    fn forward(&mut self, batch: &ImageBatch<'_, RgbImage>, layer: &str) -> Result<ArrayD<f32>> {
        (**self).forward(batch, layer)
    }

    fn padding(&self) -> Padding {
        (**self).padding()
    }

    fn fixed_batch_size(&self) -> Option<usize> {
        (**self).fixed_batch_size()
    }
}
