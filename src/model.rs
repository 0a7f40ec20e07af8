use std::path::Path;

use crate::{
    batch::{ImageBatch, Padding},
    errors::{FeatureError, Result},
    traits::InferenceBackend,
};
use image::{imageops, imageops::FilterType, RgbImage};
use ndarray::prelude::*;
use nshare::AsNdarray3;
use ort::value::TensorRef;
use ort::{
    execution_providers::{CUDAExecutionProvider, TensorRTExecutionProvider},
    session::{builder::SessionBuilder, Session},
};

/// Caffe ImageNet channel means, BGR order.
pub const DEFAULT_MEAN_BGR: [f32; 3] = [104.0, 117.0, 123.0];

#[derive(Debug, Clone)]
pub struct BackendOptions {
    pub device_id: i32,
    /// Intra-op threads, 0 lets ONNX Runtime decide.
    pub num_threads: usize,
    /// Input (width, height) used when the model leaves its spatial axes
    /// dynamic.
    pub input_size: (u32, u32),
    pub mean_bgr: [f32; 3],
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            device_id: 0,
            num_threads: 0,
            input_size: (227, 227),
            mean_bgr: DEFAULT_MEAN_BGR,
        }
    }
}

/// ONNX Runtime session holding the loaded network.
///
/// Weights are loaded once by [`OnnxBackend::new`] and released when the
/// backend is dropped.
pub struct OnnxBackend {
    session: Session,
    input_name: String,
    input_size: (u32, u32),
    fixed_batch: Option<usize>,
    mean_bgr: [f32; 3],
}

impl OnnxBackend {
    pub fn new(model_path: &Path, options: &BackendOptions) -> Result<Self> {
        let mut session = SessionBuilder::new()
            .map_err(|e| FeatureError::Inference {
                operation: "session builder initialization".to_string(),
                source: Box::new(e),
            })?
            .with_execution_providers([
                TensorRTExecutionProvider::default()
                    .with_device_id(options.device_id)
                    .build(),
                CUDAExecutionProvider::default()
                    .with_device_id(options.device_id)
                    .build(),
            ])
            .map_err(|e| FeatureError::Inference {
                operation: "execution provider setup".to_string(),
                source: Box::new(e),
            })?
            .with_intra_threads(options.num_threads)
            .map_err(|e| FeatureError::Inference {
                operation: "thread pool setup".to_string(),
                source: Box::new(e),
            })?
            .commit_from_file(model_path)
            .map_err(|e| FeatureError::Inference {
                operation: format!("model loading: {}", model_path.display()),
                source: Box::new(e),
            })?;

        let input = session
            .inputs
            .first()
            .ok_or_else(|| FeatureError::inference("model input lookup", "model has no inputs"))?;
        let input_name = input.name.clone();
        let shape: Vec<i64> = input
            .input_type
            .tensor_shape()
            .map(|shape| shape.iter().copied().collect())
            .ok_or_else(|| {
                FeatureError::inference("model input lookup", "input is not a tensor")
            })?;
        if shape.len() != 4 {
            return Err(FeatureError::inference(
                "model input lookup",
                format!("expected NCHW input, got shape {shape:?}"),
            ));
        }

        let fixed_batch = usize::try_from(shape[0]).ok().filter(|&n| n > 0);
        let input_size = match (u32::try_from(shape[3]), u32::try_from(shape[2])) {
            (Ok(w), Ok(h)) if w > 0 && h > 0 => (w, h),
            _ => options.input_size,
        };

        // initialize model
        let (width, height) = input_size;
        let data = Array4::<f32>::zeros((
            fixed_batch.unwrap_or(1),
            3,
            height as usize,
            width as usize,
        ));
        session
            .run(ort::inputs![input_name.as_str() => TensorRef::from_array_view(&data)?])
            .map_err(|e| FeatureError::Inference {
                operation: "model warm-up".to_string(),
                source: Box::new(e),
            })?;

        tracing::info!(
            "Loaded {} (input `{}` {}x{}, batch {})",
            model_path.display(),
            input_name,
            width,
            height,
            fixed_batch.map_or_else(|| "dynamic".to_string(), |n| n.to_string())
        );

        Ok(Self {
            session,
            input_name,
            input_size,
            fixed_batch,
            mean_bgr: options.mean_bgr,
        })
    }

    /// Network input (width, height).
    pub const fn input_size(&self) -> (u32, u32) {
        self.input_size
    }

    pub fn output_names(&self) -> Vec<&str> {
        self.session
            .outputs
            .iter()
            .map(|output| output.name.as_str())
            .collect()
    }
}

impl InferenceBackend for OnnxBackend {
    fn forward(&mut self, batch: &ImageBatch<'_, RgbImage>, layer: &str) -> Result<ArrayD<f32>> {
        if let Some(expected) = self.fixed_batch {
            if batch.len() != expected {
                return Err(FeatureError::Dimension {
                    context: "model batch size".to_string(),
                    expected,
                    actual: batch.len(),
                });
            }
        }
        if !self.session.outputs.iter().any(|output| output.name == layer) {
            return Err(FeatureError::inference(
                "feature layer lookup",
                format!(
                    "layer `{layer}` not found, available: {}",
                    self.output_names().join(", ")
                ),
            ));
        }

        let tensor = preprocess(batch.items(), self.input_size, self.mean_bgr);
        let outputs = self.session.run(
            ort::inputs![self.input_name.as_str() => TensorRef::from_array_view(&tensor)?],
        )?;
        Ok(outputs[layer].try_extract_array::<f32>()?.to_owned())
    }

    fn padding(&self) -> Padding {
        match self.fixed_batch {
            Some(_) => Padding::RepeatFirst,
            None => Padding::None,
        }
    }

    fn fixed_batch_size(&self) -> Option<usize> {
        self.fixed_batch
    }
}

/// Stack crops into an NCHW tensor: resized to `input_size`, channels in BGR
/// order, per-channel mean subtracted.
pub fn preprocess(images: &[&RgbImage], input_size: (u32, u32), mean_bgr: [f32; 3]) -> Array4<f32> {
    let (width, height) = input_size;
    let mut tensor = Array4::<f32>::zeros((images.len(), 3, height as usize, width as usize));

    for (mut slot, image) in tensor.outer_iter_mut().zip(images) {
        let resized;
        let image = if image.dimensions() == input_size {
            *image
        } else {
            resized = imageops::resize(*image, width, height, FilterType::Triangle);
            &resized
        };

        let bgr = image.as_ndarray3().slice_move(s![..;-1, .., ..]);
        for ((mut out, src), mean) in slot.outer_iter_mut().zip(bgr.outer_iter()).zip(mean_bgr) {
            out.zip_mut_with(&src, |o, &v| *o = f32::from(v) - mean);
        }
    }

    tensor
}
