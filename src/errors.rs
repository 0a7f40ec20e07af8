use std::path::PathBuf;
use thiserror::Error;

type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Structured error types for region feature extraction.
///
/// Each variant carries the context of its failure domain so callers can
/// react without parsing messages: configuration problems abort before any
/// work starts, filesystem and parse errors point at the offending file, and
/// inference errors are fatal for the current extraction run.
#[derive(Error, Debug)]
pub enum FeatureError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Invalid argument: {field} {reason}")]
    InvalidArgument { field: String, reason: String },

    #[error("Dimension mismatch in {context}: expected {expected}, got {actual}")]
    Dimension {
        context: String,
        expected: usize,
        actual: usize,
    },

    #[error("Filesystem error: {operation} failed for {path:?}")]
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error in {path:?} at line {line}: {reason}")]
    Parse {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Image processing error: {operation} failed (file: {path})")]
    ImageProcessing {
        path: String,
        operation: String,
        #[source]
        source: BoxedError,
    },

    #[error("Inference error: {operation} failed")]
    Inference {
        operation: String,
        #[source]
        source: BoxedError,
    },
}

pub type Result<T> = std::result::Result<T, FeatureError>;

impl FeatureError {
    pub(crate) fn invalid_argument(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn inference(operation: impl Into<String>, message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self::Inference {
            operation: operation.into(),
            source: message.into(),
        }
    }

    /// True for errors raised by configuration validation, before any
    /// image was touched.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Configuration { .. } | Self::InvalidArgument { .. }
        )
    }

    /// True when the error is a filesystem lookup for something that does
    /// not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::FileSystem { source, .. } if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}

/// Convert anyhow errors to configuration errors.
///
/// Only the CLI layer produces anyhow errors; they surface in the library as
/// configuration failures.
impl From<anyhow::Error> for FeatureError {
    fn from(err: anyhow::Error) -> Self {
        Self::Configuration {
            message: err.to_string(),
        }
    }
}

/// Fallback for I/O errors without path context. Code that knows the path
/// should build `FeatureError::FileSystem` directly.
impl From<std::io::Error> for FeatureError {
    fn from(err: std::io::Error) -> Self {
        Self::FileSystem {
            path: PathBuf::from("unknown"),
            operation: "unknown".to_string(),
            source: err,
        }
    }
}

impl From<image::ImageError> for FeatureError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageProcessing {
            path: "unknown".to_string(),
            operation: "image processing".to_string(),
            source: Box::new(err),
        }
    }
}

impl From<ort::Error> for FeatureError {
    fn from(err: ort::Error) -> Self {
        Self::Inference {
            operation: "ort operation".to_string(),
            source: Box::new(err),
        }
    }
}

/// Shape errors come out of tensor reshaping around the forward pass, so
/// they are reported as inference failures.
impl From<ndarray::ShapeError> for FeatureError {
    fn from(err: ndarray::ShapeError) -> Self {
        Self::Inference {
            operation: "tensor shape conversion".to_string(),
            source: Box::new(err),
        }
    }
}
