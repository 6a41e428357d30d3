use std::path::PathBuf;

use prep_common::ImageId;
use prep_storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Model not initialized: call fit before transform")]
    NotFitted,

    #[error("Cannot fit on an empty data stream")]
    EmptyInput,

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Requested {requested} components but the data supports at most {max}")]
    InvalidComponents { requested: usize, max: usize },

    #[error("Expected a feature vector of width {expected}, got {found}")]
    WidthMismatch { expected: usize, found: usize },

    #[error("Stored model {} does not match this transform: {details}. Refit with force", path.display())]
    ModelMismatch { path: PathBuf, details: String },

    #[error("Image id '{0}' cannot be used as an artifact file name")]
    InvalidIdentifier(ImageId),

    #[error("Shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, TransformError>;
