use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("No stored file at {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Invalid storage path: {}", path.display())]
    InvalidPath { path: PathBuf },

    #[error("Blob encoding error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("Blob decoding error: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;
