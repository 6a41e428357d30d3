use std::path::{Path, PathBuf};

use prep_common::ImageId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}:{line}: {details}", path.display())]
    MalformedLine {
        path: PathBuf,
        line: usize,
        details: String,
    },

    #[error("{}:{line}: cannot parse '{value}' as {expected}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        value: String,
        expected: &'static str,
    },

    #[error("Unknown split indicator '{indicator}' for image {img_id}")]
    UnknownIndicator { img_id: ImageId, indicator: String },

    #[error("Unknown image set '{0}'")]
    UnknownSet(String),

    #[error("Unknown object class '{0}'")]
    UnknownClass(String),

    #[error("Image {img_id} has no entry in {file}")]
    MissingEntry { img_id: ImageId, file: String },

    #[error("Image {img_id} appears more than once in {file}")]
    DuplicateEntry { img_id: ImageId, file: String },

    #[error("Image {0} not found")]
    NotFound(ImageId),

    #[error("Feature reader returned {found} values for image {img_id}, expected {expected}")]
    ExtractorShape {
        img_id: ImageId,
        expected: usize,
        found: usize,
    },

    #[error("Feature extraction failed for image {img_id}: {message}")]
    Extractor { img_id: ImageId, message: String },

    #[error("Invalid annotation {}: {message}", path.display())]
    Annotation { path: PathBuf, message: String },

    #[error("Cropping failed for image {img_id}: {message}")]
    Crop { img_id: ImageId, message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

impl DatasetError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, DatasetError>;
