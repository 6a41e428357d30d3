use std::path::{Path, PathBuf};

use prep_common::ImageId;
use prep_storage::Storage;

use crate::error::{Result, TransformError};

/// Top-level storage category shared by every transform
pub const TRANSFORMS_CATEGORY: &str = "transforms";
/// Extension of per-instance artifacts
pub const ARTIFACT_EXT: &str = "mat";
/// Extension of persisted models
pub const MODEL_EXT: &str = "json";

/// The `transforms/{kind}` sub-area a transform owns.
///
/// Opening it creates the folders; afterwards it only derives paths.
#[derive(Debug, Clone)]
pub struct StorageArea {
    kind: String,
    folder: PathBuf,
    model_path: PathBuf,
}

impl StorageArea {
    pub fn open<S: Storage>(storage: &S, kind: &str, model_name: &str) -> Result<Self> {
        if kind.is_empty() || !ImageId::from(kind).is_file_name_safe() {
            return Err(TransformError::InvalidParameter(format!(
                "'{kind}' is not a valid transform kind"
            )));
        }

        let super_folder = storage.get_super_folder(TRANSFORMS_CATEGORY);
        storage.ensure_dir(&super_folder)?;

        let folder = storage.get_sub_folder(TRANSFORMS_CATEGORY, kind);
        storage.ensure_dir(&folder)?;

        let model_file = format!("{model_name}.{MODEL_EXT}");
        let model_path = storage.get_instance_path(TRANSFORMS_CATEGORY, kind, &model_file);

        Ok(Self {
            kind: kind.to_string(),
            folder,
            model_path,
        })
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// `transforms/{kind}/{img_id}.mat`
    pub fn artifact_path<S: Storage>(&self, storage: &S, img_id: &ImageId) -> Result<PathBuf> {
        if !img_id.is_file_name_safe() {
            return Err(TransformError::InvalidIdentifier(img_id.clone()));
        }
        let file_name = format!("{img_id}.{ARTIFACT_EXT}");
        Ok(storage.get_instance_path(TRANSFORMS_CATEGORY, &self.kind, &file_name))
    }
}
