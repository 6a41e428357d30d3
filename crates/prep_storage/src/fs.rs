use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Serialize, de::DeserializeOwned};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::{
    Storage,
    blob::{ArrayBlob, ModelFingerprint, StoredModel},
    error::{Result, StorageError},
};

/// Local filesystem storage rooted at a directory.
///
/// Writes go to a temporary file next to the target which is then renamed
/// over it, so readers never see a half-written blob.
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => StorageError::NotFound {
                path: path.to_path_buf(),
            },
            _ => StorageError::Io(err),
        })
    }

    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let dir = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .ok_or_else(|| StorageError::InvalidPath {
                path: path.to_path_buf(),
            })?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(bytes)?;
        tmp.flush()?;
        tmp.persist(path).map_err(|err| StorageError::Io(err.error))?;
        Ok(())
    }
}

impl Storage for FsStorage {
    fn root(&self) -> &Path {
        &self.root
    }

    fn ensure_dir(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        Ok(())
    }

    fn check_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn save_instance(&self, path: &Path, blob: &ArrayBlob) -> Result<()> {
        let bytes = bincode::serde::encode_to_vec(blob, bincode::config::standard())?;
        self.write_atomic(path, &bytes)?;
        debug!("Saved instance {} ({} values)", path.display(), blob.len());
        Ok(())
    }

    fn load_instance(&self, path: &Path) -> Result<ArrayBlob> {
        let bytes = self.read(path)?;
        let (blob, _): (ArrayBlob, usize) =
            bincode::serde::decode_from_slice(&bytes, bincode::config::standard())?;
        Ok(blob)
    }

    fn save_model<M: Serialize>(&self, path: &Path, model: &M) -> Result<ModelFingerprint> {
        let bytes = serde_json::to_vec_pretty(model)?;
        let fingerprint = ModelFingerprint::of_bytes(&bytes);
        self.write_atomic(path, &bytes)?;
        debug!("Saved model {} [{}]", path.display(), fingerprint);
        Ok(fingerprint)
    }

    fn load_model<M: DeserializeOwned>(&self, path: &Path) -> Result<StoredModel<M>> {
        let bytes = self.read(path)?;
        let fingerprint = ModelFingerprint::of_bytes(&bytes);
        let model = serde_json::from_slice(&bytes)?;
        debug!("Loaded model {} [{}]", path.display(), fingerprint);
        Ok(StoredModel { model, fingerprint })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct DummyModel {
        name: String,
        weights: Vec<f64>,
    }

    fn storage() -> (tempfile::TempDir, FsStorage) {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = FsStorage::new(dir.path());
        (dir, storage)
    }

    #[test]
    fn test_path_namespace() {
        let storage = FsStorage::new("/cache");
        assert_eq!(storage.get_super_folder("transforms"), PathBuf::from("/cache/transforms"));
        assert_eq!(
            storage.get_sub_folder("transforms", "pca"),
            PathBuf::from("/cache/transforms/pca")
        );
        assert_eq!(
            storage.get_model_path("transforms", "pca_model.json"),
            PathBuf::from("/cache/transforms/pca_model.json")
        );
        assert_eq!(
            storage.get_instance_path("transforms", "pca", "42.mat"),
            PathBuf::from("/cache/transforms/pca/42.mat")
        );
    }

    #[test]
    fn test_ensure_dir_is_idempotent() {
        let (_dir, storage) = storage();
        let folder = storage.get_sub_folder("transforms", "pca");
        assert!(!storage.check_exists(&folder));
        storage.ensure_dir(&folder).unwrap();
        storage.ensure_dir(&folder).unwrap();
        assert!(folder.is_dir());
    }

    #[test]
    fn test_instance_round_trip() {
        let (_dir, storage) = storage();
        storage.ensure_dir(&storage.get_sub_folder("transforms", "pca")).unwrap();
        let path = storage.get_instance_path("transforms", "pca", "7.mat");

        let blob = ArrayBlob::from(&array![1.5f32, -2.25, 0.0, f32::MAX])
            .with_provenance(ModelFingerprint::of_bytes(b"model"));
        storage.save_instance(&path, &blob).unwrap();

        assert!(storage.check_exists(&path));
        assert_eq!(storage.load_instance(&path).unwrap(), blob);
    }

    #[test]
    fn test_instance_overwrite_replaces_content() {
        let (_dir, storage) = storage();
        storage.ensure_dir(storage.root()).unwrap();
        let path = storage.root().join("1.mat");

        storage.save_instance(&path, &ArrayBlob::from(&array![1.0f32])).unwrap();
        storage.save_instance(&path, &ArrayBlob::from(&array![2.0f32, 3.0])).unwrap();

        let loaded = storage.load_instance(&path).unwrap().into_array1().unwrap();
        assert_eq!(loaded, array![2.0f32, 3.0]);
    }

    #[test]
    fn test_model_round_trip_and_fingerprint() {
        let (_dir, storage) = storage();
        let path = storage.get_model_path("transforms", "dummy.json");
        storage.ensure_dir(&storage.get_super_folder("transforms")).unwrap();

        let model = DummyModel {
            name: "pca".to_string(),
            weights: vec![0.25, -0.5],
        };
        let saved = storage.save_model(&path, &model).unwrap();
        let loaded: StoredModel<DummyModel> = storage.load_model(&path).unwrap();

        assert_eq!(loaded.model, model);
        assert_eq!(loaded.fingerprint, saved);
    }

    #[test]
    fn test_missing_files_report_not_found() {
        let (_dir, storage) = storage();
        let path = storage.root().join("missing.mat");
        assert!(matches!(
            storage.load_instance(&path),
            Err(StorageError::NotFound { .. })
        ));
        assert!(matches!(
            storage.load_model::<DummyModel>(&path),
            Err(StorageError::NotFound { .. })
        ));
    }

    #[test]
    fn test_save_into_missing_directory_fails() {
        let (_dir, storage) = storage();
        let path = storage.get_instance_path("transforms", "pca", "1.mat");
        let result = storage.save_instance(&path, &ArrayBlob::from(&array![1.0f32]));
        assert!(matches!(result, Err(StorageError::Io(_))));
    }

    #[test]
    fn test_corrupt_instance_is_a_decode_error() {
        let (_dir, storage) = storage();
        storage.ensure_dir(storage.root()).unwrap();
        let path = storage.root().join("bad.mat");
        fs::write(&path, [0xffu8; 3]).unwrap();
        assert!(matches!(
            storage.load_instance(&path),
            Err(StorageError::Decode(_))
        ));
    }
}
