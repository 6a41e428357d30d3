//! # Prep Storage
//!
//! Flat on-disk namespace for fitted models and per-instance artifacts.
//!
//! Paths follow `category / subcategory / file`, e.g.
//! `{root}/transforms/pca/pca_model.json` and `{root}/transforms/pca/42.mat`.
//! Instance files are raw numeric arrays encoded with `bincode`; model files
//! are self-describing JSON and carry a BLAKE3 fingerprint of their bytes.
//!
//! ```rust,no_run
//! use prep_storage::{ArrayBlob, FsStorage, Storage};
//! use ndarray::array;
//!
//! let storage = FsStorage::new("/tmp/prep-cache");
//! let folder = storage.get_sub_folder("transforms", "pca");
//! storage.ensure_dir(&folder)?;
//!
//! let path = storage.get_instance_path("transforms", "pca", "1.mat");
//! storage.save_instance(&path, &ArrayBlob::from(&array![0.5f32, -1.0]))?;
//! assert!(storage.check_exists(&path));
//! # Ok::<(), prep_storage::StorageError>(())
//! ```

pub mod blob;
pub mod error;
pub mod fs;

use std::path::{Path, PathBuf};

use serde::{Serialize, de::DeserializeOwned};

pub use blob::{ArrayBlob, ModelFingerprint, StoredModel};
pub use error::{Result, StorageError};
pub use fs::FsStorage;

/// Hierarchical storage used by the transforms.
///
/// Path construction is pure; only the `ensure_dir`, `check_exists` and
/// load/save methods touch the medium.
pub trait Storage {
    /// Root every path is resolved against
    fn root(&self) -> &Path;

    fn get_super_folder(&self, category: &str) -> PathBuf {
        self.root().join(category)
    }

    fn get_sub_folder(&self, category: &str, subcategory: &str) -> PathBuf {
        self.get_super_folder(category).join(subcategory)
    }

    /// Path of a model stored directly under a category
    fn get_model_path(&self, category: &str, filename: &str) -> PathBuf {
        self.get_super_folder(category).join(filename)
    }

    fn get_instance_path(&self, category: &str, subcategory: &str, filename: &str) -> PathBuf {
        self.get_sub_folder(category, subcategory).join(filename)
    }

    /// Create the directory (and parents) if it does not exist yet
    fn ensure_dir(&self, path: &Path) -> Result<()>;

    fn check_exists(&self, path: &Path) -> bool;

    fn save_instance(&self, path: &Path, blob: &ArrayBlob) -> Result<()>;

    fn load_instance(&self, path: &Path) -> Result<ArrayBlob>;

    /// Persist a model and return the fingerprint of the written bytes
    fn save_model<M: Serialize>(&self, path: &Path, model: &M) -> Result<ModelFingerprint>;

    fn load_model<M: DeserializeOwned>(&self, path: &Path) -> Result<StoredModel<M>>;
}

impl<S: Storage> Storage for &S {
    fn root(&self) -> &Path {
        (**self).root()
    }

    fn ensure_dir(&self, path: &Path) -> Result<()> {
        (**self).ensure_dir(path)
    }

    fn check_exists(&self, path: &Path) -> bool {
        (**self).check_exists(path)
    }

    fn save_instance(&self, path: &Path, blob: &ArrayBlob) -> Result<()> {
        (**self).save_instance(path, blob)
    }

    fn load_instance(&self, path: &Path) -> Result<ArrayBlob> {
        (**self).load_instance(path)
    }

    fn save_model<M: Serialize>(&self, path: &Path, model: &M) -> Result<ModelFingerprint> {
        (**self).save_model(path, model)
    }

    fn load_model<M: DeserializeOwned>(&self, path: &Path) -> Result<StoredModel<M>> {
        (**self).load_model(path)
    }
}
