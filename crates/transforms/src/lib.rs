//! # Cached Feature Transforms
//!
//! Two-phase (`fit` then `transform`) feature-space transforms whose fitted
//! model and per-image outputs are memoized on disk through a
//! [`prep_storage::Storage`] backend.
//!
//! ## Core Features
//!
//! - **Estimator trait**: plug in any fit/apply algorithm with a serializable model
//! - **Disk cache**: one model per transform, one `.mat` artifact per image id
//! - **Provenance**: artifacts written by an older model are recomputed, never reused
//! - **PCA**: principal component analysis with the Gram-matrix trick for wide data
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ndarray::array;
//! use prep_common::ImageId;
//! use prep_storage::FsStorage;
//! use transforms::PcaTransform;
//!
//! let mut pca = PcaTransform::pca(FsStorage::new("/data/prep"), 2)?;
//!
//! let training = vec![
//!     (ImageId::from(1u32), array![1.0f32, 0.0, 2.0]),
//!     (ImageId::from(2u32), array![0.0, 1.0, 1.0]),
//!     (ImageId::from(3u32), array![2.0, 2.0, 0.0]),
//! ];
//! pca.fit(training.clone(), false)?;
//!
//! for sample in pca.transform(training, false)? {
//!     let (img_id, reduced) = sample?;
//!     println!("{img_id}: {reduced}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod algorithms;
pub mod cache;
pub mod error;
pub mod traits;
pub mod types;

pub use algorithms::{Pca, PcaModel};
pub use cache::{CachedTransform, StorageArea, TransformIter};
pub use error::{Result, TransformError};
pub use traits::{Estimator, SampleStream, Transform};
pub use types::{FittedModel, ModelOrigin, Sample, TransformState};

use prep_common::PcaConfig;
use prep_storage::Storage;

/// PCA cached under `transforms/pca/`
pub type PcaTransform<S> = CachedTransform<S, Pca>;

impl<S: Storage> CachedTransform<S, Pca> {
    pub fn pca(storage: S, n_components: usize) -> Result<Self> {
        Self::new(storage, Pca::new(n_components)?)
    }

    pub fn from_config(storage: S, config: &PcaConfig) -> Result<Self> {
        Self::new(storage, Pca::from_config(config)?)
    }
}
