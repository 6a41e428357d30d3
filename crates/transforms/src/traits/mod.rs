use ndarray::{Array1, ArrayView1, ArrayView2};
use prep_common::Record;
use serde::{Serialize, de::DeserializeOwned};

use crate::{error::Result, types::Sample};

/// A fit/apply algorithm whose model can be persisted.
///
/// Implementors only do the math; caching, storage layout and the
/// fit-before-transform state live in [`crate::CachedTransform`].
pub trait Estimator {
    type Model: Serialize + DeserializeOwned;

    /// Storage sub-area under `transforms/`
    const KIND: &'static str;
    /// File stem of the persisted model
    const MODEL_NAME: &'static str;

    /// Learn a model from the full sample matrix (rows = samples)
    fn fit(&self, samples: ArrayView2<'_, f32>) -> Result<Self::Model>;

    /// Map one raw feature vector into the new space
    fn apply(&self, model: &Self::Model, sample: ArrayView1<'_, f32>) -> Result<Array1<f32>>;

    /// Reject a persisted model that was fitted with other parameters
    fn check_model(&self, _model: &Self::Model) -> std::result::Result<(), String> {
        Ok(())
    }
}

/// Lazy stream of transformed samples
pub type SampleStream<'a, R> = Box<dyn Iterator<Item = Result<Sample<R>>> + 'a>;

/// Two-phase feature-space transform: `fit` once, then `transform` streams.
pub trait Transform {
    /// Name of the storage sub-area, e.g. `pca`
    fn kind(&self) -> &str;

    fn is_fitted(&self) -> bool;

    /// Fit on (or load a cached model for) the given samples
    fn fit<R, I>(&mut self, data: I, force: bool) -> Result<()>
    where
        I: IntoIterator<Item = Sample<R>>;

    /// Map every sample through the fitted model, in input order
    fn transform<'a, R, I>(&'a self, data: I, force: bool) -> Result<SampleStream<'a, R>>
    where
        R: Record + 'a,
        I: IntoIterator<Item = Sample<R>>,
        I::IntoIter: 'a;
}
