pub mod area;

use std::iter::FusedIterator;
use std::path::Path;

use ndarray::{Array1, ArrayView1, Axis};
use prep_common::{ImageId, Record};
use prep_storage::{ArrayBlob, Storage};
use tracing::{debug, info, warn};

use crate::{
    error::{Result, TransformError},
    traits::{Estimator, SampleStream, Transform},
    types::{FittedModel, ModelOrigin, Sample, TransformState},
};
pub use area::StorageArea;

/// Disk-cached transform: fits its estimator at most once per model path
/// and memoizes every transformed sample under `transforms/{kind}/{img_id}.mat`.
pub struct CachedTransform<S: Storage, E: Estimator> {
    storage: S,
    estimator: E,
    area: StorageArea,
    state: TransformState<E::Model>,
}

impl<S: Storage, E: Estimator> CachedTransform<S, E> {
    /// Create the transform and its storage sub-area. Starts unfitted.
    pub fn new(storage: S, estimator: E) -> Result<Self> {
        let area = StorageArea::open(&storage, E::KIND, E::MODEL_NAME)?;
        Ok(Self {
            storage,
            estimator,
            area,
            state: TransformState::Unfitted,
        })
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn estimator(&self) -> &E {
        &self.estimator
    }

    pub fn area(&self) -> &StorageArea {
        &self.area
    }

    pub fn model_path(&self) -> &Path {
        self.area.model_path()
    }

    pub fn state(&self) -> &TransformState<E::Model> {
        &self.state
    }

    /// The fitted model, or [`TransformError::NotFitted`]
    pub fn fitted(&self) -> Result<&FittedModel<E::Model>> {
        self.state.fitted().ok_or(TransformError::NotFitted)
    }

    /// Fit on the whole stream, or load the persisted model when one exists
    /// and `force` is not set. A failed fit leaves the transform unfitted.
    pub fn fit<R, I>(&mut self, data: I, force: bool) -> Result<()>
    where
        I: IntoIterator<Item = Sample<R>>,
    {
        self.state = TransformState::Unfitted;

        let fitted = if force || !self.storage.check_exists(self.area.model_path()) {
            self.compute_model(data)?
        } else {
            self.load_model()?
        };

        self.state = TransformState::Fitted(fitted);
        Ok(())
    }

    fn compute_model<R, I>(&self, data: I) -> Result<FittedModel<E::Model>>
    where
        I: IntoIterator<Item = Sample<R>>,
    {
        let rows: Vec<Array1<f32>> = data.into_iter().map(|(_, features)| features).collect();
        if rows.is_empty() {
            return Err(TransformError::EmptyInput);
        }

        let views: Vec<ArrayView1<'_, f32>> = rows.iter().map(|row| row.view()).collect();
        let samples = ndarray::stack(Axis(0), &views)?;
        drop(views);
        drop(rows);

        info!(
            "Fitting {} model on {} x {} samples",
            self.area.kind(),
            samples.nrows(),
            samples.ncols()
        );
        let model = self.estimator.fit(samples.view())?;
        let fingerprint = self.storage.save_model(self.area.model_path(), &model)?;
        info!(
            "Saved {} model to {} [{}]",
            self.area.kind(),
            self.area.model_path().display(),
            fingerprint
        );

        Ok(FittedModel {
            model,
            fingerprint,
            origin: ModelOrigin::Computed,
        })
    }

    fn load_model(&self) -> Result<FittedModel<E::Model>> {
        let path = self.area.model_path();
        let stored = self.storage.load_model::<E::Model>(path)?;
        self.estimator
            .check_model(&stored.model)
            .map_err(|details| TransformError::ModelMismatch {
                path: path.to_path_buf(),
                details,
            })?;

        info!(
            "Loaded cached {} model from {} [{}]",
            self.area.kind(),
            path.display(),
            stored.fingerprint
        );
        Ok(FittedModel {
            model: stored.model,
            fingerprint: stored.fingerprint,
            origin: ModelOrigin::Loaded,
        })
    }

    /// Lazily transform a stream. Fails immediately if not fitted; per-item
    /// failures end the stream after the failing item.
    pub fn transform<R, I>(&self, data: I, force: bool) -> Result<TransformIter<'_, S, E, I::IntoIter>>
    where
        R: Record,
        I: IntoIterator<Item = Sample<R>>,
    {
        let fitted = self.fitted()?;
        Ok(TransformIter {
            owner: self,
            fitted,
            inner: data.into_iter(),
            force,
            done: false,
        })
    }

    /// Transform a single vector through the artifact cache
    pub fn transform_one(
        &self,
        img_id: &ImageId,
        features: ArrayView1<'_, f32>,
        force: bool,
    ) -> Result<Array1<f32>> {
        let fitted = self.fitted()?;
        self.cached_apply(fitted, img_id, features, force)
    }

    fn cached_apply(
        &self,
        fitted: &FittedModel<E::Model>,
        img_id: &ImageId,
        features: ArrayView1<'_, f32>,
        force: bool,
    ) -> Result<Array1<f32>> {
        let path = self.area.artifact_path(&self.storage, img_id)?;

        if !force && self.storage.check_exists(&path) {
            let blob = self.storage.load_instance(&path)?;
            if blob.provenance.as_ref() == Some(&fitted.fingerprint) {
                debug!("Cache hit for {} ({})", img_id, path.display());
                return Ok(blob.into_array1()?);
            }
            warn!(
                "Artifact {} was produced by another model; recomputing",
                path.display()
            );
        }

        let transformed = self.estimator.apply(&fitted.model, features)?;
        let blob = ArrayBlob::from(&transformed).with_provenance(fitted.fingerprint.clone());
        self.storage.save_instance(&path, &blob)?;
        debug!("Computed {} -> {}", img_id, path.display());

        Ok(transformed)
    }
}

/// Iterator returned by [`CachedTransform::transform`]
pub struct TransformIter<'a, S: Storage, E: Estimator, I> {
    owner: &'a CachedTransform<S, E>,
    fitted: &'a FittedModel<E::Model>,
    inner: I,
    force: bool,
    done: bool,
}

impl<S, E, R, I> Iterator for TransformIter<'_, S, E, I>
where
    S: Storage,
    E: Estimator,
    R: Record,
    I: Iterator<Item = Sample<R>>,
{
    type Item = Result<Sample<R>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let Some((record, features)) = self.inner.next() else {
            self.done = true;
            return None;
        };

        match self
            .owner
            .cached_apply(self.fitted, record.img_id(), features.view(), self.force)
        {
            Ok(transformed) => Some(Ok((record, transformed))),
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            (0, Some(0))
        } else {
            let (_, upper) = self.inner.size_hint();
            (0, upper)
        }
    }
}

impl<S, E, R, I> FusedIterator for TransformIter<'_, S, E, I>
where
    S: Storage,
    E: Estimator,
    R: Record,
    I: Iterator<Item = Sample<R>>,
{
}

impl<S: Storage, E: Estimator> Transform for CachedTransform<S, E> {
    fn kind(&self) -> &str {
        self.area.kind()
    }

    fn is_fitted(&self) -> bool {
        self.state.is_fitted()
    }

    fn fit<R, I>(&mut self, data: I, force: bool) -> Result<()>
    where
        I: IntoIterator<Item = Sample<R>>,
    {
        CachedTransform::fit(self, data, force)
    }

    fn transform<'a, R, I>(&'a self, data: I, force: bool) -> Result<SampleStream<'a, R>>
    where
        R: Record + 'a,
        I: IntoIterator<Item = Sample<R>>,
        I::IntoIter: 'a,
    {
        let stream = CachedTransform::transform(self, data, force)?;
        Ok(Box::new(stream))
    }
}
