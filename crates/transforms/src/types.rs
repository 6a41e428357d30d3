use ndarray::Array1;
use prep_storage::ModelFingerprint;

/// One `(record, feature-vector)` pair flowing through a transform
pub type Sample<R> = (R, Array1<f32>);

/// How the in-memory model came to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelOrigin {
    /// Fitted in this process and written to storage
    Computed,
    /// Read back from storage
    Loaded,
}

#[derive(Debug, Clone)]
pub struct FittedModel<M> {
    pub model: M,
    /// Identifies the persisted bytes; stamped into every artifact
    pub fingerprint: ModelFingerprint,
    pub origin: ModelOrigin,
}

/// Lifecycle of a transform instance. `transform` is only valid when fitted.
#[derive(Debug, Clone)]
pub enum TransformState<M> {
    Unfitted,
    Fitted(FittedModel<M>),
}

impl<M> TransformState<M> {
    pub fn is_fitted(&self) -> bool {
        matches!(self, Self::Fitted(_))
    }

    pub fn fitted(&self) -> Option<&FittedModel<M>> {
        match self {
            Self::Fitted(fitted) => Some(fitted),
            Self::Unfitted => None,
        }
    }
}
