use chrono::{DateTime, Utc};
use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, s};
use prep_common::PcaConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::{Result, TransformError},
    traits::Estimator,
};

/// Eigenvalues below this fraction of the largest are treated as zero
const RANK_TOLERANCE: f64 = 1e-10;

/// Principal component analysis down to a fixed number of components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pca {
    n_components: usize,
}

impl Pca {
    pub fn new(n_components: usize) -> Result<Self> {
        if n_components == 0 {
            return Err(TransformError::InvalidParameter(
                "n_components must be at least 1".to_string(),
            ));
        }
        Ok(Self { n_components })
    }

    pub fn from_config(config: &PcaConfig) -> Result<Self> {
        Self::new(config.n_components)
    }

    pub fn n_components(&self) -> usize {
        self.n_components
    }
}

/// Fitted PCA parameters as persisted in `pca_model.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PcaModel {
    pub n_components: usize,
    pub n_features: usize,
    pub n_samples: usize,
    /// Per-feature mean of the training data
    pub mean: Array1<f64>,
    /// Principal axes, one per row (`n_components x n_features`)
    pub components: Array2<f64>,
    pub explained_variance: Array1<f64>,
    pub explained_variance_ratio: Array1<f64>,
    pub fitted_at: DateTime<Utc>,
}

impl PcaModel {
    /// Project one vector onto the principal axes
    pub fn project(&self, sample: ArrayView1<'_, f32>) -> Result<Array1<f32>> {
        if sample.len() != self.n_features {
            return Err(TransformError::WidthMismatch {
                expected: self.n_features,
                found: sample.len(),
            });
        }
        let centered = sample.mapv(f64::from) - &self.mean;
        Ok(self.components.dot(&centered).mapv(|v| v as f32))
    }

    /// Map projected coordinates back into the input space
    pub fn reconstruct(&self, projected: ArrayView1<'_, f32>) -> Result<Array1<f32>> {
        if projected.len() != self.n_components {
            return Err(TransformError::WidthMismatch {
                expected: self.n_components,
                found: projected.len(),
            });
        }
        let coords = projected.mapv(f64::from);
        Ok((self.components.t().dot(&coords) + &self.mean).mapv(|v| v as f32))
    }
}

impl Estimator for Pca {
    type Model = PcaModel;
    const KIND: &'static str = "pca";
    const MODEL_NAME: &'static str = "pca_model";

    fn fit(&self, samples: ArrayView2<'_, f32>) -> Result<PcaModel> {
        let (n_samples, n_features) = samples.dim();
        if n_samples == 0 || n_features == 0 {
            return Err(TransformError::EmptyInput);
        }
        let max = n_samples.min(n_features);
        if self.n_components > max {
            return Err(TransformError::InvalidComponents {
                requested: self.n_components,
                max,
            });
        }

        let x = samples.mapv(f64::from);
        let mean = x.mean_axis(Axis(0)).ok_or(TransformError::EmptyInput)?;
        let centered = &x - &mean;
        let k = self.n_components;

        // Decompose whichever of XᵀX / XXᵀ is smaller; both share the
        // non-zero spectrum.
        let (eigenvalues, mut components) = if n_samples < n_features {
            debug!("PCA via {n_samples}x{n_samples} Gram matrix");
            let gram = centered.dot(&centered.t());
            let (values, vectors) = top_eigenpairs(&gram, k);
            let cutoff = RANK_TOLERANCE * values[0].max(0.0);

            let mut components = Array2::<f64>::zeros((k, n_features));
            for i in 0..k {
                let lambda = values[i];
                if lambda > cutoff && lambda > 0.0 {
                    let axis = centered.t().dot(&vectors.column(i)) / lambda.sqrt();
                    components.row_mut(i).assign(&axis);
                }
            }
            (values, components)
        } else {
            debug!("PCA via {n_features}x{n_features} covariance matrix");
            let scatter = centered.t().dot(&centered);
            let (values, vectors) = top_eigenpairs(&scatter, k);
            let components = vectors.t().to_owned();
            (values, components)
        };

        for mut row in components.rows_mut() {
            let pivot = row
                .iter()
                .copied()
                .max_by(|a, b| a.abs().total_cmp(&b.abs()))
                .unwrap_or(0.0);
            if pivot < 0.0 {
                row.mapv_inplace(|v| -v);
            }
        }

        let dof = n_samples.saturating_sub(1).max(1) as f64;
        let spectrum = eigenvalues.mapv(|v| v.max(0.0));
        let total = spectrum.sum();
        let kept = spectrum.slice(s![..k]).to_owned();
        let explained_variance = kept.mapv(|v| v / dof);
        let explained_variance_ratio = if total > 0.0 {
            kept.mapv(|v| v / total)
        } else {
            Array1::zeros(k)
        };

        Ok(PcaModel {
            n_components: k,
            n_features,
            n_samples,
            mean,
            components,
            explained_variance,
            explained_variance_ratio,
            fitted_at: Utc::now(),
        })
    }

    fn apply(&self, model: &PcaModel, sample: ArrayView1<'_, f32>) -> Result<Array1<f32>> {
        model.project(sample)
    }

    fn check_model(&self, model: &PcaModel) -> std::result::Result<(), String> {
        if model.n_components != self.n_components {
            return Err(format!(
                "fitted with {} components, configured for {}",
                model.n_components, self.n_components
            ));
        }
        if model.components.dim() != (model.n_components, model.n_features)
            || model.mean.len() != model.n_features
        {
            return Err("component matrix does not match the recorded dimensions".to_string());
        }
        Ok(())
    }
}

/// Full spectrum of a symmetric matrix in descending order, plus the
/// eigenvectors of the `k` largest eigenvalues as columns
fn top_eigenpairs(matrix: &Array2<f64>, k: usize) -> (Array1<f64>, Array2<f64>) {
    let n = matrix.nrows();
    let dense = DMatrix::from_row_iterator(n, n, matrix.iter().copied());
    let eigen = SymmetricEigen::new(dense);

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| eigen.eigenvalues[j].total_cmp(&eigen.eigenvalues[i]));

    let values = order.iter().map(|&i| eigen.eigenvalues[i]).collect::<Array1<f64>>();
    let vectors = Array2::from_shape_fn((n, k), |(row, col)| eigen.eigenvectors[(row, order[col])]);
    (values, vectors)
}
