use std::fmt;

use ndarray::{Array, Array1, Array2, ArrayD, Dimension, Ix1, Ix2, IxDyn};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// BLAKE3 digest (hex) of a persisted model's serialized bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelFingerprint(String);

impl ModelFingerprint {
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(blake3::hash(bytes).to_hex().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is plenty for log lines
        f.write_str(&self.0[..self.0.len().min(12)])
    }
}

/// A model loaded from storage together with the fingerprint of its bytes.
#[derive(Debug, Clone)]
pub struct StoredModel<M> {
    pub model: M,
    pub fingerprint: ModelFingerprint,
}

/// Raw numeric array as written to an instance file.
///
/// `data` is in logical (row-major) order. `provenance` names the model that
/// produced the values, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayBlob {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
    pub provenance: Option<ModelFingerprint>,
}

impl ArrayBlob {
    pub fn from_array<D: Dimension>(array: &Array<f32, D>) -> Self {
        Self {
            shape: array.shape().to_vec(),
            data: array.iter().copied().collect(),
            provenance: None,
        }
    }

    pub fn with_provenance(mut self, fingerprint: ModelFingerprint) -> Self {
        self.provenance = Some(fingerprint);
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_array(self) -> Result<ArrayD<f32>> {
        Ok(ArrayD::from_shape_vec(IxDyn(&self.shape), self.data)?)
    }

    pub fn into_array1(self) -> Result<Array1<f32>> {
        Ok(self.into_array()?.into_dimensionality::<Ix1>()?)
    }

    pub fn into_array2(self) -> Result<Array2<f32>> {
        Ok(self.into_array()?.into_dimensionality::<Ix2>()?)
    }
}

impl From<&Array1<f32>> for ArrayBlob {
    fn from(array: &Array1<f32>) -> Self {
        Self::from_array(array)
    }
}

impl From<&Array2<f32>> for ArrayBlob {
    fn from(array: &Array2<f32>) -> Self {
        Self::from_array(array)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_matrix_keeps_row_major_order() {
        let matrix = array![[1.0f32, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let blob = ArrayBlob::from(&matrix);
        assert_eq!(blob.shape, vec![2, 3]);
        assert_eq!(blob.data, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(blob.into_array2().unwrap(), matrix);
    }

    #[test]
    fn test_wrong_dimensionality_is_an_error() {
        let blob = ArrayBlob::from(&array![[1.0f32, 2.0]]);
        assert!(blob.into_array1().is_err());
    }

    #[test]
    fn test_fingerprint_depends_on_content() {
        let a = ModelFingerprint::of_bytes(b"model-a");
        let b = ModelFingerprint::of_bytes(b"model-b");
        assert_ne!(a, b);
        assert_eq!(a, ModelFingerprint::of_bytes(b"model-a"));
        assert_eq!(a.as_str().len(), 64);
        assert_eq!(a.to_string().len(), 12);
    }
}
