use ndarray::{Array1, Array2};
use prep_common::ImageId;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::error::{DatasetError, Result};

/// Membership of an image in `train_test_split.txt`
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Split {
    Train,
    Test,
}

impl Split {
    pub const TRAIN_INDICATOR: &'static str = "1";
    pub const TEST_INDICATOR: &'static str = "0";

    pub fn from_indicator(img_id: &ImageId, indicator: &str) -> Result<Self> {
        match indicator {
            Self::TRAIN_INDICATOR => Ok(Self::Train),
            Self::TEST_INDICATOR => Ok(Self::Test),
            other => Err(DatasetError::UnknownIndicator {
                img_id: img_id.clone(),
                indicator: other.to_string(),
            }),
        }
    }

    pub fn indicator(self) -> &'static str {
        match self {
            Self::Train => Self::TRAIN_INDICATOR,
            Self::Test => Self::TEST_INDICATOR,
        }
    }
}

/// Source of raw feature vectors, typically precomputed CNN activations.
///
/// Returns `rows * width` values, row-major, for one image.
pub trait FeatureReader {
    fn read(&self, img_id: &ImageId) -> Result<Vec<f32>>;
}

impl<F> FeatureReader for F
where
    F: Fn(&ImageId) -> Result<Vec<f32>>,
{
    fn read(&self, img_id: &ImageId) -> Result<Vec<f32>> {
        self(img_id)
    }
}

/// Dense train/test matrices with one label per row.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainTestSplit {
    pub x_train: Array2<f32>,
    pub y_train: Array1<u32>,
    /// Image of every training row; repeated in full mode
    pub train_ids: Vec<ImageId>,
    pub x_test: Array2<f32>,
    pub y_test: Array1<u32>,
    pub test_ids: Vec<ImageId>,
}

impl TrainTestSplit {
    pub fn n_train(&self) -> usize {
        self.x_train.nrows()
    }

    pub fn n_test(&self) -> usize {
        self.x_test.nrows()
    }

    /// `(img_id, row)` pairs of the training matrix
    pub fn train_samples(&self) -> impl Iterator<Item = (ImageId, Array1<f32>)> + '_ {
        self.train_ids
            .iter()
            .cloned()
            .zip(self.x_train.rows().into_iter().map(|row| row.to_owned()))
    }

    /// `(img_id, row)` pairs of the test matrix
    pub fn test_samples(&self) -> impl Iterator<Item = (ImageId, Array1<f32>)> + '_ {
        self.test_ids
            .iter()
            .cloned()
            .zip(self.x_test.rows().into_iter().map(|row| row.to_owned()))
    }
}

/// Row-major accumulator for one half of the split
#[derive(Debug, Default)]
pub(crate) struct MatrixBuilder {
    width: usize,
    values: Vec<f32>,
    labels: Vec<u32>,
    ids: Vec<ImageId>,
}

impl MatrixBuilder {
    pub fn new(width: usize) -> Self {
        Self {
            width,
            ..Self::default()
        }
    }

    /// Append `rows` rows read for `img_id`, all labelled `label`
    pub fn push(&mut self, img_id: &ImageId, label: u32, rows: usize, values: Vec<f32>) -> Result<()> {
        let expected = rows * self.width;
        if values.len() != expected {
            return Err(DatasetError::ExtractorShape {
                img_id: img_id.clone(),
                expected,
                found: values.len(),
            });
        }
        self.values.extend(values);
        self.labels.extend(std::iter::repeat_n(label, rows));
        self.ids.extend(std::iter::repeat_n(img_id.clone(), rows));
        Ok(())
    }

    pub fn finish(self) -> Result<(Array2<f32>, Array1<u32>, Vec<ImageId>)> {
        let rows = self.labels.len();
        let matrix = Array2::from_shape_vec((rows, self.width), self.values)?;
        Ok((matrix, Array1::from(self.labels), self.ids))
    }
}
