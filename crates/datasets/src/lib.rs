//! # Dataset Readers
//!
//! Locate raw dataset files on disk and turn their flat metadata files into
//! typed records for the feature pipeline.
//!
//! - [`Cub200_2011`]: images, train/test split, class labels, bounding boxes,
//!   part locations and dense train/test feature matrices
//! - [`PascalVoc2006`]: image sets with per-object annotations
//!
//! ```rust,no_run
//! use datasets::{Cub200_2011, Dataset};
//!
//! let cub = Cub200_2011::new("/data/CUB_200_2011");
//! for record in cub.train()? {
//!     let record = record?;
//!     println!("{} -> class {}", record.img_id, record.class_label);
//! }
//! # Ok::<(), datasets::DatasetError>(())
//! ```

pub mod cub;
pub mod error;
mod lines;
pub mod voc;

use std::path::Path;

use prep_common::Record;

pub use cub::{
    CropJob, Cub200_2011, CubImageFolder, CubParts, CubRecord, FeatureReader, ImageCropper,
    ImageInfo, PartLocation, SegmentationInfo, Split, TrainTestSplit,
};
pub use error::{DatasetError, Result};
pub use voc::{AnnotationParser, PascalVoc2006, SetKind, VocClass, VocObject, VocRecord};

/// Lazy stream of dataset records
pub type RecordStream<'a, T> = Box<dyn Iterator<Item = Result<T>> + 'a>;

/// A dataset with a fixed train/test partition
pub trait Dataset {
    type Record: Record;

    const NAME: &'static str;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn base_path(&self) -> &Path;

    fn train(&self) -> Result<RecordStream<'_, Self::Record>>;

    fn test(&self) -> Result<RecordStream<'_, Self::Record>>;
}
