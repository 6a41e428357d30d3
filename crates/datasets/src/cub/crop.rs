use std::path::PathBuf;

use prep_common::{BoundingBox, ImageId};

use crate::error::Result;

/// Cut one image down to its bounding box
#[derive(Debug, Clone, PartialEq)]
pub struct CropJob {
    pub img_id: ImageId,
    pub source: PathBuf,
    pub destination: PathBuf,
    pub bbox: BoundingBox,
}

impl CropJob {
    /// `(x, y, width, height)` in whole pixels
    pub fn window(&self) -> (u32, u32, u32, u32) {
        self.bbox.pixel_window()
    }
}

/// Pixel-level cropping backend. The destination folder exists when called.
pub trait ImageCropper {
    fn crop(&self, job: &CropJob) -> Result<()>;
}

impl<F> ImageCropper for F
where
    F: Fn(&CropJob) -> Result<()>,
{
    fn crop(&self, job: &CropJob) -> Result<()> {
        self(job)
    }
}
