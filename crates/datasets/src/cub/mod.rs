//! CUB-200-2011 birds: 200 species, a fixed train/test split, bounding boxes
//! and 15 annotated part locations per image.

pub mod crop;
pub mod parts;
pub mod split;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use prep_common::{BoundingBox, CubConfig, ImageId, Point2D, Record};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use tracing::{debug, info};

use crate::{
    Dataset, RecordStream,
    error::{DatasetError, Result},
    lines::{Line, LineReader, index_by_id},
};
pub use crop::{CropJob, ImageCropper};
pub use parts::{CubParts, PartLocation};
pub use split::{FeatureReader, Split, TrainTestSplit};
use split::MatrixBuilder;

/// Pre-rendered image folders that share the CUB metadata files
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CubImageFolder {
    #[default]
    Original,
    /// Background removed with the segmentation masks
    Segmented,
    Head,
    HeadRf,
    Body,
    GrayHead,
}

impl CubImageFolder {
    pub fn folder_name(self) -> &'static str {
        match self {
            Self::Original => "images",
            Self::Segmented => "images_segmented",
            Self::Head => "images_head",
            Self::HeadRf => "images_head_rf",
            Self::Body => "images_body",
            Self::GrayHead => "images_gray_head",
        }
    }

    pub fn cropped_folder_name(self) -> &'static str {
        match self {
            Self::Segmented => "images_segmented_cropped",
            _ => "images_cropped",
        }
    }
}

/// One row of `images.txt`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub img_id: ImageId,
    pub img_file: PathBuf,
    /// Path relative to the image folder, e.g. `001.Black_footed_Albatross/x.jpg`
    pub img_file_rel: PathBuf,
}

impl Record for ImageInfo {
    fn img_id(&self) -> &ImageId {
        &self.img_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentationInfo {
    pub img_id: ImageId,
    pub seg_file: PathBuf,
}

impl Record for SegmentationInfo {
    fn img_id(&self) -> &ImageId {
        &self.img_id
    }
}

/// Everything the metadata files say about one image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CubRecord {
    pub img_id: ImageId,
    pub img_file: PathBuf,
    pub img_file_rel: PathBuf,
    pub split: Split,
    pub class_label: u32,
    pub bbox: BoundingBox,
}

impl Record for CubRecord {
    fn img_id(&self) -> &ImageId {
        &self.img_id
    }
}

#[allow(non_camel_case_types)]
#[derive(Debug, Clone)]
pub struct Cub200_2011 {
    base_path: PathBuf,
    images_folder: PathBuf,
    images_folder_cropped: PathBuf,
    segmentation_folder: PathBuf,
    full_length: Option<usize>,
}

impl Cub200_2011 {
    pub const IMAGES_FILE: &'static str = "images.txt";
    pub const SPLIT_FILE: &'static str = "train_test_split.txt";
    pub const CLASS_LABEL_FILE: &'static str = "image_class_labels.txt";
    pub const BBOX_FILE: &'static str = "bounding_boxes.txt";
    pub const PARTS_FOLDER: &'static str = "parts";
    pub const PARTS_FILE: &'static str = "parts.txt";
    pub const PART_LOCS_FILE: &'static str = "part_locs.txt";
    pub const SEGMENTATIONS_FOLDER: &'static str = "segmentations";

    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self::with_variant(base_path, CubImageFolder::Original)
    }

    pub fn with_variant(base_path: impl Into<PathBuf>, variant: CubImageFolder) -> Self {
        let base_path = base_path.into();
        Self {
            images_folder: base_path.join(variant.folder_name()),
            images_folder_cropped: base_path.join(variant.cropped_folder_name()),
            segmentation_folder: base_path
                .join("..")
                .join("..")
                .join(Self::SEGMENTATIONS_FOLDER),
            base_path,
            full_length: None,
        }
    }

    /// Read uncropped images from `{base}/{folder}` instead
    pub fn with_images_folder(mut self, folder: &str) -> Self {
        self.images_folder = self.base_path.join(folder);
        self
    }

    /// Every training image contributes `full_length` feature rows
    pub fn with_full(mut self, full_length: usize) -> Self {
        self.full_length = Some(full_length);
        self
    }

    pub fn from_config(config: &CubConfig) -> Self {
        let mut dataset = Self::new(&config.base_path);
        if let Some(folder) = &config.images_folder {
            dataset = dataset.with_images_folder(folder);
        }
        if config.full {
            dataset = dataset.with_full(config.full_length);
        }
        dataset
    }

    pub fn images_folder(&self, cropped: bool) -> &Path {
        if cropped {
            &self.images_folder_cropped
        } else {
            &self.images_folder
        }
    }

    pub fn segmentation_folder(&self) -> &Path {
        &self.segmentation_folder
    }

    pub fn is_full(&self) -> bool {
        self.full_length.is_some()
    }

    pub fn full_length(&self) -> Option<usize> {
        self.full_length
    }

    fn metadata_file(&self, name: &str) -> PathBuf {
        self.base_path.join(name)
    }

    fn parts_file(&self, name: &str) -> PathBuf {
        self.base_path.join(Self::PARTS_FOLDER).join(name)
    }

    /// Lazily read `images.txt`
    pub fn all_images(&self, cropped: bool) -> Result<impl Iterator<Item = Result<ImageInfo>> + '_> {
        let folder = self.images_folder(cropped);
        let lines = LineReader::open(self.metadata_file(Self::IMAGES_FILE))?;
        Ok(lines.map(move |line| {
            let line = line?;
            line.expect_fields(2)?;
            let img_file_rel = PathBuf::from(&line.fields[1]);
            Ok(ImageInfo {
                img_id: line.img_id(),
                img_file: folder.join(&img_file_rel),
                img_file_rel,
            })
        }))
    }

    /// Segmentation mask of every image: the image path with a `png` extension
    pub fn all_segmentations(&self) -> Result<impl Iterator<Item = Result<SegmentationInfo>> + '_> {
        let images = self.all_images(false)?;
        Ok(images.map(move |info| {
            let info = info?;
            Ok(SegmentationInfo {
                seg_file: self
                    .segmentation_folder
                    .join(info.img_file_rel.with_extension("png")),
                img_id: info.img_id,
            })
        }))
    }

    /// Linear scan; prefer [`Self::all_segmentation_infos`] for repeated lookups
    pub fn segmentation_info(&self, img_id: &ImageId) -> Result<PathBuf> {
        for info in self.all_segmentations()? {
            let info = info?;
            if &info.img_id == img_id {
                return Ok(info.seg_file);
            }
        }
        Err(DatasetError::NotFound(img_id.clone()))
    }

    pub fn all_segmentation_infos(&self) -> Result<HashMap<ImageId, PathBuf>> {
        collect_unique(
            self.all_segmentations()?
                .map(|info| info.map(|info| (info.img_id, info.seg_file))),
            Self::IMAGES_FILE,
        )
    }

    /// Linear scan; prefer [`Self::all_image_infos`] for repeated lookups
    pub fn image_info(&self, img_id: &ImageId) -> Result<PathBuf> {
        for info in self.all_images(false)? {
            let info = info?;
            if &info.img_id == img_id {
                return Ok(info.img_file);
            }
        }
        Err(DatasetError::NotFound(img_id.clone()))
    }

    pub fn all_image_infos(&self, relative: bool) -> Result<HashMap<ImageId, PathBuf>> {
        collect_unique(
            self.all_images(false)?.map(|info| {
                info.map(|info| {
                    let path = if relative { info.img_file_rel } else { info.img_file };
                    (info.img_id, path)
                })
            }),
            Self::IMAGES_FILE,
        )
    }

    /// `train_test_split.txt` in file order
    pub fn split_membership(&self) -> Result<Vec<(ImageId, Split)>> {
        LineReader::open(self.metadata_file(Self::SPLIT_FILE))?
            .map(|line| parse_split(&line?))
            .collect()
    }

    /// Train and test ids, each in split-file order
    pub fn train_test_ids(&self) -> Result<(Vec<ImageId>, Vec<ImageId>)> {
        let mut train = Vec::new();
        let mut test = Vec::new();
        for (img_id, split) in self.split_membership()? {
            match split {
                Split::Train => train.push(img_id),
                Split::Test => test.push(img_id),
            }
        }
        Ok((train, test))
    }

    /// `image_class_labels.txt` as `img_id -> class`
    pub fn class_dict(&self) -> Result<HashMap<ImageId, u32>> {
        index_by_id(&self.metadata_file(Self::CLASS_LABEL_FILE), |line| {
            line.expect_fields(2)?;
            Ok((line.img_id(), line.field(1, "class label")?))
        })
    }

    /// `bounding_boxes.txt` as `img_id -> box`
    pub fn bounding_boxes(&self) -> Result<HashMap<ImageId, BoundingBox>> {
        index_by_id(&self.metadata_file(Self::BBOX_FILE), |line| {
            line.expect_fields(5)?;
            let bbox = BoundingBox::new(
                line.field(1, "bbox x")?,
                line.field(2, "bbox y")?,
                line.field(3, "bbox width")?,
                line.field(4, "bbox height")?,
            );
            Ok((line.img_id(), bbox))
        })
    }

    /// `parts/parts.txt` as `part_id -> name`; names may contain spaces
    pub fn part_names(&self) -> Result<BTreeMap<u32, String>> {
        let mut names = BTreeMap::new();
        for line in LineReader::open(self.parts_file(Self::PARTS_FILE))? {
            let line = line?;
            if line.fields.len() < 2 {
                return Err(line.malformed("expected a part id and a name".to_string()));
            }
            names.insert(line.field(0, "part id")?, line.rest(1));
        }
        Ok(names)
    }

    /// Part locations grouped per image, plus names and bounding boxes
    pub fn parts(&self) -> Result<CubParts> {
        let mut locations: HashMap<ImageId, Vec<PartLocation>> = HashMap::new();
        for line in LineReader::open(self.parts_file(Self::PART_LOCS_FILE))? {
            let line = line?;
            line.expect_fields(5)?;
            let visible: u8 = line.field(4, "visibility flag")?;
            let part = PartLocation {
                part_id: line.field(1, "part id")?,
                location: Point2D::new(line.field(2, "part x")?, line.field(3, "part y")?),
                visible: visible != 0,
            };
            locations.entry(line.img_id()).or_default().push(part);
        }
        Ok(CubParts::new(self.part_names()?, locations, self.bounding_boxes()?))
    }

    /// Join every metadata file on `img_id`, in `images.txt` order.
    ///
    /// Every image must appear exactly once in the split, class-label and
    /// bounding-box files, and those files may not mention unknown images.
    pub fn records(&self) -> Result<Vec<CubRecord>> {
        let mut splits = collect_unique(
            self.split_membership()?.into_iter().map(Ok),
            Self::SPLIT_FILE,
        )?;
        let mut classes = self.class_dict()?;
        let mut bboxes = self.bounding_boxes()?;

        let mut records = Vec::new();
        let mut seen = HashSet::new();
        for info in self.all_images(false)? {
            let info = info?;
            if !seen.insert(info.img_id.clone()) {
                return Err(DatasetError::DuplicateEntry {
                    img_id: info.img_id,
                    file: Self::IMAGES_FILE.to_string(),
                });
            }
            let missing = |file: &str| DatasetError::MissingEntry {
                img_id: info.img_id.clone(),
                file: file.to_string(),
            };
            let split = splits.remove(&info.img_id).ok_or_else(|| missing(Self::SPLIT_FILE))?;
            let class_label = classes
                .remove(&info.img_id)
                .ok_or_else(|| missing(Self::CLASS_LABEL_FILE))?;
            let bbox = bboxes.remove(&info.img_id).ok_or_else(|| missing(Self::BBOX_FILE))?;

            records.push(CubRecord {
                img_id: info.img_id,
                img_file: info.img_file,
                img_file_rel: info.img_file_rel,
                split,
                class_label,
                bbox,
            });
        }

        let orphan = splits
            .into_keys()
            .chain(classes.into_keys())
            .chain(bboxes.into_keys())
            .min();
        if let Some(img_id) = orphan {
            return Err(DatasetError::MissingEntry {
                img_id,
                file: Self::IMAGES_FILE.to_string(),
            });
        }

        debug!("Joined {} CUB records", records.len());
        Ok(records)
    }

    fn records_in(&self, split: Split) -> Result<RecordStream<'_, CubRecord>> {
        let records = self.records()?;
        Ok(Box::new(
            records
                .into_iter()
                .filter(move |record| record.split == split)
                .map(Ok::<_, DatasetError>),
        ))
    }

    /// Dense train/test matrices read through `extractor`.
    ///
    /// In full mode every training image yields `full_length` rows and the
    /// test images are read with `test_extractor`, one row each.
    pub fn train_test(
        &self,
        extractor: &dyn FeatureReader,
        test_extractor: Option<&dyn FeatureReader>,
        x_dim: usize,
    ) -> Result<TrainTestSplit> {
        if x_dim == 0 {
            return Err(DatasetError::InvalidConfig(
                "feature width must be at least 1".to_string(),
            ));
        }
        let (train_rows, test_reader) = match self.full_length {
            Some(0) => {
                return Err(DatasetError::InvalidConfig(
                    "full_length must be at least 1".to_string(),
                ));
            }
            Some(full_length) => {
                let reader = test_extractor.ok_or_else(|| {
                    DatasetError::InvalidConfig(
                        "full mode needs a separate extractor for test images".to_string(),
                    )
                })?;
                (full_length, reader)
            }
            None => (1, extractor),
        };

        let mut train = MatrixBuilder::new(x_dim);
        let mut test = MatrixBuilder::new(x_dim);
        for record in self.records()? {
            match record.split {
                Split::Train => {
                    let values = extractor.read(&record.img_id)?;
                    train.push(&record.img_id, record.class_label, train_rows, values)?;
                }
                Split::Test => {
                    let values = test_reader.read(&record.img_id)?;
                    test.push(&record.img_id, record.class_label, 1, values)?;
                }
            }
        }

        let (x_train, y_train, train_ids) = train.finish()?;
        let (x_test, y_test, test_ids) = test.finish()?;
        info!(
            "Assembled CUB features: {} train rows, {} test rows, width {}",
            x_train.nrows(),
            x_test.nrows(),
            x_dim
        );
        Ok(TrainTestSplit {
            x_train,
            y_train,
            train_ids,
            x_test,
            y_test,
            test_ids,
        })
    }

    /// One crop per image: original folder to cropped folder, cut to the bbox
    pub fn crop_jobs(&self) -> Result<Vec<CropJob>> {
        let mut bboxes = self.bounding_boxes()?;
        let mut jobs = Vec::new();
        for info in self.all_images(false)? {
            let info = info?;
            let bbox = bboxes
                .remove(&info.img_id)
                .ok_or_else(|| DatasetError::MissingEntry {
                    img_id: info.img_id.clone(),
                    file: Self::BBOX_FILE.to_string(),
                })?;
            jobs.push(CropJob {
                destination: self.images_folder_cropped.join(&info.img_file_rel),
                source: info.img_file,
                img_id: info.img_id,
                bbox,
            });
        }
        Ok(jobs)
    }

    /// Create the cropped folder tree and crop every image. Returns the count.
    pub fn generate_cropped_images(&self, cropper: &dyn ImageCropper) -> Result<usize> {
        let jobs = self.crop_jobs()?;
        for job in &jobs {
            if let Some(parent) = job.destination.parent() {
                fs::create_dir_all(parent).map_err(|source| DatasetError::io(parent, source))?;
            }
            cropper.crop(job)?;
            debug!("Cropped {} -> {}", job.img_id, job.destination.display());
        }
        info!(
            "Cropped {} images into {}",
            jobs.len(),
            self.images_folder_cropped.display()
        );
        Ok(jobs.len())
    }
}

impl Dataset for Cub200_2011 {
    type Record = CubRecord;
    const NAME: &'static str = "CUB_200_2011";

    fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn train(&self) -> Result<RecordStream<'_, CubRecord>> {
        self.records_in(Split::Train)
    }

    fn test(&self) -> Result<RecordStream<'_, CubRecord>> {
        self.records_in(Split::Test)
    }
}

fn parse_split(line: &Line) -> Result<(ImageId, Split)> {
    line.expect_fields(2)?;
    let img_id = line.img_id();
    let split = Split::from_indicator(&img_id, &line.fields[1])?;
    Ok((img_id, split))
}

fn collect_unique<T, I>(entries: I, file: &str) -> Result<HashMap<ImageId, T>>
where
    I: Iterator<Item = Result<(ImageId, T)>>,
{
    let mut map = HashMap::new();
    for entry in entries {
        let (img_id, value) = entry?;
        if map.contains_key(&img_id) {
            return Err(DatasetError::DuplicateEntry {
                img_id,
                file: file.to_string(),
            });
        }
        map.insert(img_id, value);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        base: PathBuf,
    }

    impl Fixture {
        fn write(&self, name: &str, content: &str) {
            let path = self.base.join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
    }

    /// Four images: 1 and 3 train, 2 and 4 test
    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("data/CUB_200_2011");
        let fixture = Fixture { _dir: dir, base };
        fixture.write(
            "images.txt",
            "1 001.Black_footed_Albatross/a.jpg\n\
             2 001.Black_footed_Albatross/b.jpg\n\
             3 002.Laysan_Albatross/c.jpg\n\
             4 002.Laysan_Albatross/d.jpg\n",
        );
        fixture.write("train_test_split.txt", "1 1\n2 0\n3 1\n4 0\n");
        fixture.write("image_class_labels.txt", "1 1\n2 1\n3 2\n4 2\n");
        fixture.write(
            "bounding_boxes.txt",
            "1 60.0 27.0 325.0 304.0\n\
             2 139.0 30.0 153.0 264.0\n\
             3 14.0 112.0 388.0 186.0\n\
             4 112.0 90.0 255.0 242.0\n",
        );
        fixture.write("parts/parts.txt", "1 back\n2 beak\n3 left eye\n");
        fixture.write(
            "parts/part_locs.txt",
            "1 1 0.0 0.0 0\n\
             1 2 312.0 182.0 1\n\
             1 3 215.0 110.0 1\n\
             2 1 150.0 100.0 1\n",
        );
        fixture
    }

    /// `[id; rows * width]` so rows can be traced back to their image
    fn reader(rows: usize, width: usize) -> impl Fn(&ImageId) -> Result<Vec<f32>> {
        move |id: &ImageId| Ok(vec![id.as_number().unwrap_or(0) as f32; rows * width])
    }

    #[test]
    fn test_all_images_resolves_folders() {
        let fx = fixture();
        let dataset = Cub200_2011::new(&fx.base);

        let images: Vec<ImageInfo> = dataset.all_images(false).unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(images.len(), 4);
        assert_eq!(images[0].img_id, ImageId::from(1u32));
        assert_eq!(
            images[0].img_file,
            fx.base.join("images/001.Black_footed_Albatross/a.jpg")
        );

        let cropped: Vec<ImageInfo> = dataset.all_images(true).unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(
            cropped[2].img_file,
            fx.base.join("images_cropped/002.Laysan_Albatross/c.jpg")
        );
        assert_eq!(cropped[2].img_file_rel, PathBuf::from("002.Laysan_Albatross/c.jpg"));
    }

    #[test]
    fn test_variants_and_override() {
        let fx = fixture();
        let segmented = Cub200_2011::with_variant(&fx.base, CubImageFolder::Segmented);
        assert_eq!(segmented.images_folder(false), fx.base.join("images_segmented"));
        assert_eq!(segmented.images_folder(true), fx.base.join("images_segmented_cropped"));

        let head = Cub200_2011::with_variant(&fx.base, "head_rf".parse().unwrap());
        assert_eq!(head.images_folder(false), fx.base.join("images_head_rf"));

        let custom = Cub200_2011::new(&fx.base).with_images_folder("images_gray_head");
        assert_eq!(custom.image_info(&ImageId::from(2u32)).unwrap(),
            fx.base.join("images_gray_head/001.Black_footed_Albatross/b.jpg"));
    }

    #[test]
    fn test_malformed_images_line() {
        let fx = fixture();
        fx.write("images.txt", "1 a.jpg\n2 b.jpg extra\n");
        let dataset = Cub200_2011::new(&fx.base);

        let mut images = dataset.all_images(false).unwrap();
        assert!(images.next().unwrap().is_ok());
        assert!(matches!(
            images.next().unwrap(),
            Err(DatasetError::MalformedLine { line: 2, .. })
        ));
    }

    #[test]
    fn test_segmentations() {
        let fx = fixture();
        let dataset = Cub200_2011::new(&fx.base);
        let seg_root = fx.base.join("..").join("..").join("segmentations");

        assert_eq!(
            dataset.segmentation_info(&ImageId::from(3u32)).unwrap(),
            seg_root.join("002.Laysan_Albatross/c.png")
        );
        assert!(matches!(
            dataset.segmentation_info(&ImageId::from(99u32)),
            Err(DatasetError::NotFound(_))
        ));
        let all = dataset.all_segmentation_infos().unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all[&ImageId::from(1u32)], seg_root.join("001.Black_footed_Albatross/a.png"));
    }

    #[test]
    fn test_image_info_maps() {
        let fx = fixture();
        let dataset = Cub200_2011::new(&fx.base);

        let relative = dataset.all_image_infos(true).unwrap();
        assert_eq!(relative[&ImageId::from(4u32)], PathBuf::from("002.Laysan_Albatross/d.jpg"));
        let absolute = dataset.all_image_infos(false).unwrap();
        assert_eq!(
            absolute[&ImageId::from(4u32)],
            fx.base.join("images/002.Laysan_Albatross/d.jpg")
        );
    }

    #[test]
    fn test_split_and_labels() {
        let fx = fixture();
        let dataset = Cub200_2011::new(&fx.base);

        let (train, test) = dataset.train_test_ids().unwrap();
        assert_eq!(train, vec![ImageId::from(1u32), ImageId::from(3u32)]);
        assert_eq!(test, vec![ImageId::from(2u32), ImageId::from(4u32)]);

        let classes = dataset.class_dict().unwrap();
        assert_eq!(classes[&ImageId::from(3u32)], 2);

        let bboxes = dataset.bounding_boxes().unwrap();
        assert_eq!(bboxes[&ImageId::from(1u32)], BoundingBox::new(60.0, 27.0, 325.0, 304.0));
    }

    #[test]
    fn test_unknown_indicator() {
        let fx = fixture();
        fx.write("train_test_split.txt", "1 1\n2 7\n");
        let err = Cub200_2011::new(&fx.base).train_test_ids().unwrap_err();
        match err {
            DatasetError::UnknownIndicator { img_id, indicator } => {
                assert_eq!(img_id, ImageId::from(2u32));
                assert_eq!(indicator, "7");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parts() {
        let fx = fixture();
        let parts = Cub200_2011::new(&fx.base).parts().unwrap();

        assert_eq!(parts.part_name(3), Some("left eye"));
        let first = ImageId::from(1u32);
        assert_eq!(parts.for_image(&first).unwrap().len(), 3);
        assert_eq!(parts.visible(&first).count(), 2);
        assert_eq!(parts.bbox(&first).unwrap().width, 325.0);
        assert!(parts.for_image(&ImageId::from(3u32)).is_none());
    }

    #[test]
    fn test_records_join_by_id() {
        let fx = fixture();
        // Same content, different line order
        fx.write("image_class_labels.txt", "4 2\n3 2\n2 1\n1 1\n");
        let records = Cub200_2011::new(&fx.base).records().unwrap();

        assert_eq!(records.len(), 4);
        assert_eq!(records[2].img_id, ImageId::from(3u32));
        assert_eq!(records[2].class_label, 2);
        assert_eq!(records[2].split, Split::Train);
        assert_eq!(records[1].bbox.x, 139.0);
    }

    #[test]
    fn test_records_reject_missing_and_duplicate_ids() {
        let fx = fixture();
        fx.write("bounding_boxes.txt", "1 0 0 1 1\n2 0 0 1 1\n3 0 0 1 1\n");
        assert!(matches!(
            Cub200_2011::new(&fx.base).records(),
            Err(DatasetError::MissingEntry { ref file, .. }) if file == "bounding_boxes.txt"
        ));

        let fx = fixture();
        fx.write("image_class_labels.txt", "1 1\n2 1\n3 2\n4 2\n3 2\n");
        assert!(matches!(
            Cub200_2011::new(&fx.base).records(),
            Err(DatasetError::DuplicateEntry { .. })
        ));

        let fx = fixture();
        let images = fs::read_to_string(fx.base.join("images.txt")).unwrap();
        fx.write("images.txt", &format!("{images}3 b/c.jpg\n"));
        match Cub200_2011::new(&fx.base).records() {
            Err(DatasetError::DuplicateEntry { img_id, file }) => {
                assert_eq!(img_id, ImageId::from(3u32));
                assert_eq!(file, "images.txt");
            }
            other => panic!("unexpected {other:?}"),
        }

        let fx = fixture();
        fx.write("train_test_split.txt", "1 1\n2 0\n3 1\n4 0\n5 1\n");
        match Cub200_2011::new(&fx.base).records() {
            Err(DatasetError::MissingEntry { img_id, file }) => {
                assert_eq!(img_id, ImageId::from(5u32));
                assert_eq!(file, "images.txt");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_dataset_trait_streams() {
        let fx = fixture();
        let dataset = Cub200_2011::new(&fx.base);
        assert_eq!(dataset.name(), "CUB_200_2011");

        let train: Vec<CubRecord> = dataset.train().unwrap().collect::<Result<_>>().unwrap();
        let test: Vec<CubRecord> = dataset.test().unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(train.iter().map(|r| r.img_id.as_str()).collect::<Vec<_>>(), ["1", "3"]);
        assert_eq!(test.iter().map(|r| r.img_id.as_str()).collect::<Vec<_>>(), ["2", "4"]);
    }

    #[test]
    fn test_train_test_matrices() {
        let fx = fixture();
        let dataset = Cub200_2011::new(&fx.base);

        let split = dataset.train_test(&reader(1, 3), None, 3).unwrap();
        assert_eq!(split.x_train.dim(), (2, 3));
        assert_eq!(split.x_test.dim(), (2, 3));
        assert_eq!(split.y_train.to_vec(), vec![1, 2]);
        assert_eq!(split.y_test.to_vec(), vec![1, 2]);
        assert_eq!(split.x_train.row(1).to_vec(), vec![3.0; 3]);
        assert_eq!(split.x_test.row(0).to_vec(), vec![2.0; 3]);

        let samples: Vec<_> = split.test_samples().collect();
        assert_eq!(samples[1].0, ImageId::from(4u32));
        assert_eq!(samples[1].1.len(), 3);
    }

    #[test]
    fn test_full_mode_replicates_training_rows() {
        let fx = fixture();
        let dataset = Cub200_2011::new(&fx.base).with_full(10);

        let split = dataset
            .train_test(&reader(10, 4), Some(&reader(1, 4)), 4)
            .unwrap();
        assert_eq!(split.n_train(), 20);
        assert_eq!(split.n_test(), 2);
        assert_eq!(&split.y_train.to_vec()[..10], &[1; 10]);
        assert_eq!(&split.y_train.to_vec()[10..], &[2; 10]);
        assert_eq!(split.train_ids[15], ImageId::from(3u32));
        assert_eq!(split.train_samples().count(), 20);
    }

    #[test]
    fn test_full_mode_needs_test_reader_and_right_shapes() {
        let fx = fixture();
        let dataset = Cub200_2011::new(&fx.base).with_full(10);
        assert!(matches!(
            dataset.train_test(&reader(10, 4), None, 4),
            Err(DatasetError::InvalidConfig(_))
        ));
        assert!(matches!(
            dataset.train_test(&reader(1, 4), Some(&reader(1, 4)), 4),
            Err(DatasetError::ExtractorShape { expected: 40, found: 4, .. })
        ));
    }

    #[test]
    fn test_reader_failure_propagates() {
        let fx = fixture();
        let failing = |id: &ImageId| -> Result<Vec<f32>> {
            Err(DatasetError::Extractor {
                img_id: id.clone(),
                message: "missing activations".to_string(),
            })
        };
        let err = Cub200_2011::new(&fx.base).train_test(&failing, None, 2).unwrap_err();
        assert!(matches!(err, DatasetError::Extractor { .. }));
    }

    #[test]
    fn test_from_config() {
        let fx = fixture();
        let config = CubConfig {
            base_path: fx.base.clone(),
            images_folder: Some("images_body".to_string()),
            full: true,
            full_length: 5,
            feature_dim: 8,
        };
        let dataset = Cub200_2011::from_config(&config);
        assert_eq!(dataset.full_length(), Some(5));
        assert_eq!(dataset.images_folder(false), fx.base.join("images_body"));
        assert_eq!(dataset.images_folder(true), fx.base.join("images_cropped"));
    }

    #[test]
    fn test_generate_cropped_images() {
        let fx = fixture();
        let dataset = Cub200_2011::new(&fx.base);
        let seen = RefCell::new(Vec::new());
        let cropper = |job: &CropJob| -> Result<()> {
            assert!(job.destination.parent().unwrap().is_dir());
            seen.borrow_mut().push((job.img_id.clone(), job.window()));
            Ok(())
        };

        assert_eq!(dataset.generate_cropped_images(&cropper).unwrap(), 4);
        let seen = seen.into_inner();
        assert_eq!(seen[0], (ImageId::from(1u32), (60, 27, 325, 304)));
        assert!(fx.base.join("images_cropped/002.Laysan_Albatross").is_dir());
    }
}
