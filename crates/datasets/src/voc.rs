//! PASCAL VOC 2006: ten object classes with per-object annotations.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use prep_common::{BoundingBox, ImageId, Record, VocConfig};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};
use tracing::debug;

use crate::{
    Dataset, RecordStream,
    error::{DatasetError, Result},
    lines::{Line, LineReader},
};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter, IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SetKind {
    Train,
    Test,
    Val,
    Trainval,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum VocClass {
    Bicycle,
    Bus,
    Car,
    Motorbike,
    Cat,
    Cow,
    Dog,
    Horse,
    Sheep,
    Person,
}

/// One annotated object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocObject {
    pub class: VocClass,
    pub bbox: BoundingBox,
    #[serde(default)]
    pub pose: Option<String>,
    #[serde(default)]
    pub truncated: bool,
    #[serde(default)]
    pub difficult: bool,
}

/// Turns the text of one annotation file into its objects
pub trait AnnotationParser {
    fn parse(&self, content: &str) -> std::result::Result<Vec<VocObject>, String>;
}

impl<F> AnnotationParser for F
where
    F: Fn(&str) -> std::result::Result<Vec<VocObject>, String>,
{
    fn parse(&self, content: &str) -> std::result::Result<Vec<VocObject>, String> {
        self(content)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocRecord {
    pub img_id: ImageId,
    pub img_file: PathBuf,
    /// Distinct classes among `objects`, sorted
    pub classes: Vec<VocClass>,
    pub objects: Vec<VocObject>,
}

impl Record for VocRecord {
    fn img_id(&self) -> &ImageId {
        &self.img_id
    }
}

/// Sorted, deduplicated classes of a set of objects
pub fn all_classes(objects: &[VocObject]) -> Vec<VocClass> {
    objects
        .iter()
        .map(|object| object.class)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub struct PascalVoc2006 {
    base_path: PathBuf,
    annotations: PathBuf,
    sets: PathBuf,
    images: PathBuf,
    parser: Box<dyn AnnotationParser>,
}

impl PascalVoc2006 {
    pub const ANNOTATIONS_FOLDER: &'static str = "Annotations";
    pub const SETS_FOLDER: &'static str = "ImageSets";
    pub const IMAGES_FOLDER: &'static str = "PNGImages";
    pub const SETS_FILE_EXT: &'static str = "txt";
    pub const ANNOTATIONS_FILE_EXT: &'static str = "txt";
    pub const IMAGE_FILE_EXT: &'static str = "png";
    pub const POSITIVE: &'static str = "1";
    pub const DIFFICULT: &'static str = "0";
    pub const NEGATIVE: &'static str = "-1";

    pub fn new(base_path: impl Into<PathBuf>, parser: impl AnnotationParser + 'static) -> Self {
        let base_path = base_path.into();
        Self {
            annotations: base_path.join(Self::ANNOTATIONS_FOLDER),
            sets: base_path.join(Self::SETS_FOLDER),
            images: base_path.join(Self::IMAGES_FOLDER),
            base_path,
            parser: Box::new(parser),
        }
    }

    pub fn from_config(config: &VocConfig, parser: impl AnnotationParser + 'static) -> Self {
        Self::new(&config.base_path, parser)
    }

    pub fn classes(&self) -> Vec<VocClass> {
        VocClass::iter().collect()
    }

    fn set_file(&self, kind: SetKind, object_class: Option<VocClass>) -> PathBuf {
        let name = match object_class {
            Some(class) => format!("{class}_{kind}.{}", Self::SETS_FILE_EXT),
            None => format!("{kind}.{}", Self::SETS_FILE_EXT),
        };
        self.sets.join(name)
    }

    /// Lazily read one image set.
    ///
    /// Images listed as positive or difficult are loaded; objects flagged
    /// difficult or truncated are dropped unless allowed, and images left
    /// without objects are skipped.
    pub fn set(
        &self,
        kind: SetKind,
        object_class: Option<VocClass>,
        difficult: bool,
        truncated: bool,
    ) -> Result<impl Iterator<Item = Result<VocRecord>> + '_> {
        let path = self.set_file(kind, object_class);
        debug!("Reading VOC set {}", path.display());
        let lines = LineReader::open(path)?;
        Ok(lines.filter_map(move |line| {
            line.and_then(|line| self.parse_set_line(&line, difficult, truncated))
                .transpose()
        }))
    }

    /// [`Self::set`] with the set and class given by name
    pub fn set_by_name(
        &self,
        kind: &str,
        object_class: Option<&str>,
        difficult: bool,
        truncated: bool,
    ) -> Result<impl Iterator<Item = Result<VocRecord>> + '_> {
        let kind: SetKind = kind
            .parse()
            .map_err(|_| DatasetError::UnknownSet(kind.to_string()))?;
        let object_class = object_class
            .map(|name| {
                name.parse::<VocClass>()
                    .map_err(|_| DatasetError::UnknownClass(name.to_string()))
            })
            .transpose()?;
        self.set(kind, object_class, difficult, truncated)
    }

    fn parse_set_line(&self, line: &Line, difficult: bool, truncated: bool) -> Result<Option<VocRecord>> {
        let present = match line.fields.as_slice() {
            [_] => true,
            [_, flag] => match flag.as_str() {
                Self::POSITIVE | Self::DIFFICULT => true,
                Self::NEGATIVE => false,
                other => return Err(line.malformed(format!("unknown membership flag '{other}'"))),
            },
            fields => {
                return Err(line.malformed(format!("expected 1 or 2 fields, found {}", fields.len())));
            }
        };
        if !present {
            return Ok(None);
        }

        let img_id = line.img_id();
        let mut objects = self.read_annotation(&img_id)?;
        objects.retain(|object| (difficult || !object.difficult) && (truncated || !object.truncated));
        if objects.is_empty() {
            debug!("Skipping {img_id}: no objects left");
            return Ok(None);
        }

        Ok(Some(VocRecord {
            img_file: self
                .images
                .join(format!("{img_id}.{}", Self::IMAGE_FILE_EXT)),
            classes: all_classes(&objects),
            objects,
            img_id,
        }))
    }

    fn read_annotation(&self, img_id: &ImageId) -> Result<Vec<VocObject>> {
        let path = self
            .annotations
            .join(format!("{img_id}.{}", Self::ANNOTATIONS_FILE_EXT));
        let content = fs::read_to_string(&path).map_err(|source| DatasetError::io(&path, source))?;
        self.parser
            .parse(&content)
            .map_err(|message| DatasetError::Annotation { path, message })
    }
}

impl Dataset for PascalVoc2006 {
    type Record = VocRecord;
    const NAME: &'static str = "PASCAL_VOC_2006";

    fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn train(&self) -> Result<RecordStream<'_, VocRecord>> {
        Ok(Box::new(self.set(SetKind::Trainval, None, true, true)?))
    }

    fn test(&self) -> Result<RecordStream<'_, VocRecord>> {
        Ok(Box::new(self.set(SetKind::Test, None, true, true)?))
    }
}
