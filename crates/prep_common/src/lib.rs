//! # Prep Common - Shared Types and Configuration
//!
//! Foundational types shared by the dataset readers, the storage layer and the
//! feature transforms: image identifiers, the [`Record`] trait every dataset
//! record implements, simple geometry, and the workspace configuration.
//!
//! ## Example
//!
//! ```rust
//! use prep_common::{BoundingBox, ImageId, Point2D, Record};
//!
//! let id = ImageId::from(42u32);
//! assert_eq!(id.as_str(), "42");
//! assert_eq!(id.img_id(), &id);
//!
//! let bbox = BoundingBox::new(60.0, 27.0, 325.0, 304.0);
//! assert!(bbox.contains(Point2D::new(100.0, 100.0)));
//! ```

pub mod config;

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use config::{CubConfig, PcaConfig, PrepConfig, StorageConfig, VocConfig};

/// Result type for configuration and shared-type operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Error type for configuration loading and validation
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unsupported config format for '{path}'. Please use .toml or .json files")]
    UnsupportedFileFormat { path: String },

    #[error("Configuration validation failed: {details}")]
    ValidationFailed { details: String },

    #[error("Invalid value: {message}")]
    InvalidValue { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),

    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),
}

/// Identifier of one dataset image, stable across every metadata file.
///
/// CUB uses integers (`"1"`, `"2"`, ...) and VOC uses zero-padded names
/// (`"000012"`), so the id is kept as the string found in the files.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ImageId(String);

impl ImageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value of the id, if it is an integer id.
    pub fn as_number(&self) -> Option<u64> {
        self.0.parse().ok()
    }

    /// Whether the id can be used verbatim as a single file name.
    pub fn is_file_name_safe(&self) -> bool {
        !self.0.is_empty()
            && self.0 != "."
            && self.0 != ".."
            && !self.0.chars().any(|c| matches!(c, '/' | '\\' | '\0'))
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ImageId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ImageId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<u32> for ImageId {
    fn from(value: u32) -> Self {
        Self(value.to_string())
    }
}

impl AsRef<str> for ImageId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Anything produced by a dataset reader that describes one image.
///
/// The transforms only ever look at [`Record::img_id`]; every other field
/// passes through untouched.
pub trait Record {
    fn img_id(&self) -> &ImageId;
}

impl Record for ImageId {
    fn img_id(&self) -> &ImageId {
        self
    }
}

impl<T: Record + ?Sized> Record for &T {
    fn img_id(&self) -> &ImageId {
        (**self).img_id()
    }
}

impl<T: Record + ?Sized> Record for Box<T> {
    fn img_id(&self) -> &ImageId {
        (**self).img_id()
    }
}

/// 2D point with floating-point coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    /// Create a new point
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Translate this point by the given offsets
    pub fn translate(self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// Axis-aligned box in image pixel coordinates, stored as `x y width height`
/// exactly like the dataset annotation files.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn origin(&self) -> Point2D {
        Point2D::new(self.x, self.y)
    }

    /// Check if a point is inside this box
    pub fn contains(&self, point: Point2D) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }

    /// Integer pixel window `(x, y, width, height)` covered by the box,
    /// clamped at the image origin.
    pub fn pixel_window(&self) -> (u32, u32, u32, u32) {
        let x = self.x.max(0.0).floor() as u32;
        let y = self.y.max(0.0).floor() as u32;
        let width = self.width.max(0.0).floor() as u32;
        let height = self.height.max(0.0).floor() as u32;
        (x, y, width, height)
    }
}
