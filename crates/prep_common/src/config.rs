use std::fs;
use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// Number of augmented views stored per training image in "full" mode.
pub const DEFAULT_FULL_LENGTH: usize = 10;
/// Width of the raw feature vectors produced by the default extractor.
pub const DEFAULT_FEATURE_DIM: usize = 4096;
/// Target dimensionality of the PCA transform.
pub const DEFAULT_PCA_COMPONENTS: usize = 50;

/// Top-level configuration for a preprocessing run
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct PrepConfig {
    pub storage: StorageConfig,
    #[serde(default)]
    pub cub: Option<CubConfig>,
    #[serde(default)]
    pub voc: Option<VocConfig>,
    #[serde(default)]
    pub pca: PcaConfig,
}

/// Where models and cached artifacts are written
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct StorageConfig {
    pub root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct CubConfig {
    /// Directory holding `images.txt`, `train_test_split.txt`, ...
    pub base_path: PathBuf,
    /// Overrides the image folder name (e.g. `images_head`)
    #[serde(default)]
    pub images_folder: Option<String>,
    /// Replicate every training image into `full_length` views
    #[serde(default)]
    pub full: bool,
    #[serde(default = "default_full_length")]
    #[schemars(range(min = 1))]
    pub full_length: usize,
    #[serde(default = "default_feature_dim")]
    #[schemars(range(min = 1))]
    pub feature_dim: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct VocConfig {
    pub base_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct PcaConfig {
    #[serde(default = "default_pca_components")]
    #[schemars(range(min = 1))]
    pub n_components: usize,
}

impl Default for PcaConfig {
    fn default() -> Self {
        Self {
            n_components: DEFAULT_PCA_COMPONENTS,
        }
    }
}

fn default_full_length() -> usize {
    DEFAULT_FULL_LENGTH
}

fn default_feature_dim() -> usize {
    DEFAULT_FEATURE_DIM
}

fn default_pca_components() -> usize {
    DEFAULT_PCA_COMPONENTS
}

impl PrepConfig {
    /// Minimal configuration pointing at a storage root
    pub fn new(storage_root: impl Into<PathBuf>) -> Self {
        Self {
            storage: StorageConfig {
                root: storage_root.into(),
            },
            cub: None,
            voc: None,
            pca: PcaConfig::default(),
        }
    }

    /// Get the JSON schema of the configuration file
    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(PrepConfig)
    }

    /// Load configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: PrepConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Load configuration from JSON string
    pub fn from_json(content: &str) -> Result<Self> {
        let config: PrepConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Auto-detect file format and load configuration
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_file(path_ref),
            Some("json") => Self::from_json_file(path_ref),
            _ => Err(ConfigError::UnsupportedFileFormat {
                path: path_ref.display().to_string(),
            }),
        }
    }

    /// Convert to TOML string
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Convert to JSON string
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values no run could succeed with.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if self.storage.root.as_os_str().is_empty() {
            problems.push("storage.root must not be empty".to_string());
        }
        if self.pca.n_components == 0 {
            problems.push("pca.n_components must be at least 1".to_string());
        }
        if let Some(cub) = &self.cub {
            if cub.base_path.as_os_str().is_empty() {
                problems.push("cub.base_path must not be empty".to_string());
            }
            if cub.full_length == 0 {
                problems.push("cub.full_length must be at least 1".to_string());
            }
            if cub.feature_dim == 0 {
                problems.push("cub.feature_dim must be at least 1".to_string());
            }
            if matches!(cub.images_folder.as_deref(), Some("")) {
                problems.push("cub.images_folder must not be empty when set".to_string());
            }
        }
        if let Some(voc) = &self.voc {
            if voc.base_path.as_os_str().is_empty() {
                problems.push("voc.base_path must not be empty".to_string());
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::ValidationFailed {
                details: problems.join("; "),
            })
        }
    }
}
