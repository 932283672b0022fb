//! Configuration types for frame indexing and clip generation

use crate::error::{ClipPrepError, Result};
use crate::utils::NumericValidator;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default number of frames per emitted clip
pub const DEFAULT_TARGET_LENGTH: usize = 10;

/// Upper bound accepted for `target_length`
pub const MAX_TARGET_LENGTH: usize = 256;

/// One or many frame strides.
///
/// Catalog files may give `"frame_stride": 1` or `"frame_stride": [1, 2, 3]`;
/// both deserialize into the same list form so callers never special-case
/// the scalar. Always serializes as a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StrideRepr", into = "Vec<usize>")]
pub struct StrideSet(Vec<usize>);

#[derive(Deserialize)]
#[serde(untagged)]
enum StrideRepr {
    One(usize),
    Many(Vec<usize>),
}

impl From<StrideRepr> for StrideSet {
    fn from(repr: StrideRepr) -> Self {
        match repr {
            StrideRepr::One(stride) => Self(vec![stride]),
            StrideRepr::Many(strides) => Self(strides),
        }
    }
}

impl From<StrideSet> for Vec<usize> {
    fn from(set: StrideSet) -> Self {
        set.0
    }
}

impl From<usize> for StrideSet {
    fn from(stride: usize) -> Self {
        Self(vec![stride])
    }
}

impl From<Vec<usize>> for StrideSet {
    fn from(strides: Vec<usize>) -> Self {
        Self(strides)
    }
}

impl StrideSet {
    /// Single-stride set
    #[must_use]
    pub fn single(stride: usize) -> Self {
        Self(vec![stride])
    }

    /// Strides in configured order
    #[must_use]
    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Non-empty, all positive, no duplicates
    pub fn validate(&self) -> Result<()> {
        NumericValidator::validate_unique_positive(&self.0, "frame_stride")
    }
}

impl std::fmt::Display for StrideSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let joined = self
            .0
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        write!(f, "[{}]", joined)
    }
}

/// Which half of a dataset a catalog entry describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitKind {
    Train,
    Test,
}

impl SplitKind {
    /// Folder holding the extracted frames of this split
    #[must_use]
    pub fn input_dir_name(self) -> &'static str {
        match self {
            Self::Train => "training_videos",
            Self::Test => "testing_videos",
        }
    }

    /// Folder receiving the clips of this split
    #[must_use]
    pub fn output_dir_name(self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Test => "test",
        }
    }
}

impl std::fmt::Display for SplitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.output_dir_name())
    }
}

impl std::str::FromStr for SplitKind {
    type Err = ClipPrepError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "train" | "training" => Ok(Self::Train),
            "test" | "testing" => Ok(Self::Test),
            other => Err(ClipPrepError::invalid_config(format!(
                "Unknown split '{}', expected 'train' or 'test'",
                other
            ))),
        }
    }
}

/// How frame pixels are stored inside a clip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleEncoding {
    /// Raw 8-bit pixels; consumers normalize to [-1, 1] at load time
    #[default]
    Raw,
    /// `(pixel - mean) / 255` stored as f64
    Centered,
}

impl std::fmt::Display for SampleEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Raw => write!(f, "raw"),
            Self::Centered => write!(f, "centered"),
        }
    }
}

/// Configuration shared by every dataset processed in one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Base folder containing one sub-folder per dataset
    pub data_root: PathBuf,

    /// Frames per clip; flow clips use `target_length - 1` per channel
    pub target_length: usize,

    /// Pixel storage of emitted clips
    pub encoding: SampleEncoding,

    /// Also process the optical-flow vx/vy frame trees
    pub optical_flow: bool,

    /// Write `manifest.json` beside generated clips
    pub write_manifest: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("."),
            target_length: DEFAULT_TARGET_LENGTH,
            encoding: SampleEncoding::default(),
            optical_flow: false,
            write_manifest: true,
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder
    #[must_use]
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::new()
    }

    /// Window size used for each optical-flow channel
    #[must_use]
    pub fn optical_target_length(&self) -> usize {
        self.target_length.saturating_sub(1)
    }

    pub fn validate(&self) -> Result<()> {
        NumericValidator::validate_range(self.target_length, 1, MAX_TARGET_LENGTH, "target_length")?;

        if self.optical_flow && self.target_length < 2 {
            return Err(ClipPrepError::config_value_error(
                "target_length",
                self.target_length,
                ">= 2 when optical flow is enabled",
                Some(DEFAULT_TARGET_LENGTH),
            ));
        }

        Ok(())
    }
}

/// Builder for `PipelineConfig`
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
        }
    }

    #[must_use]
    pub fn data_root<P: AsRef<Path>>(mut self, data_root: P) -> Self {
        self.config.data_root = data_root.as_ref().to_path_buf();
        self
    }

    #[must_use]
    pub fn target_length(mut self, target_length: usize) -> Self {
        self.config.target_length = target_length;
        self
    }

    #[must_use]
    pub fn encoding(mut self, encoding: SampleEncoding) -> Self {
        self.config.encoding = encoding;
        self
    }

    #[must_use]
    pub fn optical_flow(mut self, enabled: bool) -> Self {
        self.config.optical_flow = enabled;
        self
    }

    #[must_use]
    pub fn write_manifest(mut self, enabled: bool) -> Self {
        self.config.write_manifest = enabled;
        self
    }

    /// Validate and return the configuration
    pub fn build(self) -> Result<PipelineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for PipelineConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stride_set_accepts_scalar_and_list() {
        let scalar: StrideSet = serde_json::from_str("2").unwrap();
        assert_eq!(scalar.as_slice(), &[2]);

        let list: StrideSet = serde_json::from_str("[1, 2, 3]").unwrap();
        assert_eq!(list.as_slice(), &[1, 2, 3]);

        // Always written back as a list
        assert_eq!(serde_json::to_string(&scalar).unwrap(), "[2]");
    }

    #[test]
    fn test_stride_set_validation() {
        assert!(StrideSet::from(vec![1, 2, 3]).validate().is_ok());
        assert!(StrideSet::single(1).validate().is_ok());

        assert!(StrideSet::from(Vec::new()).validate().is_err());
        assert!(StrideSet::from(vec![0]).validate().is_err());
        assert!(StrideSet::from(vec![2, 2]).validate().is_err());
    }

    #[test]
    fn test_stride_set_display() {
        assert_eq!(StrideSet::from(vec![1, 2, 3]).to_string(), "[1,2,3]");
    }

    #[test]
    fn test_split_kind_dirs_and_parsing() {
        assert_eq!(SplitKind::Train.input_dir_name(), "training_videos");
        assert_eq!(SplitKind::Test.input_dir_name(), "testing_videos");
        assert_eq!(SplitKind::Train.output_dir_name(), "train");
        assert_eq!("TEST".parse::<SplitKind>().unwrap(), SplitKind::Test);
        assert!("validation".parse::<SplitKind>().is_err());

        let split: SplitKind = serde_json::from_str("\"train\"").unwrap();
        assert_eq!(split, SplitKind::Train);
    }

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.target_length, 10);
        assert_eq!(config.optical_target_length(), 9);
        assert_eq!(config.encoding, SampleEncoding::Raw);
        assert!(!config.optical_flow);
        assert!(config.write_manifest);
    }

    #[test]
    fn test_builder_validation() {
        let config = PipelineConfig::builder()
            .data_root("/data")
            .target_length(16)
            .encoding(SampleEncoding::Centered)
            .optical_flow(true)
            .build()
            .unwrap();
        assert_eq!(config.data_root, PathBuf::from("/data"));
        assert_eq!(config.optical_target_length(), 15);

        assert!(PipelineConfig::builder().target_length(0).build().is_err());
        assert!(PipelineConfig::builder()
            .target_length(1)
            .optical_flow(true)
            .build()
            .is_err());
        assert!(PipelineConfig::builder()
            .target_length(MAX_TARGET_LENGTH + 1)
            .build()
            .is_err());
    }
}
