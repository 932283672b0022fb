//! Dataset catalog
//!
//! Static description of every dataset the pipeline knows: where its frames
//! live, how many videos it has and which strides to window it with.

use crate::config::{SplitKind, StrideSet};
use crate::error::{ClipPrepError, Result};
use crate::indexer::{FrameTemplate, DEFAULT_FRAME_TEMPLATE};
use crate::utils::NumericValidator;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Selector matching every catalog entry
pub const ALL_DATASETS: &str = "all";

/// Window start step of built-in train entries
pub const BUILTIN_TRAIN_SAMPLE_STRIDE: usize = 2;
/// Window start step of built-in test entries
pub const BUILTIN_TEST_SAMPLE_STRIDE: usize = 5;

fn default_frame_template() -> String {
    DEFAULT_FRAME_TEMPLATE.to_string()
}

fn default_sample_stride() -> usize {
    1
}

/// One split of one dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSpec {
    /// Short name, also the first component of clip names
    pub name: String,

    /// Dataset folder, relative to the data root unless absolute
    pub root: PathBuf,

    pub split: SplitKind,

    /// printf-style frame file name, e.g. `frame_%05d.png`
    #[serde(default = "default_frame_template")]
    pub frame_template: String,

    /// Videos are numbered 1..=video_count
    pub video_count: usize,

    #[serde(rename = "frame_stride", alias = "frame_strides")]
    pub frame_strides: StrideSet,

    #[serde(default = "default_sample_stride")]
    pub sample_stride: usize,
}

impl DatasetSpec {
    #[must_use]
    pub fn new(name: &str, split: SplitKind, video_count: usize, frame_strides: StrideSet) -> Self {
        Self {
            name: name.to_string(),
            root: PathBuf::from(name),
            split,
            frame_template: default_frame_template(),
            video_count,
            frame_strides,
            sample_stride: default_sample_stride(),
        }
    }

    #[must_use]
    pub fn with_root<P: AsRef<Path>>(mut self, root: P) -> Self {
        self.root = root.as_ref().to_path_buf();
        self
    }

    #[must_use]
    pub fn with_sample_stride(mut self, sample_stride: usize) -> Self {
        self.sample_stride = sample_stride;
        self
    }

    #[must_use]
    pub fn with_frame_strides(mut self, frame_strides: StrideSet) -> Self {
        self.frame_strides = frame_strides;
        self
    }

    #[must_use]
    pub fn with_frame_template(mut self, template: &str) -> Self {
        self.frame_template = template.to_string();
        self
    }

    /// Parsed frame template
    pub fn template(&self) -> Result<FrameTemplate> {
        FrameTemplate::parse(&self.frame_template)
    }

    /// `1..=video_count`
    pub fn video_ids(&self) -> impl Iterator<Item = usize> {
        1..=self.video_count
    }

    /// `name/split`, used in logs
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}/{}", self.name, self.split)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ClipPrepError::invalid_config("Dataset name must not be empty"));
        }
        NumericValidator::validate_positive(self.video_count, "video_count")?;
        NumericValidator::validate_positive(self.sample_stride, "sample_stride")?;
        self.frame_strides.validate()?;
        self.template()?;
        Ok(())
    }
}

/// Ordered collection of dataset specs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetCatalog {
    specs: Vec<DatasetSpec>,
}

impl DatasetCatalog {
    /// Validate and wrap a list of specs
    pub fn new(specs: Vec<DatasetSpec>) -> Result<Self> {
        for spec in &specs {
            spec.validate()?;
        }
        for (i, spec) in specs.iter().enumerate() {
            if specs
                .iter()
                .take(i)
                .any(|other| other.name == spec.name && other.split == spec.split)
            {
                return Err(ClipPrepError::invalid_config(format!(
                    "Catalog lists {} more than once",
                    spec.label()
                )));
            }
        }
        Ok(Self { specs })
    }

    /// Avenue, UCSD Ped1/Ped2 and Subway entrance/exit
    #[must_use]
    pub fn builtin() -> Self {
        let entries: [(&str, usize, usize); 5] = [
            ("avenue", 16, 21),
            ("ped1", 34, 36),
            ("ped2", 16, 12),
            ("enter", 1, 6),
            ("exit", 1, 4),
        ];

        let specs = entries
            .iter()
            .flat_map(|&(name, train_videos, test_videos)| {
                [
                    DatasetSpec::new(name, SplitKind::Train, train_videos, StrideSet::single(1))
                        .with_sample_stride(BUILTIN_TRAIN_SAMPLE_STRIDE),
                    DatasetSpec::new(name, SplitKind::Test, test_videos, StrideSet::single(1))
                        .with_sample_stride(BUILTIN_TEST_SAMPLE_STRIDE),
                ]
            })
            .collect();

        Self { specs }
    }

    /// Load a catalog from a JSON array of specs
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let content = std::fs::read_to_string(path_ref)
            .map_err(|e| ClipPrepError::file_io_error("read catalog", path_ref, &e))?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let specs: Vec<DatasetSpec> = serde_json::from_str(content)?;
        Self::new(specs)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    #[must_use]
    pub fn specs(&self) -> &[DatasetSpec] {
        &self.specs
    }

    /// Distinct dataset names in catalog order
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for spec in &self.specs {
            if !names.contains(&spec.name.as_str()) {
                names.push(spec.name.as_str());
            }
        }
        names
    }

    #[must_use]
    pub fn get(&self, name: &str, split: SplitKind) -> Option<&DatasetSpec> {
        self.specs
            .iter()
            .find(|spec| spec.name == name && spec.split == split)
    }

    /// Specs matching `selector` (`all` or `name|name|...`), optionally one split.
    ///
    /// Train entries come before test entries so that means exist before
    /// centered test clips are generated.
    pub fn select(&self, selector: &str, split: Option<SplitKind>) -> Result<Vec<DatasetSpec>> {
        let cleaned: String = selector.chars().filter(|c| !c.is_whitespace()).collect();
        let wanted: Vec<&str> = if cleaned.eq_ignore_ascii_case(ALL_DATASETS) {
            self.names()
        } else {
            cleaned.split('|').filter(|name| !name.is_empty()).collect()
        };

        if wanted.is_empty() {
            return Err(ClipPrepError::invalid_config("Dataset selector is empty"));
        }
        for name in &wanted {
            if !self.specs.iter().any(|spec| spec.name == *name) {
                return Err(ClipPrepError::unknown_dataset(format!(
                    "'{}' (known: {})",
                    name,
                    self.names().join(", ")
                )));
            }
        }

        let mut selected: Vec<DatasetSpec> = self
            .specs
            .iter()
            .filter(|spec| wanted.contains(&spec.name.as_str()))
            .filter(|spec| split.map_or(true, |wanted_split| spec.split == wanted_split))
            .cloned()
            .collect();
        // Stable: keeps catalog order inside each split
        selected.sort_by_key(|spec| spec.split);

        Ok(selected)
    }
}

impl Default for DatasetCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog() {
        let catalog = DatasetCatalog::builtin();
        assert_eq!(catalog.specs().len(), 10);
        assert_eq!(catalog.names(), vec!["avenue", "ped1", "ped2", "enter", "exit"]);

        let avenue_train = catalog.get("avenue", SplitKind::Train).unwrap();
        assert_eq!(avenue_train.video_count, 16);
        assert_eq!(avenue_train.frame_strides.as_slice(), &[1]);
        assert_eq!(avenue_train.sample_stride, 2);
        assert_eq!(avenue_train.frame_template, "frame_%05d.png");

        let avenue_test = catalog.get("avenue", SplitKind::Test).unwrap();
        assert_eq!(avenue_test.video_count, 21);
        assert_eq!(avenue_test.sample_stride, 5);

        let ped1_test = catalog.get("ped1", SplitKind::Test).unwrap();
        assert_eq!(ped1_test.video_count, 36);
        assert_eq!(ped1_test.frame_strides.as_slice(), &[1]);

        // Subway entrance and exit split one long train video from several test videos
        assert_eq!(catalog.get("enter", SplitKind::Train).unwrap().video_count, 1);
        assert_eq!(catalog.get("enter", SplitKind::Test).unwrap().video_count, 6);
        assert_eq!(catalog.get("exit", SplitKind::Train).unwrap().video_count, 1);
        assert_eq!(catalog.get("exit", SplitKind::Test).unwrap().video_count, 4);

        for spec in catalog.specs() {
            assert!(spec.validate().is_ok(), "{} should be valid", spec.label());
        }
    }

    #[test]
    fn test_select_all_orders_train_first() {
        let catalog = DatasetCatalog::builtin();
        let selected = catalog.select("all", None).unwrap();
        assert_eq!(selected.len(), 10);
        assert!(selected.iter().take(5).all(|s| s.split == SplitKind::Train));
        assert!(selected.iter().skip(5).all(|s| s.split == SplitKind::Test));
        assert_eq!(selected.first().unwrap().name, "avenue");
    }

    #[test]
    fn test_select_pipe_separated() {
        let catalog = DatasetCatalog::builtin();
        let selected = catalog.select(" ped2 | enter ", Some(SplitKind::Train)).unwrap();
        let names: Vec<_> = selected.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["ped2", "enter"]);
    }

    #[test]
    fn test_select_unknown_dataset() {
        let catalog = DatasetCatalog::builtin();
        let err = catalog.select("avenue|umn", None).unwrap_err();
        assert!(matches!(err, ClipPrepError::UnknownDataset(_)));
        assert!(catalog.select("|", None).is_err());
    }

    #[test]
    fn test_catalog_from_json_scalar_and_list_strides() {
        let json = r#"[
            {"name": "campus", "root": "campus", "split": "train", "video_count": 4, "frame_stride": [1, 2]},
            {"name": "campus", "root": "campus", "split": "test", "video_count": 2, "frame_stride": 1, "sample_stride": 5}
        ]"#;
        let catalog = DatasetCatalog::from_json_str(json).unwrap();

        let train = catalog.get("campus", SplitKind::Train).unwrap();
        assert_eq!(train.frame_strides.as_slice(), &[1, 2]);
        assert_eq!(train.sample_stride, 1);
        assert_eq!(train.frame_template, DEFAULT_FRAME_TEMPLATE);

        let test = catalog.get("campus", SplitKind::Test).unwrap();
        assert_eq!(test.frame_strides.as_slice(), &[1]);
        assert_eq!(test.sample_stride, 5);
    }

    #[test]
    fn test_catalog_rejects_invalid_specs() {
        let zero_videos = r#"[{"name": "a", "root": "a", "split": "train", "video_count": 0, "frame_stride": 1}]"#;
        assert!(DatasetCatalog::from_json_str(zero_videos).is_err());

        let duplicate = r#"[
            {"name": "a", "root": "a", "split": "train", "video_count": 1, "frame_stride": 1},
            {"name": "a", "root": "a", "split": "train", "video_count": 2, "frame_stride": 1}
        ]"#;
        assert!(DatasetCatalog::from_json_str(duplicate).is_err());

        let bad_template = r#"[{"name": "a", "root": "a", "split": "train", "video_count": 1, "frame_stride": 1, "frame_template": "frame.png"}]"#;
        assert!(DatasetCatalog::from_json_str(bad_template).is_err());
    }

    #[test]
    fn test_catalog_json_round_trip() {
        let catalog = DatasetCatalog::builtin();
        let json = catalog.to_json_pretty().unwrap();
        assert!(json.contains("\"frame_stride\""));
        assert_eq!(DatasetCatalog::from_json_str(&json).unwrap(), catalog);
    }
}
