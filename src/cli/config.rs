//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::{ClipsArgs, CliEncoding, CliSplit, DatasetArgs};
use crate::{
    catalog::{DatasetCatalog, DatasetSpec},
    config::{PipelineConfig, PipelineConfigBuilder, SampleEncoding, SplitKind, StrideSet},
    pipeline::RunSteps,
    utils::{NumericValidator, PathValidator},
};
use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

/// Convert CLI arguments to pipeline configuration and dataset selections
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build the run-wide `PipelineConfig`
    pub(crate) fn pipeline_config(dataset: &DatasetArgs, clips: Option<&ClipsArgs>) -> Result<PipelineConfig> {
        let encoding = clips.map_or(SampleEncoding::Raw, |c| Self::encoding(c.encoding));
        let write_manifest = clips.map_or(true, |c| !c.no_manifest);

        PipelineConfigBuilder::new()
            .data_root(&dataset.data_root)
            .target_length(dataset.target_length)
            .encoding(encoding)
            .optical_flow(dataset.optical_flow)
            .write_manifest(write_manifest)
            .build()
            .context("Invalid configuration")
    }

    /// Built-in catalog, or the one stored at `path`
    pub(crate) fn load_catalog(path: Option<&Path>) -> Result<DatasetCatalog> {
        match path {
            Some(path) => {
                let catalog = DatasetCatalog::from_json_file(path)
                    .with_context(|| format!("Failed to load catalog {}", path.display()))?;
                debug!(path = %path.display(), specs = catalog.specs().len(), "Loaded catalog");
                Ok(catalog)
            },
            None => Ok(DatasetCatalog::builtin()),
        }
    }

    /// Specs selected by the CLI, with stride overrides applied.
    ///
    /// Mean computation only ever looks at train specs.
    pub(crate) fn select_specs(
        catalog: &DatasetCatalog,
        dataset: &DatasetArgs,
        clips: Option<&ClipsArgs>,
        steps: RunSteps,
    ) -> Result<Vec<DatasetSpec>> {
        let split = if steps.clips {
            clips.and_then(|c| c.split).map(Self::split)
        } else {
            Some(SplitKind::Train)
        };

        let mut specs = catalog
            .select(&dataset.dataset, split)
            .context("Invalid dataset selection")?;

        if let Some(clips) = clips {
            for spec in &mut specs {
                if !clips.frame_stride.is_empty() {
                    *spec = spec.clone().with_frame_strides(StrideSet::from(clips.frame_stride.clone()));
                }
                if let Some(sample_stride) = clips.sample_stride {
                    *spec = spec.clone().with_sample_stride(sample_stride);
                }
                spec.validate()
                    .with_context(|| format!("Invalid overrides for {}", spec.label()))?;
            }
        }
        Ok(specs)
    }

    /// Validate dataset arguments for consistency
    pub(crate) fn validate_dataset_args(dataset: &DatasetArgs) -> Result<()> {
        PathValidator::validate_directory(&dataset.data_root).context("Invalid data root")?;
        NumericValidator::validate_positive(dataset.target_length, "target_length")?;
        if dataset.dataset.trim().is_empty() {
            anyhow::bail!("--dataset must name at least one dataset or `all`");
        }
        Ok(())
    }

    /// Validate clip generation arguments
    pub(crate) fn validate_clips_args(clips: &ClipsArgs) -> Result<()> {
        if !clips.frame_stride.is_empty() {
            NumericValidator::validate_unique_positive(&clips.frame_stride, "frame_stride")?;
        }
        if let Some(sample_stride) = clips.sample_stride {
            NumericValidator::validate_positive(sample_stride, "sample_stride")?;
        }
        Ok(())
    }

    fn encoding(encoding: CliEncoding) -> SampleEncoding {
        match encoding {
            CliEncoding::Raw => SampleEncoding::Raw,
            CliEncoding::Centered => SampleEncoding::Centered,
        }
    }

    fn split(split: CliSplit) -> SplitKind {
        match split {
            CliSplit::Train => SplitKind::Train,
            CliSplit::Test => SplitKind::Test,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn dataset_args(root: &Path, selector: &str) -> DatasetArgs {
        DatasetArgs {
            data_root: root.to_path_buf(),
            dataset: selector.to_string(),
            catalog: None,
            target_length: 10,
            optical_flow: false,
        }
    }

    fn clips_args(root: &Path, selector: &str) -> ClipsArgs {
        ClipsArgs {
            dataset: dataset_args(root, selector),
            split: None,
            encoding: CliEncoding::Raw,
            frame_stride: Vec::new(),
            sample_stride: None,
            no_manifest: false,
            summary: None,
        }
    }

    #[test]
    fn test_pipeline_config_conversion() {
        let dir = tempdir().unwrap();
        let mut clips = clips_args(dir.path(), "ped2");
        clips.encoding = CliEncoding::Centered;
        clips.no_manifest = true;
        clips.dataset.optical_flow = true;

        let config = CliConfigBuilder::pipeline_config(&clips.dataset, Some(&clips)).unwrap();
        assert_eq!(config.data_root, dir.path());
        assert_eq!(config.encoding, SampleEncoding::Centered);
        assert!(config.optical_flow);
        assert!(!config.write_manifest);

        let means = CliConfigBuilder::pipeline_config(&clips.dataset, None).unwrap();
        assert_eq!(means.encoding, SampleEncoding::Raw);
        assert!(means.write_manifest);
    }

    #[test]
    fn test_select_specs_applies_overrides() {
        let dir = tempdir().unwrap();
        let mut clips = clips_args(dir.path(), "ped2");
        clips.frame_stride = vec![2, 4];
        clips.sample_stride = Some(5);
        clips.split = Some(CliSplit::Test);

        let catalog = DatasetCatalog::builtin();
        let specs = CliConfigBuilder::select_specs(&catalog, &clips.dataset, Some(&clips), RunSteps::CLIPS).unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].split, SplitKind::Test);
        assert_eq!(specs[0].frame_strides.as_slice(), &[2, 4]);
        assert_eq!(specs[0].sample_stride, 5);
    }

    #[test]
    fn test_mean_selection_is_train_only() {
        let dir = tempdir().unwrap();
        let args = dataset_args(dir.path(), "avenue|enter");
        let catalog = DatasetCatalog::builtin();
        let specs = CliConfigBuilder::select_specs(&catalog, &args, None, RunSteps::MEANS).unwrap();
        assert_eq!(specs.len(), 2);
        assert!(specs.iter().all(|spec| spec.split == SplitKind::Train));
    }

    #[test]
    fn test_validation() {
        let dir = tempdir().unwrap();
        let mut clips = clips_args(dir.path(), "all");
        assert!(CliConfigBuilder::validate_dataset_args(&clips.dataset).is_ok());
        assert!(CliConfigBuilder::validate_clips_args(&clips).is_ok());

        clips.frame_stride = vec![1, 1];
        assert!(CliConfigBuilder::validate_clips_args(&clips).is_err());
        clips.frame_stride = vec![0];
        assert!(CliConfigBuilder::validate_clips_args(&clips).is_err());
        clips.frame_stride.clear();
        clips.sample_stride = Some(0);
        assert!(CliConfigBuilder::validate_clips_args(&clips).is_err());

        clips.dataset.target_length = 0;
        assert!(CliConfigBuilder::validate_dataset_args(&clips.dataset).is_err());

        let missing = dataset_args(&dir.path().join("missing"), "all");
        assert!(CliConfigBuilder::validate_dataset_args(&missing).is_err());
    }

    #[test]
    fn test_unknown_dataset_is_error() {
        let dir = tempdir().unwrap();
        let args = dataset_args(dir.path(), "shanghaitech");
        let catalog = DatasetCatalog::builtin();
        assert!(CliConfigBuilder::select_specs(&catalog, &args, None, RunSteps::MEANS).is_err());
    }
}
