//! Dataset preparation pipeline
//!
//! Ties catalog entries, frame indexing, mean aggregation and windowing
//! together. Work is strictly sequential: dataset, then frame stride, then
//! video, then window. Every clip is written as soon as its window is full.

use crate::catalog::DatasetSpec;
use crate::config::{PipelineConfig, SampleEncoding, SplitKind};
use crate::encoding::{CenteringEncoder, FrameEncoder, ImageFrameSource, RawEncoder};
use crate::error::{ClipPrepError, Result};
use crate::indexer::{FlowChannel, FrameIndexer, FrameMatcher, FrameSequence};
use crate::layout::DatasetLayout;
use crate::mean::{compute_flow_mean, compute_mean_image, FlowMeanField, MeanField};
use crate::naming::ClipName;
use crate::services::{NpyIO, NoOpProgressReporter, PipelineStage, ProgressReporter, ProgressTracker};
use crate::utils::PathValidator;
use crate::windower::{assemble_clip, ClipWindower};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, debug_span, info, info_span};

/// Counters for one frame stride of one dataset split
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrideSummary {
    pub frame_stride: usize,
    /// Videos with at least one frame
    pub videos_indexed: usize,
    /// Videos whose directory was missing or held no frames
    pub videos_empty: usize,
    pub windows: usize,
    pub frames_read: usize,
}

impl StrideSummary {
    #[must_use]
    pub fn new(frame_stride: usize) -> Self {
        Self {
            frame_stride,
            ..Self::default()
        }
    }
}

/// Outcome of preparing one dataset split
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub dataset: String,
    pub split: SplitKind,
    /// Frames averaged into the mean image, when means were computed
    pub mean_frames: Option<u64>,
    /// Image clips, one entry per frame stride
    pub strides: Vec<StrideSummary>,
    /// Optical-flow clips, one entry per frame stride
    pub flow_strides: Vec<StrideSummary>,
}

impl DatasetSummary {
    #[must_use]
    pub fn new(dataset: &str, split: SplitKind) -> Self {
        Self {
            dataset: dataset.to_string(),
            split,
            mean_frames: None,
            strides: Vec::new(),
            flow_strides: Vec::new(),
        }
    }

    #[must_use]
    pub fn label(&self) -> String {
        format!("{}/{}", self.dataset, self.split)
    }

    /// Windows summed over every frame stride of both clip kinds
    #[must_use]
    pub fn total_windows(&self) -> usize {
        self.strides
            .iter()
            .chain(&self.flow_strides)
            .map(|s| s.windows)
            .sum()
    }

    #[must_use]
    pub fn total_frames_read(&self) -> usize {
        self.strides
            .iter()
            .chain(&self.flow_strides)
            .map(|s| s.frames_read)
            .sum()
    }
}

/// Outcome of a whole run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub datasets: Vec<DatasetSummary>,
    pub elapsed_ms: u64,
}

impl RunSummary {
    #[must_use]
    pub fn total_windows(&self) -> usize {
        self.datasets.iter().map(DatasetSummary::total_windows).sum()
    }

    #[must_use]
    pub fn total_frames_read(&self) -> usize {
        self.datasets.iter().map(DatasetSummary::total_frames_read).sum()
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        PathValidator::ensure_parent_directory(path)?;
        std::fs::write(path, json).map_err(|e| ClipPrepError::file_io_error("write run summary", path, &e))
    }
}

/// Which clip family a manifest describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClipKind {
    Frames,
    OpticalFlow,
}

/// `manifest.json` written beside generated clips
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipManifest {
    pub created_at: DateTime<Utc>,
    pub dataset: String,
    pub split: SplitKind,
    pub kind: ClipKind,
    pub encoding: SampleEncoding,
    /// Frames per channel in each clip
    pub target_length: usize,
    /// Leading dimension of every clip array
    pub clip_frames: usize,
    pub sample_stride: usize,
    pub strides: Vec<StrideSummary>,
}

impl ClipManifest {
    pub fn write(&self, clips_dir: &Path) -> Result<PathBuf> {
        let path = DatasetLayout::manifest_path(clips_dir);
        let json = serde_json::to_string_pretty(self)?;
        PathValidator::ensure_directory(clips_dir)?;
        std::fs::write(&path, json).map_err(|e| ClipPrepError::file_io_error("write manifest", &path, &e))?;
        Ok(path)
    }

    pub fn read(clips_dir: &Path) -> Result<Self> {
        let path = DatasetLayout::manifest_path(clips_dir);
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ClipPrepError::file_io_error("read manifest", &path, &e))?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Steps `DatasetPipeline::run` performs for each selected spec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSteps {
    /// Compute mean fields (train specs only)
    pub means: bool,
    /// Generate clips
    pub clips: bool,
}

impl RunSteps {
    pub const ALL: Self = Self {
        means: true,
        clips: true,
    };
    pub const MEANS: Self = Self {
        means: true,
        clips: false,
    };
    pub const CLIPS: Self = Self {
        means: false,
        clips: true,
    };
}

/// One windowing job: which frames, how many per clip and where clips go
struct ClipJob<'a> {
    spec: &'a DatasetSpec,
    kind: ClipKind,
    indexers: Vec<FrameIndexer>,
    video_dir: Box<dyn Fn(usize) -> PathBuf + 'a>,
    target_length: usize,
    out_dir: PathBuf,
}

impl ClipJob<'_> {
    fn stage(&self) -> PipelineStage {
        match self.kind {
            ClipKind::Frames => PipelineStage::ClipGeneration,
            ClipKind::OpticalFlow => PipelineStage::FlowClipGeneration,
        }
    }
}

/// Sequential dataset preparation driver
pub struct DatasetPipeline {
    config: PipelineConfig,
    tracker: ProgressTracker,
}

impl DatasetPipeline {
    /// Pipeline without progress reporting
    pub fn new(config: PipelineConfig) -> Result<Self> {
        Self::with_reporter(config, Box::new(NoOpProgressReporter))
    }

    pub fn with_reporter(config: PipelineConfig, reporter: Box<dyn ProgressReporter>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            tracker: ProgressTracker::new(reporter),
        })
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    #[must_use]
    pub fn layout(&self, spec: &DatasetSpec) -> DatasetLayout {
        DatasetLayout::new(&self.config.data_root, spec)
    }

    /// Compute and persist the mean image, plus flow means when optical flow is on.
    ///
    /// Returns the number of frames averaged into the mean image.
    pub fn compute_means(&mut self, spec: &DatasetSpec) -> Result<u64> {
        spec.validate()?;
        let label = spec.label();
        let _span = info_span!("means", dataset = %label).entered();
        let layout = self.layout(spec);
        let total = spec.video_count;

        self.tracker.report_step(PipelineStage::MeanComputation, &label, 0, total);
        let tracker = &mut self.tracker;
        let mean = compute_mean_image(&layout, spec, |video_id| {
            tracker.report_step(PipelineStage::MeanComputation, &label, video_id, total);
        })?;
        mean.save(&layout.mean_image_npy(), &layout.mean_image_png())?;
        let frames = mean.frame_count().unwrap_or_default();

        if self.config.optical_flow {
            let tracker = &mut self.tracker;
            let flow = compute_flow_mean(&layout, spec, |video_id| {
                tracker.report_step_with_description(
                    PipelineStage::MeanComputation,
                    &label,
                    video_id,
                    total,
                    "Computing optical-flow means".to_string(),
                );
            })?;
            flow.save(&layout, self.config.optical_target_length())?;
        }

        info!(dataset = %label, frames, "Mean fields written");
        Ok(frames)
    }

    /// Window every video of `spec` into clips for each configured frame stride
    pub fn generate_clips(&mut self, spec: &DatasetSpec) -> Result<DatasetSummary> {
        spec.validate()?;
        let label = spec.label();
        let _span = info_span!("dataset", dataset = %label).entered();
        let layout = self.layout(spec);
        let template = spec.template()?;
        let mut summary = DatasetSummary::new(&spec.name, spec.split);

        let frames_job = ClipJob {
            spec,
            kind: ClipKind::Frames,
            indexers: vec![FrameIndexer::for_template(template.clone())],
            video_dir: Box::new(|video_id| layout.frames_dir(video_id)),
            target_length: self.config.target_length,
            out_dir: layout.clips_dir(),
        };
        summary.strides = match self.config.encoding {
            SampleEncoding::Raw => self.run_job(&frames_job, RawEncoder)?,
            SampleEncoding::Centered => {
                let mean = load_required_mean(&layout.mean_image_npy(), MeanField::load)?;
                self.run_job(&frames_job, CenteringEncoder::new(vec![mean.into_values()])?)?
            },
        };

        if self.config.optical_flow {
            let flow_job = ClipJob {
                spec,
                kind: ClipKind::OpticalFlow,
                indexers: FlowChannel::ALL
                    .iter()
                    .map(|&channel| FrameIndexer::new(FrameMatcher::flow(channel, &template)))
                    .collect(),
                video_dir: Box::new(|video_id| layout.flow_dir(video_id)),
                target_length: self.config.optical_target_length(),
                out_dir: layout.flow_clips_dir(),
            };
            summary.flow_strides = match self.config.encoding {
                SampleEncoding::Raw => self.run_job(&flow_job, RawEncoder)?,
                SampleEncoding::Centered => {
                    let flow = load_required_mean(&layout.flow_mean_npy(FlowChannel::Vx), |_| {
                        FlowMeanField::load(&layout)
                    })?;
                    let encoder = CenteringEncoder::new(vec![flow.vx.into_values(), flow.vy.into_values()])?;
                    self.run_job(&flow_job, encoder)?
                },
            };
        }

        info!(
            dataset = %label,
            windows = summary.total_windows(),
            frames_read = summary.total_frames_read(),
            "Clips written"
        );
        Ok(summary)
    }

    /// Run `steps` over `specs`, train specs first.
    ///
    /// Test specs are processed after every train spec so that centered
    /// test clips can use the means computed in the same run.
    pub fn run(&mut self, specs: &[DatasetSpec], steps: RunSteps) -> Result<RunSummary> {
        let mut ordered: Vec<&DatasetSpec> = specs.iter().collect();
        ordered.sort_by_key(|spec| spec.split);

        let mut summary = RunSummary::default();
        for spec in ordered {
            match self.run_one(spec, steps) {
                Ok(dataset_summary) => summary.datasets.push(dataset_summary),
                Err(e) => {
                    self.tracker.report_error(&e.to_string());
                    return Err(e);
                },
            }
        }

        summary.elapsed_ms = self.tracker.elapsed_ms();
        self.tracker.report_completion(&summary);
        Ok(summary)
    }

    fn run_one(&mut self, spec: &DatasetSpec, steps: RunSteps) -> Result<DatasetSummary> {
        let mean_frames = if steps.means && spec.split == SplitKind::Train {
            Some(self.compute_means(spec)?)
        } else {
            None
        };

        let mut dataset_summary = if steps.clips {
            self.generate_clips(spec)?
        } else {
            DatasetSummary::new(&spec.name, spec.split)
        };
        dataset_summary.mean_frames = mean_frames;
        Ok(dataset_summary)
    }

    fn run_job<E: FrameEncoder>(&mut self, job: &ClipJob<'_>, encoder: E) -> Result<Vec<StrideSummary>> {
        let spec = job.spec;
        let label = spec.label();
        let stage = job.stage();
        PathValidator::ensure_directory(&job.out_dir)?;

        let mut source = ImageFrameSource::new(encoder);
        let mut strides = Vec::with_capacity(spec.frame_strides.len());

        for frame_stride in spec.frame_strides.iter() {
            let _stride_span = info_span!("frame_stride", frame_stride).entered();
            let mut windower = ClipWindower::new(job.indexers.len(), job.target_length, spec.sample_stride)?;
            let mut stride_summary = StrideSummary::new(frame_stride);

            self.tracker.report_step(stage, &label, 0, spec.video_count);
            for (done, video_id) in spec.video_ids().enumerate() {
                let _video_span = debug_span!("video", video_id).entered();
                let dir = (job.video_dir)(video_id);
                let sequences = job
                    .indexers
                    .iter()
                    .map(|indexer| indexer.index_video(&dir, video_id, frame_stride))
                    .collect::<Result<Vec<FrameSequence>>>()?;

                if sequences.iter().any(FrameSequence::is_empty) {
                    stride_summary.videos_empty += 1;
                } else {
                    stride_summary.videos_indexed += 1;
                    let frame_lists: Vec<&[PathBuf]> = sequences.iter().map(FrameSequence::frames).collect();
                    let stats = windower.run(&frame_lists, &mut source, |window_index, buffers| {
                        let clip = assemble_clip(buffers)?;
                        let name = ClipName::new(&spec.name, video_id, frame_stride, spec.sample_stride, window_index);
                        NpyIO::write(job.out_dir.join(name.file_name()), &clip)
                    })?;
                    stride_summary.windows += stats.windows;
                    stride_summary.frames_read += stats.frames_read;
                    debug!(frames = sequences.first().map_or(0, FrameSequence::len), windows = stats.windows, "Video windowed");
                }

                self.tracker.report_step(stage, &label, done + 1, spec.video_count);
            }

            strides.push(stride_summary);
        }

        if self.config.write_manifest {
            self.tracker.report_step(PipelineStage::ManifestWriting, &label, 0, 1);
            let channels = job.indexers.len();
            let manifest = ClipManifest {
                created_at: Utc::now(),
                dataset: spec.name.clone(),
                split: spec.split,
                kind: job.kind,
                encoding: self.config.encoding,
                target_length: job.target_length,
                clip_frames: job.target_length * channels,
                sample_stride: spec.sample_stride,
                strides: strides.clone(),
            };
            let path = manifest.write(&job.out_dir)?;
            debug!(path = %path.display(), "Manifest written");
        }

        Ok(strides)
    }
}

/// Load a persisted mean, or explain which step produces it
fn load_required_mean<T>(path: &Path, load: impl FnOnce(&Path) -> Result<T>) -> Result<T> {
    if !path.is_file() {
        return Err(ClipPrepError::invalid_config(format!(
            "Centered encoding needs '{}'; compute means on the train split first",
            path.display()
        )));
    }
    load(path)
}
