//! On-disk layout of a dataset folder

use crate::catalog::DatasetSpec;
use crate::config::SplitKind;
use crate::indexer::FlowChannel;
use std::path::{Path, PathBuf};

pub const OPTICAL_FLOW_DIR: &str = "optical_flow";
pub const MEAN_IMAGE_STEM: &str = "mean_image";
pub const MEAN_CUBE_FILE: &str = "mean_cube.npy";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Paths of one dataset split under the data root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetLayout {
    dataset_dir: PathBuf,
    split: SplitKind,
}

impl DatasetLayout {
    /// Layout of `spec` under `data_root`; absolute spec roots ignore `data_root`
    #[must_use]
    pub fn new(data_root: &Path, spec: &DatasetSpec) -> Self {
        Self {
            dataset_dir: data_root.join(&spec.root),
            split: spec.split,
        }
    }

    #[must_use]
    pub fn dataset_dir(&self) -> &Path {
        &self.dataset_dir
    }

    #[must_use]
    pub fn split(&self) -> SplitKind {
        self.split
    }

    /// `<root>/<training_videos|testing_videos>/<video:02>`
    #[must_use]
    pub fn frames_dir(&self, video_id: usize) -> PathBuf {
        self.dataset_dir
            .join(self.split.input_dir_name())
            .join(video_dir_name(video_id))
    }

    /// `<root>/optical_flow/<training_videos|testing_videos>/<video:02>`
    #[must_use]
    pub fn flow_dir(&self, video_id: usize) -> PathBuf {
        self.dataset_dir
            .join(OPTICAL_FLOW_DIR)
            .join(self.split.input_dir_name())
            .join(video_dir_name(video_id))
    }

    /// `<root>/<train|test>`
    #[must_use]
    pub fn clips_dir(&self) -> PathBuf {
        self.dataset_dir.join(self.split.output_dir_name())
    }

    /// `<root>/optical_flow/<train|test>`
    #[must_use]
    pub fn flow_clips_dir(&self) -> PathBuf {
        self.flow_root().join(self.split.output_dir_name())
    }

    /// `<root>/optical_flow`, home of flow inputs, flow means and flow clips
    #[must_use]
    pub fn flow_root(&self) -> PathBuf {
        self.dataset_dir.join(OPTICAL_FLOW_DIR)
    }

    #[must_use]
    pub fn mean_image_npy(&self) -> PathBuf {
        self.dataset_dir.join(format!("{}.npy", MEAN_IMAGE_STEM))
    }

    #[must_use]
    pub fn mean_image_png(&self) -> PathBuf {
        self.dataset_dir.join(format!("{}.png", MEAN_IMAGE_STEM))
    }

    /// `optical_flow/mean_vx.npy` / `optical_flow/mean_vy.npy`
    #[must_use]
    pub fn flow_mean_npy(&self, channel: FlowChannel) -> PathBuf {
        self.flow_root().join(format!("mean_{}.npy", channel.tag()))
    }

    /// `optical_flow/mean_vx.png` / `optical_flow/mean_vy.png`
    #[must_use]
    pub fn flow_mean_png(&self, channel: FlowChannel) -> PathBuf {
        self.flow_root().join(format!("mean_{}.png", channel.tag()))
    }

    /// `optical_flow/mean_cube.npy`
    #[must_use]
    pub fn mean_cube_npy(&self) -> PathBuf {
        self.flow_root().join(MEAN_CUBE_FILE)
    }

    /// Manifest written beside the clips in `clips_dir`
    #[must_use]
    pub fn manifest_path(clips_dir: &Path) -> PathBuf {
        clips_dir.join(MANIFEST_FILE)
    }
}

/// Two-digit zero padded video folder name
#[must_use]
pub fn video_dir_name(video_id: usize) -> String {
    format!("{:02}", video_id)
}
