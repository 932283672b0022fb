//! Deterministic clip names
//!
//! `{dataset}_video_{video:02}_frame_interval_{frame_stride}_stride_{sample_stride}_{window:06}`

use crate::error::{ClipPrepError, Result};
use serde::{Deserialize, Serialize};

/// File extension of serialized clips
pub const CLIP_EXTENSION: &str = "npy";

const VIDEO_MARKER: &str = "_video_";
const FRAME_INTERVAL_MARKER: &str = "frame_interval";
const STRIDE_MARKER: &str = "stride";

/// Identity of one emitted clip window
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClipName {
    pub dataset: String,
    pub video_id: usize,
    pub frame_stride: usize,
    pub sample_stride: usize,
    pub window_index: usize,
}

impl ClipName {
    #[must_use]
    pub fn new(
        dataset: &str,
        video_id: usize,
        frame_stride: usize,
        sample_stride: usize,
        window_index: usize,
    ) -> Self {
        Self {
            dataset: dataset.to_string(),
            video_id,
            frame_stride,
            sample_stride,
            window_index,
        }
    }

    /// Name plus `.npy`
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}.{}", self, CLIP_EXTENSION)
    }

    /// Parse the stem of a clip file path
    pub fn from_path(path: &std::path::Path) -> Result<Self> {
        let stem = path.file_stem().and_then(|s| s.to_str()).ok_or_else(|| {
            ClipPrepError::processing(format!("Clip path has no file stem: {}", path.display()))
        })?;
        stem.parse()
    }
}

impl std::fmt::Display for ClipName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{}{:02}_{}_{}_{}_{}_{:06}",
            self.dataset,
            VIDEO_MARKER,
            self.video_id,
            FRAME_INTERVAL_MARKER,
            self.frame_stride,
            STRIDE_MARKER,
            self.sample_stride,
            self.window_index
        )
    }
}

impl std::str::FromStr for ClipName {
    type Err = ClipPrepError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ClipPrepError::processing(format!("Not a clip name: '{}'", s));

        // Dataset names may themselves contain underscores
        let (dataset, tail) = s.rsplit_once(VIDEO_MARKER).ok_or_else(invalid)?;
        if dataset.is_empty() {
            return Err(invalid());
        }

        let parts: Vec<&str> = tail.split('_').collect();
        let [video, "frame", "interval", frame_stride, STRIDE_MARKER, sample_stride, window] =
            parts.as_slice()
        else {
            return Err(invalid());
        };

        let number = |text: &str| -> Result<usize> {
            if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit()) {
                return Err(invalid());
            }
            text.parse().map_err(|_| invalid())
        };

        Ok(Self {
            dataset: dataset.to_string(),
            video_id: number(*video)?,
            frame_stride: number(*frame_stride)?,
            sample_stride: number(*sample_stride)?,
            window_index: number(*window)?,
        })
    }
}
