//! Shared fixture trees of small generated PNG frames

#![allow(dead_code)]

use ndarray::Array2;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use vad_clips::{
    layout::DatasetLayout, DatasetSpec, FlowChannel, FrameIO, SplitKind, StrideSet,
};

/// Frame width of generated fixtures
pub const WIDTH: usize = 4;
/// Frame height of generated fixtures
pub const HEIGHT: usize = 3;

/// Pixel of frame `number` at column `x`: the frame number shifted by the column
pub fn pixel(number: u64, x: usize) -> u8 {
    ((number + x as u64) % 256) as u8
}

/// A generated frame, `[HEIGHT, WIDTH]`
pub fn frame(number: u64) -> Array2<u8> {
    Array2::from_shape_fn((HEIGHT, WIDTH), |(_, x)| pixel(number, x))
}

/// A data root in a temporary directory
pub struct FrameTree {
    dir: TempDir,
}

impl FrameTree {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("temp dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn layout(&self, spec: &DatasetSpec) -> DatasetLayout {
        DatasetLayout::new(self.root(), spec)
    }

    /// Write frames numbered `1..=count` for one video
    pub fn write_video(&self, spec: &DatasetSpec, video_id: usize, count: u64) -> Vec<PathBuf> {
        let dir = self.layout(spec).frames_dir(video_id);
        (1..=count)
            .map(|number| {
                let path = dir.join(format!("frame_{:05}.png", number));
                FrameIO::save_gray(&path, &frame(number)).expect("write frame");
                path
            })
            .collect()
    }

    /// Write vx/vy flow frames numbered `1..=count`; vy pixels are offset by 100
    pub fn write_flow(&self, spec: &DatasetSpec, video_id: usize, count: u64) {
        let dir = self.layout(spec).flow_dir(video_id);
        for number in 1..=count {
            for channel in FlowChannel::ALL {
                let offset = match channel {
                    FlowChannel::Vx => 0,
                    FlowChannel::Vy => 100,
                };
                let path = dir.join(format!("frame_{:05}_{}.png", number, channel.tag()));
                FrameIO::save_gray(&path, &frame(number + offset)).expect("write flow frame");
            }
        }
    }
}

/// A small dataset split named `name`
pub fn spec(name: &str, split: SplitKind, videos: usize, strides: &[usize]) -> DatasetSpec {
    DatasetSpec::new(name, split, videos, StrideSet::from(strides.to_vec()))
}
