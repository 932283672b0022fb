//! Sliding-window clip generation
//!
//! A [`ClipWindower`] walks the window starts of a [`WindowPlan`] and keeps the
//! frames of the current window in one [`RollingBuffer`] per channel. Moving
//! to the next window evicts the `sample_stride` oldest frames and loads only
//! the frames the new window adds, so each frame of a video is decoded at
//! most once per frame stride.

mod rolling;

pub use rolling::RollingBuffer;

use crate::error::{ClipPrepError, Result};
use crate::utils::NumericValidator;
use ndarray::{Array2, Array3, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{trace, warn};

/// Loads one frame of one channel
pub trait FrameSource {
    type Frame;

    fn load(&mut self, channel: usize, path: &Path) -> Result<Self::Frame>;
}

/// Window starts of one video
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPlan {
    num_frames: usize,
    target_length: usize,
    sample_stride: usize,
}

impl WindowPlan {
    pub fn new(num_frames: usize, target_length: usize, sample_stride: usize) -> Result<Self> {
        NumericValidator::validate_positive(target_length, "target_length")?;
        NumericValidator::validate_positive(sample_stride, "sample_stride")?;
        Ok(Self {
            num_frames,
            target_length,
            sample_stride,
        })
    }

    #[must_use]
    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    /// `floor((n - L) / s) + 1` when `n >= L`, otherwise 0
    #[must_use]
    pub fn window_count(&self) -> usize {
        if self.num_frames < self.target_length {
            return 0;
        }
        (self.num_frames - self.target_length) / self.sample_stride + 1
    }

    /// Start position of every full window
    pub fn starts(&self) -> impl Iterator<Item = usize> {
        let step = self.sample_stride;
        (0..self.window_count()).map(move |k| k * step)
    }
}

/// Counters of one windowing pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowStats {
    pub windows: usize,
    pub frames_read: usize,
}

impl std::ops::AddAssign for WindowStats {
    fn add_assign(&mut self, other: Self) {
        self.windows += other.windows;
        self.frames_read += other.frames_read;
    }
}

/// Rolling-buffer windower over one or more aligned frame channels
#[derive(Debug)]
pub struct ClipWindower<T> {
    buffers: Vec<RollingBuffer<T>>,
    target_length: usize,
    sample_stride: usize,
}

impl<T> ClipWindower<T> {
    /// Allocate `channels` buffers of `target_length` slots
    pub fn new(channels: usize, target_length: usize, sample_stride: usize) -> Result<Self> {
        NumericValidator::validate_positive(channels, "channels")?;
        NumericValidator::validate_positive(sample_stride, "sample_stride")?;
        let buffers = (0..channels)
            .map(|_| RollingBuffer::new(target_length))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            buffers,
            target_length,
            sample_stride,
        })
    }

    #[must_use]
    pub fn channels(&self) -> usize {
        self.buffers.len()
    }

    #[must_use]
    pub fn target_length(&self) -> usize {
        self.target_length
    }

    #[must_use]
    pub fn sample_stride(&self) -> usize {
        self.sample_stride
    }

    /// Window every channel of one video and hand each full window to `emit`.
    ///
    /// `sequences` holds one ordered frame list per channel. When their
    /// lengths differ the shortest one decides how many frames are used.
    /// `emit` receives the window index and the channel buffers, each holding
    /// exactly `target_length` frames in temporal order.
    pub fn run<S, F>(
        &mut self,
        sequences: &[&[PathBuf]],
        source: &mut S,
        mut emit: F,
    ) -> Result<WindowStats>
    where
        S: FrameSource<Frame = T>,
        F: FnMut(usize, &[RollingBuffer<T>]) -> Result<()>,
    {
        if sequences.len() != self.buffers.len() {
            return Err(ClipPrepError::internal(format!(
                "Windower has {} channels but received {} frame sequences",
                self.buffers.len(),
                sequences.len()
            )));
        }

        let num_frames = sequences.iter().map(|s| s.len()).min().unwrap_or(0);
        if sequences.iter().any(|s| s.len() != num_frames) {
            let lengths: Vec<usize> = sequences.iter().map(|s| s.len()).collect();
            warn!(?lengths, used = num_frames, "Channel frame counts differ, truncating to shortest");
        }

        for buffer in &mut self.buffers {
            buffer.reset();
        }

        let plan = WindowPlan::new(num_frames, self.target_length, self.sample_stride)?;
        let mut stats = WindowStats::default();
        let mut read_pos = 0;

        for (window_index, start) in plan.starts().enumerate() {
            if window_index > 0 {
                for buffer in &mut self.buffers {
                    buffer.advance(self.sample_stride);
                }
            }

            let end = start + self.target_length;
            for position in read_pos.max(start)..end {
                for (channel, (buffer, frames)) in
                    self.buffers.iter_mut().zip(sequences.iter()).enumerate()
                {
                    let path = frames.get(position).ok_or_else(|| {
                        ClipPrepError::internal(format!(
                            "Frame position {} outside sequence of {}",
                            position,
                            frames.len()
                        ))
                    })?;
                    let frame = source.load(channel, path)?;
                    buffer.set(position - start, frame)?;
                    stats.frames_read += 1;
                }
            }
            read_pos = end;

            if !self.buffers.iter().all(RollingBuffer::is_complete) {
                return Err(ClipPrepError::internal(format!(
                    "Window {} starting at frame {} is incomplete",
                    window_index, start
                )));
            }

            trace!(window_index, start, "Emitting window");
            emit(window_index, &self.buffers)?;
            stats.windows += 1;
        }

        Ok(stats)
    }
}

/// Stack every frame of every channel into a `[frames, H, W]` clip.
///
/// Channels are concatenated in order, so two flow buffers give
/// `[vx..., vy...]`.
pub fn assemble_clip<E: Clone>(buffers: &[RollingBuffer<Array2<E>>]) -> Result<Array3<E>> {
    let views: Vec<ArrayView2<'_, E>> = buffers
        .iter()
        .flat_map(RollingBuffer::iter)
        .map(Array2::view)
        .collect();
    if views.is_empty() {
        return Err(ClipPrepError::internal("Cannot assemble a clip from empty buffers"));
    }
    ndarray::stack(Axis(0), &views).map_err(|e| {
        ClipPrepError::processing_stage_error(
            "clip assembly",
            &format!("frames of one window differ in size: {}", e),
            None,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    /// Returns the frame position parsed from paths like `f/7`
    struct CountingSource {
        loads: Vec<(usize, usize)>,
    }

    impl FrameSource for CountingSource {
        type Frame = usize;

        fn load(&mut self, channel: usize, path: &Path) -> Result<usize> {
            let position: usize = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.parse().ok())
                .unwrap();
            self.loads.push((channel, position));
            Ok(position + channel * 1000)
        }
    }

    fn frames(n: usize) -> Vec<PathBuf> {
        (0..n).map(|i| PathBuf::from(format!("f/{}", i))).collect()
    }

    #[test]
    fn test_plan_window_count() {
        assert_eq!(WindowPlan::new(25, 10, 2).unwrap().window_count(), 8);
        assert_eq!(WindowPlan::new(10, 10, 3).unwrap().window_count(), 1);
        assert_eq!(WindowPlan::new(9, 10, 1).unwrap().window_count(), 0);
        assert_eq!(WindowPlan::new(0, 10, 1).unwrap().window_count(), 0);
        assert_eq!(
            WindowPlan::new(25, 10, 2).unwrap().starts().collect::<Vec<_>>(),
            vec![0, 2, 4, 6, 8, 10, 12, 14]
        );
        assert!(WindowPlan::new(10, 0, 1).is_err());
        assert!(WindowPlan::new(10, 3, 0).is_err());
    }

    #[test]
    fn test_windows_match_sequence_slices() {
        let sequence = frames(25);
        let mut windower = ClipWindower::new(1, 10, 2).unwrap();
        let mut source = CountingSource { loads: Vec::new() };
        let mut emitted = Vec::new();

        let stats = windower
            .run(&[&sequence], &mut source, |index, buffers| {
                emitted.push((index, buffers[0].iter().copied().collect::<Vec<_>>()));
                Ok(())
            })
            .unwrap();

        assert_eq!(stats.windows, 8);
        assert_eq!(stats.frames_read, 24);
        for (index, content) in &emitted {
            let start = index * 2;
            assert_eq!(content, &(start..start + 10).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_each_frame_loaded_once() {
        let sequence = frames(40);
        let mut windower = ClipWindower::new(1, 8, 3).unwrap();
        let mut source = CountingSource { loads: Vec::new() };
        windower.run(&[&sequence], &mut source, |_, _| Ok(())).unwrap();

        let positions: Vec<usize> = source.loads.iter().map(|(_, p)| *p).collect();
        let mut deduped = positions.clone();
        deduped.dedup();
        assert_eq!(positions, deduped);
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_sample_stride_larger_than_window_skips_frames() {
        let sequence = frames(20);
        let mut windower = ClipWindower::new(1, 3, 5).unwrap();
        let mut source = CountingSource { loads: Vec::new() };
        let mut starts = Vec::new();

        let stats = windower
            .run(&[&sequence], &mut source, |_, buffers| {
                starts.push(*buffers[0].get(0).unwrap());
                Ok(())
            })
            .unwrap();

        assert_eq!(starts, vec![0, 5, 10, 15]);
        assert_eq!(stats.frames_read, 12);
    }

    #[test]
    fn test_short_video_emits_nothing() {
        let sequence = frames(9);
        let mut windower = ClipWindower::new(1, 10, 1).unwrap();
        let mut source = CountingSource { loads: Vec::new() };
        let stats = windower
            .run(&[&sequence], &mut source, |_, _| -> Result<()> { panic!("no window expected") })
            .unwrap();
        assert_eq!(stats, WindowStats::default());
        assert!(source.loads.is_empty());
    }

    #[test]
    fn test_windower_reused_across_videos() {
        let mut windower = ClipWindower::new(1, 4, 3).unwrap();
        let mut source = CountingSource { loads: Vec::new() };

        let first = frames(11);
        windower.run(&[&first], &mut source, |_, _| Ok(())).unwrap();

        let second = frames(4);
        let mut content = Vec::new();
        windower
            .run(&[&second], &mut source, |_, buffers| {
                content = buffers[0].iter().copied().collect();
                Ok(())
            })
            .unwrap();
        assert_eq!(content, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_two_channels_truncate_to_shortest() {
        let vx = frames(12);
        let vy = frames(10);
        let mut windower = ClipWindower::new(2, 9, 1).unwrap();
        let mut source = CountingSource { loads: Vec::new() };
        let mut last = (Vec::new(), Vec::new());

        let stats = windower
            .run(&[&vx, &vy], &mut source, |_, buffers| {
                last = (
                    buffers[0].iter().copied().collect(),
                    buffers[1].iter().copied().collect(),
                );
                Ok(())
            })
            .unwrap();

        assert_eq!(stats.windows, 2);
        assert_eq!(last.0, (1..10).collect::<Vec<_>>());
        assert_eq!(last.1, (1001..1010).collect::<Vec<_>>());
    }

    #[test]
    fn test_channel_count_mismatch() {
        let sequence = frames(5);
        let mut windower = ClipWindower::<usize>::new(2, 2, 1).unwrap();
        let mut source = CountingSource { loads: Vec::new() };
        assert!(windower.run(&[&sequence], &mut source, |_, _| Ok(())).is_err());
    }

    #[test]
    fn test_emit_error_propagates() {
        let sequence = frames(5);
        let mut windower = ClipWindower::new(1, 2, 1).unwrap();
        let mut source = CountingSource { loads: Vec::new() };
        let result = windower.run(&[&sequence], &mut source, |_, _| {
            Err(ClipPrepError::processing("disk full"))
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_assemble_clip_concatenates_channels() {
        let mut vx = RollingBuffer::new(2).unwrap();
        vx.set(0, arr2(&[[1u8, 1], [1, 1]])).unwrap();
        vx.set(1, arr2(&[[2u8, 2], [2, 2]])).unwrap();
        let mut vy = RollingBuffer::new(2).unwrap();
        vy.set(0, arr2(&[[3u8, 3], [3, 3]])).unwrap();
        vy.set(1, arr2(&[[4u8, 4], [4, 4]])).unwrap();

        let clip = assemble_clip(&[vx, vy]).unwrap();
        assert_eq!(clip.shape(), &[4, 2, 2]);
        let firsts: Vec<u8> = clip.outer_iter().map(|frame| frame[[0, 0]]).collect();
        assert_eq!(firsts, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_assemble_clip_size_mismatch() {
        let mut buffer = RollingBuffer::new(2).unwrap();
        buffer.set(0, Array2::<u8>::zeros((2, 2))).unwrap();
        buffer.set(1, Array2::<u8>::zeros((3, 2))).unwrap();
        assert!(assemble_clip(&[buffer]).is_err());
    }
}
