//! Mean-field aggregation
//!
//! Pixel-wise means over every frame of a training split. Sums are kept in
//! `u64` so that no realistic dataset can overflow the accumulator.

use crate::catalog::DatasetSpec;
use crate::config::SplitKind;
use crate::error::{ClipPrepError, Result};
use crate::indexer::{FlowChannel, FrameIndexer, FrameMatcher};
use crate::layout::DatasetLayout;
use crate::services::{FrameIO, NpyIO};
use ndarray::{Array2, Array3, ArrayView2, Axis, Ix2, Zip};
use std::path::Path;
use tracing::{debug, info};

/// Running per-pixel sum of 8-bit frames
#[derive(Debug, Clone, Default)]
pub struct MeanAccumulator {
    sum: Option<Array2<u64>>,
    count: u64,
}

impl MeanAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one frame; every frame must match the size of the first
    pub fn add(&mut self, frame: &Array2<u8>) -> Result<()> {
        match &mut self.sum {
            None => {
                self.sum = Some(frame.mapv(u64::from));
            },
            Some(sum) => {
                if sum.dim() != frame.dim() {
                    return Err(ClipPrepError::processing_stage_error(
                        "mean accumulation",
                        "frame size differs from earlier frames",
                        Some(&format!("expected {:?}, got {:?}", sum.dim(), frame.dim())),
                    ));
                }
                Zip::from(sum)
                    .and(frame)
                    .for_each(|acc, &pixel| *acc += u64::from(pixel));
            },
        }
        self.count += 1;
        Ok(())
    }

    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }

    /// `(height, width)` of accumulated frames, once any frame was added
    #[must_use]
    pub fn dim(&self) -> Option<(usize, usize)> {
        self.sum.as_ref().map(Array2::dim)
    }

    /// Divide by the frame count; `label` names the dataset in the error
    pub fn finish(self, label: &str) -> Result<MeanField> {
        match self.sum {
            Some(sum) if self.count > 0 => {
                let count = self.count as f64;
                let values = sum.mapv(|total| total as f64 / count);
                Ok(MeanField::with_frame_count(values, self.count))
            },
            _ => Err(ClipPrepError::empty_mean(label)),
        }
    }
}

/// Per-pixel mean of a set of frames
#[derive(Debug, Clone, PartialEq)]
pub struct MeanField {
    values: Array2<f64>,
    frame_count: Option<u64>,
}

impl MeanField {
    #[must_use]
    pub fn new(values: Array2<f64>) -> Self {
        Self {
            values,
            frame_count: None,
        }
    }

    fn with_frame_count(values: Array2<f64>, frame_count: u64) -> Self {
        Self {
            values,
            frame_count: Some(frame_count),
        }
    }

    #[must_use]
    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    #[must_use]
    pub fn into_values(self) -> Array2<f64> {
        self.values
    }

    /// Number of frames averaged, unknown for fields loaded from disk
    #[must_use]
    pub fn frame_count(&self) -> Option<u64> {
        self.frame_count
    }

    #[must_use]
    pub fn dim(&self) -> (usize, usize) {
        self.values.dim()
    }

    /// Rounded and clamped 8-bit rendering
    #[must_use]
    pub fn to_gray(&self) -> Array2<u8> {
        self.values.mapv(|v| v.round().clamp(0.0, 255.0) as u8)
    }

    /// Write the exact `f64` array and its viewable PNG
    pub fn save(&self, npy_path: &Path, png_path: &Path) -> Result<()> {
        NpyIO::write(npy_path, &self.values)?;
        FrameIO::save_gray(png_path, &self.to_gray())?;
        debug!(npy = %npy_path.display(), png = %png_path.display(), "Saved mean field");
        Ok(())
    }

    pub fn load(npy_path: &Path) -> Result<Self> {
        let values = NpyIO::read::<f64, _>(npy_path)?
            .into_dimensionality::<Ix2>()
            .map_err(|e| {
                ClipPrepError::processing_stage_error(
                    "mean load",
                    &format!("expected a 2-D array: {}", e),
                    Some(&npy_path.display().to_string()),
                )
            })?;
        Ok(Self::new(values))
    }
}

/// Means of the horizontal and vertical flow channels
#[derive(Debug, Clone, PartialEq)]
pub struct FlowMeanField {
    pub vx: MeanField,
    pub vy: MeanField,
}

impl FlowMeanField {
    #[must_use]
    pub fn channel(&self, channel: FlowChannel) -> &MeanField {
        match channel {
            FlowChannel::Vx => &self.vx,
            FlowChannel::Vy => &self.vy,
        }
    }

    /// vx mean repeated `length` times followed by the vy mean repeated `length` times
    pub fn cube(&self, length: usize) -> Result<Array3<f64>> {
        if length == 0 {
            return Err(ClipPrepError::config_value_error("cube length", length, ">= 1", None));
        }
        let views: Vec<ArrayView2<'_, f64>> = FlowChannel::ALL
            .iter()
            .flat_map(|&channel| std::iter::repeat(self.channel(channel).values().view()).take(length))
            .collect();
        ndarray::stack(Axis(0), &views).map_err(|e| {
            ClipPrepError::processing_stage_error(
                "mean cube",
                &format!("vx and vy means differ in size: {}", e),
                None,
            )
        })
    }

    /// Write `mean_vx`/`mean_vy` (`.npy` and `.png`) and `mean_cube.npy`
    pub fn save(&self, layout: &DatasetLayout, cube_length: usize) -> Result<()> {
        for channel in FlowChannel::ALL {
            self.channel(channel)
                .save(&layout.flow_mean_npy(channel), &layout.flow_mean_png(channel))?;
        }
        NpyIO::write(layout.mean_cube_npy(), &self.cube(cube_length)?)?;
        Ok(())
    }

    pub fn load(layout: &DatasetLayout) -> Result<Self> {
        Ok(Self {
            vx: MeanField::load(&layout.flow_mean_npy(FlowChannel::Vx))?,
            vy: MeanField::load(&layout.flow_mean_npy(FlowChannel::Vy))?,
        })
    }
}

fn require_train(spec: &DatasetSpec) -> Result<()> {
    if spec.split == SplitKind::Train {
        Ok(())
    } else {
        Err(ClipPrepError::invalid_config(format!(
            "Mean fields are computed from training videos only, got {}",
            spec.label()
        )))
    }
}

fn accumulate_videos<F>(
    indexer: &FrameIndexer,
    spec: &DatasetSpec,
    video_dir: impl Fn(usize) -> std::path::PathBuf,
    accumulator: &mut MeanAccumulator,
    on_video: &mut F,
) -> Result<()>
where
    F: FnMut(usize),
{
    for video_id in spec.video_ids() {
        let dir = video_dir(video_id);
        let frames = indexer.list_frames(&dir)?;
        for path in &frames {
            accumulator.add(&FrameIO::load_gray(path)?)?;
        }
        debug!(video_id, frames = frames.len(), "Accumulated video into mean");
        on_video(video_id);
    }
    Ok(())
}

/// Mean image over every frame of every video of a training split.
///
/// The frame stride is ignored: all frames contribute. `on_video` is called
/// after each video with its id.
pub fn compute_mean_image<F>(layout: &DatasetLayout, spec: &DatasetSpec, mut on_video: F) -> Result<MeanField>
where
    F: FnMut(usize),
{
    require_train(spec)?;
    let indexer = FrameIndexer::for_template(spec.template()?);
    let mut accumulator = MeanAccumulator::new();

    accumulate_videos(
        &indexer,
        spec,
        |video_id| layout.frames_dir(video_id),
        &mut accumulator,
        &mut on_video,
    )?;

    let frames = accumulator.count();
    let mean = accumulator.finish(&spec.label())?;
    info!(dataset = %spec.label(), frames, dim = ?mean.dim(), "Computed mean image");
    Ok(mean)
}

/// Separate vx and vy means over every optical-flow frame of a training split
pub fn compute_flow_mean<F>(layout: &DatasetLayout, spec: &DatasetSpec, mut on_video: F) -> Result<FlowMeanField>
where
    F: FnMut(usize),
{
    require_train(spec)?;
    let template = spec.template()?;
    let mut accumulators = [MeanAccumulator::new(), MeanAccumulator::new()];

    for (channel, accumulator) in FlowChannel::ALL.iter().zip(accumulators.iter_mut()) {
        let indexer = FrameIndexer::new(FrameMatcher::flow(*channel, &template));
        accumulate_videos(
            &indexer,
            spec,
            |video_id| layout.flow_dir(video_id),
            accumulator,
            &mut |video_id| {
                if *channel == FlowChannel::Vy {
                    on_video(video_id);
                }
            },
        )?;
    }

    let [vx, vy] = accumulators;
    let label = format!("{} optical flow", spec.label());
    let flow = FlowMeanField {
        vx: vx.finish(&format!("{} vx", label))?,
        vy: vy.finish(&format!("{} vy", label))?,
    };
    if flow.vx.dim() != flow.vy.dim() {
        return Err(ClipPrepError::processing_stage_error(
            "flow mean",
            "vx and vy frames differ in size",
            Some(&format!("vx {:?}, vy {:?}", flow.vx.dim(), flow.vy.dim())),
        ));
    }
    info!(dataset = %spec.label(), dim = ?flow.vx.dim(), "Computed optical-flow means");
    Ok(flow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StrideSet;
    use ndarray::arr2;
    use tempfile::tempdir;

    #[test]
    fn test_accumulator_exact_mean() {
        let mut accumulator = MeanAccumulator::new();
        accumulator.add(&arr2(&[[0u8, 255], [10, 1]])).unwrap();
        accumulator.add(&arr2(&[[255u8, 255], [20, 2]])).unwrap();
        accumulator.add(&arr2(&[[255u8, 255], [30, 2]])).unwrap();

        assert_eq!(accumulator.count(), 3);
        let mean = accumulator.finish("test").unwrap();
        assert_eq!(mean.frame_count(), Some(3));
        assert!((mean.values()[[0, 0]] - 170.0).abs() < 1e-12);
        assert_eq!(mean.values()[[0, 1]], 255.0);
        assert_eq!(mean.values()[[1, 0]], 20.0);
        assert!((mean.values()[[1, 1]] - 5.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_accumulator_does_not_overflow() {
        let mut accumulator = MeanAccumulator::new();
        let bright = Array2::from_elem((2, 2), 255u8);
        for _ in 0..100_000 {
            accumulator.add(&bright).unwrap();
        }
        let mean = accumulator.finish("bright").unwrap();
        assert!(mean.values().iter().all(|&v| v == 255.0));
    }

    #[test]
    fn test_empty_accumulator_is_error() {
        let err = MeanAccumulator::new().finish("avenue/train").unwrap_err();
        assert!(matches!(err, ClipPrepError::EmptyMean(_)));
        assert!(err.to_string().contains("avenue/train"));
    }

    #[test]
    fn test_accumulator_rejects_size_change() {
        let mut accumulator = MeanAccumulator::new();
        accumulator.add(&Array2::zeros((2, 2))).unwrap();
        assert!(accumulator.add(&Array2::zeros((2, 3))).is_err());
        assert_eq!(accumulator.count(), 1);
    }

    #[test]
    fn test_mean_field_round_trip() {
        let dir = tempdir().unwrap();
        let field = MeanField::new(arr2(&[[0.4, 254.6], [1.0 / 3.0, 300.0]]));
        let npy = dir.path().join("mean_image.npy");
        let png = dir.path().join("mean_image.png");

        field.save(&npy, &png).unwrap();
        let loaded = MeanField::load(&npy).unwrap();
        assert_eq!(loaded.values(), field.values());

        let gray = FrameIO::load_gray(&png).unwrap();
        assert_eq!(gray, arr2(&[[0u8, 255], [0, 255]]));
    }

    #[test]
    fn test_flow_cube_layout() {
        let flow = FlowMeanField {
            vx: MeanField::new(Array2::from_elem((2, 3), 1.0)),
            vy: MeanField::new(Array2::from_elem((2, 3), 2.0)),
        };
        let cube = flow.cube(4).unwrap();
        assert_eq!(cube.shape(), &[8, 2, 3]);
        let firsts: Vec<f64> = cube.outer_iter().map(|frame| frame[[0, 0]]).collect();
        assert_eq!(firsts, vec![1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 2.0]);
        assert!(flow.cube(0).is_err());
    }

    #[test]
    fn test_compute_mean_rejects_test_split() {
        let dir = tempdir().unwrap();
        let spec = DatasetSpec::new("avenue", SplitKind::Test, 1, StrideSet::single(1));
        let layout = DatasetLayout::new(dir.path(), &spec);
        let err = compute_mean_image(&layout, &spec, |_| {}).unwrap_err();
        assert!(matches!(err, ClipPrepError::InvalidConfig(_)));
    }

    #[test]
    fn test_compute_mean_over_videos() {
        let dir = tempdir().unwrap();
        let spec = DatasetSpec::new("toy", SplitKind::Train, 2, StrideSet::single(3));
        let layout = DatasetLayout::new(dir.path(), &spec);

        FrameIO::save_gray(layout.frames_dir(1).join("frame_00000.png"), &Array2::from_elem((2, 2), 10)).unwrap();
        FrameIO::save_gray(layout.frames_dir(1).join("frame_00001.png"), &Array2::from_elem((2, 2), 20)).unwrap();
        FrameIO::save_gray(layout.frames_dir(2).join("frame_00000.png"), &Array2::from_elem((2, 2), 60)).unwrap();

        let mut visited = Vec::new();
        let mean = compute_mean_image(&layout, &spec, |video| visited.push(video)).unwrap();
        assert_eq!(visited, vec![1, 2]);
        // Frame stride does not decimate the mean
        assert_eq!(mean.frame_count(), Some(3));
        assert!(mean.values().iter().all(|&v| (v - 30.0).abs() < 1e-12));
    }

    #[test]
    fn test_compute_mean_without_frames() {
        let dir = tempdir().unwrap();
        let spec = DatasetSpec::new("empty", SplitKind::Train, 3, StrideSet::single(1));
        let layout = DatasetLayout::new(dir.path(), &spec);
        let err = compute_mean_image(&layout, &spec, |_| {}).unwrap_err();
        assert!(matches!(err, ClipPrepError::EmptyMean(_)));
    }
}
