//! Grayscale previews of clip frames
//!
//! Turns normalized or centered samples (and reconstruction differences)
//! back into viewable 8-bit images.

use crate::error::{ClipPrepError, Result};
use crate::services::FrameIO;
use image::GrayImage;
use ndarray::{Array2, Array3, ArrayView2, Axis, Zip};

fn to_u8(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

fn gray(values: Array2<u8>) -> Result<GrayImage> {
    FrameIO::array_to_gray(&values)
}

/// Frame `index` of a `[frames, H, W]` clip
pub fn clip_frame(clip: &Array3<f32>, index: usize) -> Result<ArrayView2<'_, f32>> {
    let frames = clip.len_of(Axis(0));
    if index >= frames {
        return Err(ClipPrepError::invalid_config(format!(
            "Frame {} out of range for clip with {} frames",
            index, frames
        )));
    }
    Ok(clip.index_axis(Axis(0), index))
}

/// `[-1, 1]` samples to `[0, 255]`
pub fn normalized_to_image(frame: ArrayView2<'_, f32>) -> Result<GrayImage> {
    gray(frame.mapv(|v| to_u8((f64::from(v) + 1.0) * 127.5)))
}

/// Centered samples back to pixels: `x * 255 + mean`
pub fn decenter_to_image(frame: ArrayView2<'_, f32>, mean: &Array2<f64>) -> Result<GrayImage> {
    if frame.dim() != mean.dim() {
        return Err(ClipPrepError::processing_stage_error(
            "decentering",
            "frame size differs from mean field",
            Some(&format!("frame {:?}, mean {:?}", frame.dim(), mean.dim())),
        ));
    }
    let mut pixels = Array2::<u8>::zeros(frame.dim());
    Zip::from(&mut pixels)
        .and(&frame)
        .and(mean)
        .for_each(|out, &v, &m| *out = to_u8(f64::from(v) * 255.0 + m));
    gray(pixels)
}

/// Absolute difference of two normalized frames, scaled so a full-range
/// error of 2 maps to 255
pub fn error_map(original: ArrayView2<'_, f32>, reconstruction: ArrayView2<'_, f32>) -> Result<GrayImage> {
    if original.dim() != reconstruction.dim() {
        return Err(ClipPrepError::processing_stage_error(
            "error map",
            "frames differ in size",
            Some(&format!("{:?} vs {:?}", original.dim(), reconstruction.dim())),
        ));
    }
    let mut pixels = Array2::<u8>::zeros(original.dim());
    Zip::from(&mut pixels)
        .and(&original)
        .and(&reconstruction)
        .for_each(|out, &a, &b| *out = to_u8(f64::from((a - b).abs()) * 127.5));
    gray(pixels)
}
