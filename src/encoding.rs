//! Frame encoders turning decoded pixels into clip samples

use crate::error::{ClipPrepError, Result};
use crate::services::FrameIO;
use crate::windower::FrameSource;
use ndarray::{Array2, Zip};
use std::path::Path;

/// Per-frame pixel transform applied before a frame enters the window
pub trait FrameEncoder {
    type Elem: npyz::AutoSerialize + Clone;

    fn encode(&self, channel: usize, frame: Array2<u8>) -> Result<Array2<Self::Elem>>;
}

/// Keeps raw 8-bit pixels
#[derive(Debug, Clone, Copy, Default)]
pub struct RawEncoder;

impl FrameEncoder for RawEncoder {
    type Elem = u8;

    fn encode(&self, _channel: usize, frame: Array2<u8>) -> Result<Array2<u8>> {
        Ok(frame)
    }
}

/// Subtracts a per-channel mean field and scales by 1/255
#[derive(Debug, Clone)]
pub struct CenteringEncoder {
    means: Vec<Array2<f64>>,
}

impl CenteringEncoder {
    /// One mean field per channel, in channel order
    pub fn new(means: Vec<Array2<f64>>) -> Result<Self> {
        if means.is_empty() {
            return Err(ClipPrepError::invalid_config(
                "Centering requires at least one mean field",
            ));
        }
        Ok(Self { means })
    }

    #[must_use]
    pub fn channels(&self) -> usize {
        self.means.len()
    }
}

impl FrameEncoder for CenteringEncoder {
    type Elem = f64;

    fn encode(&self, channel: usize, frame: Array2<u8>) -> Result<Array2<f64>> {
        let mean = self.means.get(channel).ok_or_else(|| {
            ClipPrepError::internal(format!("No mean field for channel {}", channel))
        })?;
        if mean.dim() != frame.dim() {
            return Err(ClipPrepError::processing_stage_error(
                "centering",
                "frame size differs from mean field",
                Some(&format!("frame {:?}, mean {:?}", frame.dim(), mean.dim())),
            ));
        }

        let mut centered = Array2::<f64>::zeros(frame.dim());
        Zip::from(&mut centered)
            .and(&frame)
            .and(mean)
            .for_each(|out, &pixel, &m| *out = (f64::from(pixel) - m) / 255.0);
        Ok(centered)
    }
}

/// Decodes image files to grayscale and runs them through an encoder
#[derive(Debug, Clone)]
pub struct ImageFrameSource<E> {
    encoder: E,
}

impl<E: FrameEncoder> ImageFrameSource<E> {
    #[must_use]
    pub fn new(encoder: E) -> Self {
        Self { encoder }
    }

    #[must_use]
    pub fn encoder(&self) -> &E {
        &self.encoder
    }
}

impl<E: FrameEncoder> FrameSource for ImageFrameSource<E> {
    type Frame = Array2<E::Elem>;

    fn load(&mut self, channel: usize, path: &Path) -> Result<Self::Frame> {
        let frame = FrameIO::load_gray(path)?;
        self.encoder.encode(channel, frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_raw_encoder_is_identity() {
        let frame = arr2(&[[1u8, 2], [3, 4]]);
        assert_eq!(RawEncoder.encode(0, frame.clone()).unwrap(), frame);
    }

    #[test]
    fn test_centering_encoder() {
        let encoder = CenteringEncoder::new(vec![arr2(&[[0.0, 255.0], [127.5, 10.0]])]).unwrap();
        let centered = encoder.encode(0, arr2(&[[255u8, 0], [127, 10]])).unwrap();

        assert!((centered[[0, 0]] - 1.0).abs() < 1e-12);
        assert!((centered[[0, 1]] + 1.0).abs() < 1e-12);
        assert!((centered[[1, 0]] + 0.5 / 255.0).abs() < 1e-12);
        assert_eq!(centered[[1, 1]], 0.0);
    }

    #[test]
    fn test_centering_uses_channel_mean() {
        let encoder = CenteringEncoder::new(vec![
            Array2::from_elem((1, 1), 0.0),
            Array2::from_elem((1, 1), 51.0),
        ])
        .unwrap();
        let vy = encoder.encode(1, arr2(&[[102u8]])).unwrap();
        assert!((vy[[0, 0]] - 0.2).abs() < 1e-12);
        assert!(encoder.encode(2, arr2(&[[0u8]])).is_err());
    }

    #[test]
    fn test_centering_rejects_size_mismatch() {
        let encoder = CenteringEncoder::new(vec![Array2::zeros((2, 2))]).unwrap();
        let err = encoder.encode(0, Array2::zeros((3, 2))).unwrap_err();
        assert!(err.to_string().contains("centering"));
        assert!(CenteringEncoder::new(Vec::new()).is_err());
    }
}
