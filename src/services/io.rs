//! Frame and array I/O service
//!
//! Keeps image decoding and `.npy` serialization out of the windowing and
//! aggregation logic so those can be tested with in-memory frames.

use crate::error::{ClipPrepError, Result};
use crate::utils::PathValidator;
use image::GrayImage;
use ndarray::{Array2, ArrayBase, ArrayD, Data, Dimension, IxDyn, ShapeBuilder};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// Grayscale frame loading and saving
pub struct FrameIO;

impl FrameIO {
    /// Decode an image file into a `[height, width]` luma array
    ///
    /// Color frames are converted to 8-bit grayscale.
    ///
    /// # Examples
    /// ```rust,no_run
    /// use vad_clips::services::FrameIO;
    ///
    /// let frame = FrameIO::load_gray("avenue/training_videos/01/frame_00000.png")?;
    /// println!("{:?}", frame.dim());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load_gray<P: AsRef<Path>>(path: P) -> Result<Array2<u8>> {
        let path_ref = path.as_ref();
        let image = image::open(path_ref).map_err(|e| ClipPrepError::image_load_error(path_ref, &e))?;
        Self::gray_to_array(image.to_luma8())
    }

    /// Encode a luma array as PNG, creating parent directories as needed
    pub fn save_gray<P: AsRef<Path>>(path: P, frame: &Array2<u8>) -> Result<()> {
        let path_ref = path.as_ref();
        PathValidator::ensure_parent_directory(path_ref)?;

        let image = Self::array_to_gray(frame)?;
        image
            .save_with_format(path_ref, image::ImageFormat::Png)
            .map_err(|e| {
                ClipPrepError::processing_stage_error(
                    "image save",
                    &format!("Failed to save PNG: {}", e),
                    Some(&path_ref.display().to_string()),
                )
            })?;

        debug!(path = %path_ref.display(), "Saved grayscale image");
        Ok(())
    }

    pub fn gray_to_array(image: GrayImage) -> Result<Array2<u8>> {
        let (width, height) = image.dimensions();
        Array2::from_shape_vec((height as usize, width as usize), image.into_raw()).map_err(|e| {
            ClipPrepError::internal(format!("Luma buffer does not match {}x{}: {}", width, height, e))
        })
    }

    pub fn array_to_gray(frame: &Array2<u8>) -> Result<GrayImage> {
        let (height, width) = frame.dim();
        let width_px = u32::try_from(width)
            .map_err(|_| ClipPrepError::processing(format!("Frame width {} too large", width)))?;
        let height_px = u32::try_from(height)
            .map_err(|_| ClipPrepError::processing(format!("Frame height {} too large", height)))?;

        GrayImage::from_raw(width_px, height_px, frame.iter().copied().collect()).ok_or_else(|| {
            ClipPrepError::internal(format!("Cannot build {}x{} image from array", width, height))
        })
    }
}

/// Array loaded from a `.npy` file of any supported element type
#[derive(Debug, Clone, PartialEq)]
pub enum NpyArray {
    U8(ArrayD<u8>),
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
}

impl NpyArray {
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        match self {
            Self::U8(array) => array.shape(),
            Self::F32(array) => array.shape(),
            Self::F64(array) => array.shape(),
        }
    }

    /// NumPy-style dtype name
    #[must_use]
    pub fn dtype(&self) -> &'static str {
        match self {
            Self::U8(_) => "uint8",
            Self::F32(_) => "float32",
            Self::F64(_) => "float64",
        }
    }
}

/// `.npy` serialization through `npyz`
pub struct NpyIO;

impl NpyIO {
    /// Write `array` in C order, creating parent directories as needed
    pub fn write<P, A, S, D>(path: P, array: &ArrayBase<S, D>) -> Result<()>
    where
        P: AsRef<Path>,
        A: npyz::AutoSerialize + Clone,
        S: Data<Elem = A>,
        D: Dimension,
    {
        use npyz::WriterBuilder;

        let path_ref = path.as_ref();
        PathValidator::ensure_parent_directory(path_ref)?;

        let file = File::create(path_ref)
            .map_err(|e| ClipPrepError::file_io_error("create array file", path_ref, &e))?;
        let shape: Vec<u64> = array.shape().iter().map(|&d| d as u64).collect();

        let write_all = || -> std::io::Result<()> {
            let mut out = BufWriter::new(file);
            {
                let mut writer = npyz::WriteOptions::<A>::new()
                    .default_dtype()
                    .shape(&shape)
                    .writer(&mut out)
                    .begin_nd()?;
                // Logical iteration order is C order regardless of memory layout
                writer.extend(array.iter().cloned())?;
                writer.finish()?;
            }
            out.flush()
        };
        write_all().map_err(|e| ClipPrepError::file_io_error("write array", path_ref, &e))
    }

    /// Read a `.npy` file whose element type is `T`
    pub fn read<T, P>(path: P) -> Result<ArrayD<T>>
    where
        T: npyz::Deserialize,
        P: AsRef<Path>,
    {
        let path_ref = path.as_ref();
        let bytes = std::fs::read(path_ref)
            .map_err(|e| ClipPrepError::file_io_error("read array", path_ref, &e))?;
        Self::from_bytes(&bytes).map_err(|e| ClipPrepError::file_io_error("decode array", path_ref, &e))
    }

    /// Read a `.npy` file holding `u8`, `f32` or `f64` elements
    pub fn read_any<P: AsRef<Path>>(path: P) -> Result<NpyArray> {
        let path_ref = path.as_ref();
        let bytes = std::fs::read(path_ref)
            .map_err(|e| ClipPrepError::file_io_error("read array", path_ref, &e))?;

        // npyz rejects a mismatched element type before reading data
        if let Ok(array) = Self::from_bytes::<u8>(&bytes) {
            return Ok(NpyArray::U8(array));
        }
        if let Ok(array) = Self::from_bytes::<f32>(&bytes) {
            return Ok(NpyArray::F32(array));
        }
        Self::from_bytes::<f64>(&bytes)
            .map(NpyArray::F64)
            .map_err(|e| {
                ClipPrepError::processing_stage_error(
                    "array decode",
                    &format!("unsupported element type or corrupt file: {}", e),
                    Some(&path_ref.display().to_string()),
                )
            })
    }

    fn from_bytes<T: npyz::Deserialize>(bytes: &[u8]) -> std::io::Result<ArrayD<T>> {
        let npy = npyz::NpyFile::new(bytes)?;
        let shape: Vec<usize> = npy.shape().iter().map(|&d| d as usize).collect();
        let order = npy.order();
        let data = npy.into_vec::<T>()?;

        let array = match order {
            npyz::Order::C => ArrayD::from_shape_vec(IxDyn(&shape), data),
            npyz::Order::Fortran => ArrayD::from_shape_vec(IxDyn(&shape).f(), data),
        };
        array.map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }
}
