//! Clip dataset loading
//!
//! Consumers treat every `*.npy` clip under a directory as one sample. Raw
//! 8-bit clips are mapped to `[-1, 1]` at load time; centered clips are
//! already normalized and are returned as stored.

use crate::error::{ClipPrepError, Result};
use crate::naming::{ClipName, CLIP_EXTENSION};
use crate::services::{NpyArray, NpyIO};
use ndarray::{Array3, ArrayD, Ix3};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Map an 8-bit pixel to `[-1, 1]`
#[must_use]
pub fn normalize_pixel(value: u8) -> f32 {
    f32::from(value) / 127.5 - 1.0
}

/// One clip file and its parsed name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ClipEntry {
    pub path: PathBuf,
    pub name: ClipName,
}

/// Sorted list of clip files forming one training or evaluation set
#[derive(Debug, Clone, Default)]
pub struct ClipDataset {
    entries: Vec<ClipEntry>,
}

impl ClipDataset {
    /// Clips directly inside each of `dirs`
    pub fn open<P: AsRef<Path>>(dirs: &[P]) -> Result<Self> {
        let mut paths = Vec::new();
        for dir in dirs {
            let dir = dir.as_ref();
            let escaped = glob::Pattern::escape(&dir.to_string_lossy());
            let pattern = format!("{}/*.{}", escaped, CLIP_EXTENSION);
            let matches = glob::glob(&pattern).map_err(|e| {
                ClipPrepError::invalid_config(format!("Bad clip pattern '{}': {}", pattern, e))
            })?;
            for entry in matches {
                let path = entry.map_err(|e| {
                    ClipPrepError::file_io_error("list clips", e.path().to_path_buf(), e.error())
                })?;
                paths.push(path);
            }
        }
        Ok(Self::from_paths(paths))
    }

    /// Clips anywhere below `root`
    pub fn open_recursive<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        let mut paths = Vec::new();
        for entry in walkdir::WalkDir::new(root) {
            let entry = entry.map_err(|e| {
                let io = std::io::Error::new(std::io::ErrorKind::Other, e.to_string());
                ClipPrepError::file_io_error("walk clip directory", root, &io)
            })?;
            let is_clip = entry.file_type().is_file()
                && entry.path().extension().and_then(|ext| ext.to_str()) == Some(CLIP_EXTENSION);
            if is_clip {
                paths.push(entry.into_path());
            }
        }
        Ok(Self::from_paths(paths))
    }

    /// Keep paths whose stem is a clip name, sorted by path
    #[must_use]
    pub fn from_paths(paths: Vec<PathBuf>) -> Self {
        let total = paths.len();
        let mut entries: Vec<ClipEntry> = paths
            .into_iter()
            .filter_map(|path| {
                let name = ClipName::from_path(&path).ok()?;
                Some(ClipEntry { path, name })
            })
            .collect();
        entries.sort();
        entries.dedup_by(|a, b| a.path == b.path);
        debug!(found = total, clips = entries.len(), "Indexed clip files");
        Self { entries }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn entries(&self) -> &[ClipEntry] {
        &self.entries
    }

    #[must_use]
    pub fn entry(&self, index: usize) -> Option<&ClipEntry> {
        self.entries.get(index)
    }

    /// Load sample `index` as `[frames, H, W]` floats
    pub fn get(&self, index: usize) -> Result<Array3<f32>> {
        let entry = self.entries.get(index).ok_or_else(|| {
            ClipPrepError::invalid_config(format!(
                "Clip index {} out of range for {} clips",
                index,
                self.entries.len()
            ))
        })?;
        load_clip(&entry.path)
    }

    /// Raw array of sample `index` without normalization
    pub fn get_raw(&self, index: usize) -> Result<NpyArray> {
        let entry = self.entries.get(index).ok_or_else(|| {
            ClipPrepError::invalid_config(format!("Clip index {} out of range", index))
        })?;
        NpyIO::read_any(&entry.path)
    }

    /// Clip counts per `(dataset, video, frame stride)`
    #[must_use]
    pub fn counts_by_video(&self) -> BTreeMap<(String, usize, usize), usize> {
        let mut counts = BTreeMap::new();
        for entry in &self.entries {
            let key = (entry.name.dataset.clone(), entry.name.video_id, entry.name.frame_stride);
            *counts.entry(key).or_insert(0) += 1;
        }
        counts
    }
}

/// Load one clip file as normalized floats
pub fn load_clip(path: &Path) -> Result<Array3<f32>> {
    let array: ArrayD<f32> = match NpyIO::read_any(path)? {
        NpyArray::U8(array) => array.mapv(normalize_pixel),
        NpyArray::F32(array) => array,
        NpyArray::F64(array) => array.mapv(|v| v as f32),
    };
    array.into_dimensionality::<Ix3>().map_err(|e| {
        ClipPrepError::processing_stage_error(
            "clip load",
            &format!("expected a [frames, height, width] array: {}", e),
            Some(&path.display().to_string()),
        )
    })
}
