//! Path validation utilities
//!
//! Directory checks for the data root and the output folders.

use crate::error::{ClipPrepError, Result};
use std::path::Path;

/// Validator for file system paths
pub struct PathValidator;

impl PathValidator {
    /// Validate that a path exists
    pub fn validate_exists<P: AsRef<Path>>(path: P) -> Result<()> {
        let path_ref = path.as_ref();
        if !path_ref.exists() {
            return Err(ClipPrepError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Path does not exist: {}", path_ref.display()),
            )));
        }
        Ok(())
    }

    /// Validate that a path is an existing directory
    pub fn validate_directory<P: AsRef<Path>>(path: P) -> Result<()> {
        let path_ref = path.as_ref();
        Self::validate_exists(path_ref)?;

        if !path_ref.is_dir() {
            return Err(ClipPrepError::invalid_config(format!(
                "Path is not a directory: {}",
                path_ref.display()
            )));
        }
        Ok(())
    }

    /// Create a directory (and parents) if missing; idempotent
    pub fn ensure_directory<P: AsRef<Path>>(path: P) -> Result<()> {
        let path_ref = path.as_ref();
        if path_ref.is_file() {
            return Err(ClipPrepError::invalid_config(format!(
                "Output path exists and is a file, not a directory: {}",
                path_ref.display()
            )));
        }

        std::fs::create_dir_all(path_ref)
            .map_err(|e| ClipPrepError::file_io_error("create directory", path_ref, &e))
    }

    /// Create the parent directory of a file path if it has one
    pub fn ensure_parent_directory<P: AsRef<Path>>(path: P) -> Result<()> {
        match path.as_ref().parent() {
            Some(parent) if !parent.as_os_str().is_empty() => Self::ensure_directory(parent),
            _ => Ok(()),
        }
    }
}
