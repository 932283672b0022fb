//! Numeric validation utilities
//!
//! Range and positivity checks for window sizes, strides and counts.

use crate::error::{ClipPrepError, Result};

/// Validator for numeric configuration values
pub struct NumericValidator;

impl NumericValidator {
    /// Validate numeric range (inclusive)
    pub fn validate_range<T>(value: T, min: T, max: T, name: &str) -> Result<T>
    where
        T: PartialOrd + std::fmt::Display + Copy,
    {
        if value < min || value > max {
            return Err(ClipPrepError::invalid_config(format!(
                "{} must be between {} and {}, got {}",
                name, min, max, value
            )));
        }
        Ok(value)
    }

    /// Validate that a value is positive
    pub fn validate_positive<T>(value: T, name: &str) -> Result<T>
    where
        T: PartialOrd + std::fmt::Display + Copy + Default,
    {
        if value <= T::default() {
            return Err(ClipPrepError::invalid_config(format!(
                "{} must be positive, got {}",
                name, value
            )));
        }
        Ok(value)
    }

    /// Validate that every value in a list is positive and appears once
    pub fn validate_unique_positive(values: &[usize], name: &str) -> Result<()> {
        if values.is_empty() {
            return Err(ClipPrepError::invalid_config(format!(
                "{} must contain at least one value",
                name
            )));
        }

        for (i, &value) in values.iter().enumerate() {
            Self::validate_positive(value, name)?;
            if values.iter().take(i).any(|&earlier| earlier == value) {
                return Err(ClipPrepError::invalid_config(format!(
                    "{} contains duplicate value {}",
                    name, value
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_range() {
        assert!(NumericValidator::validate_range(10, 1, 64, "target_length").is_ok());
        assert!(NumericValidator::validate_range(1, 1, 64, "target_length").is_ok());
        assert!(NumericValidator::validate_range(64, 1, 64, "target_length").is_ok());

        assert!(NumericValidator::validate_range(0, 1, 64, "target_length").is_err());
        assert!(NumericValidator::validate_range(65, 1, 64, "target_length").is_err());
    }

    #[test]
    fn test_validate_positive() {
        assert!(NumericValidator::validate_positive(1usize, "stride").is_ok());
        assert!(NumericValidator::validate_positive(100usize, "stride").is_ok());

        assert!(NumericValidator::validate_positive(0usize, "stride").is_err());
        assert!(NumericValidator::validate_positive(-1i32, "stride").is_err());
    }

    #[test]
    fn test_validate_unique_positive() {
        assert!(NumericValidator::validate_unique_positive(&[1, 2, 3], "frame_stride").is_ok());
        assert!(NumericValidator::validate_unique_positive(&[4], "frame_stride").is_ok());

        assert!(NumericValidator::validate_unique_positive(&[], "frame_stride").is_err());
        assert!(NumericValidator::validate_unique_positive(&[1, 0], "frame_stride").is_err());

        let err = NumericValidator::validate_unique_positive(&[1, 2, 1], "frame_stride")
            .unwrap_err()
            .to_string();
        assert!(err.contains("duplicate value 1"));
    }
}
