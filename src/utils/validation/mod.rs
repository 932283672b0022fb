//! Consolidated validation utilities
//!
//! Shared checks used by the configuration builders, the catalog and the CLI.

pub mod numeric;
pub mod path;

pub use numeric::NumericValidator;
pub use path::PathValidator;
