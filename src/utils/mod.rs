/// Utility modules for error handling, validation and scaling
pub mod error;
pub mod scaling;
pub mod validate;

// Re-export commonly used types
pub use error::AnalysisError;
pub use scaling::{min_max_scale, scale_by_max, standardize_columns, ScalingMethod};
pub use validate::{validate_features, validate_fraction, validate_unit_interval, validate_width};
