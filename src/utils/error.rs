/// Custom error type for estimator, pipeline and benchmark operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalysisError {
    /// Validation errors (e.g., bad hyper-parameter, empty or out-of-range data, width mismatch)
    #[error("ValidationError: {0}")]
    ValidationError(String),
    /// Dataset errors (parsing, I/O, download, cache)
    #[error("DataError: {0}")]
    DataError(String),
    /// Model training/prediction errors
    #[error("ModelError: {0}")]
    ModelError(String),
}

impl From<linfa::Error> for AnalysisError {
    fn from(err: linfa::Error) -> Self {
        AnalysisError::ModelError(err.to_string())
    }
}
