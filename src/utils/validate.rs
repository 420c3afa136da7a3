use ndarray::{ArrayBase, Data, Ix2};

use super::error::AnalysisError;

/// Validate feature matrix dimensions and values
///
/// # Arguments
/// * `features` - Feature matrix to validate
///
/// # Returns
/// * `Ok(())` if valid
/// * `Err(AnalysisError::ValidationError)` if empty or containing NaN/Inf
pub fn validate_features<F, D>(features: &ArrayBase<D, Ix2>) -> Result<(), AnalysisError>
where
    F: linfa::Float,
    D: Data<Elem = F>,
{
    if features.nrows() == 0 {
        return Err(AnalysisError::ValidationError(
            "feature matrix cannot be empty".to_string(),
        ));
    }

    if features.ncols() == 0 {
        return Err(AnalysisError::ValidationError(
            "feature matrix must have at least one column".to_string(),
        ));
    }

    if features.iter().any(|value| !value.is_finite()) {
        return Err(AnalysisError::ValidationError(
            "feature matrix contains NaN or Inf values".to_string(),
        ));
    }

    Ok(())
}

/// Validate that every entry is a probability-like value in [0, 1]
///
/// Bernoulli units only make sense for binary or [0, 1]-valued inputs.
pub fn validate_unit_interval<F, D>(features: &ArrayBase<D, Ix2>) -> Result<(), AnalysisError>
where
    F: linfa::Float,
    D: Data<Elem = F>,
{
    validate_features(features)?;

    if let Some(value) = features
        .iter()
        .find(|&&v| v < F::zero() || v > F::one())
    {
        return Err(AnalysisError::ValidationError(format!(
            "values must lie in [0, 1], got {}",
            value
        )));
    }

    Ok(())
}

/// Validate that a matrix has the expected number of columns
pub fn validate_width<F, D>(
    what: &str,
    matrix: &ArrayBase<D, Ix2>,
    expected: usize,
) -> Result<(), AnalysisError>
where
    D: Data<Elem = F>,
{
    if matrix.ncols() != expected {
        return Err(AnalysisError::ValidationError(format!(
            "{} has {} columns, expected {}",
            what,
            matrix.ncols(),
            expected
        )));
    }
    Ok(())
}

/// Validate a fraction lies strictly inside (0, 1)
pub fn validate_fraction(name: &str, value: f64) -> Result<(), AnalysisError> {
    if !(value > 0.0 && value < 1.0) {
        return Err(AnalysisError::ValidationError(format!(
            "{} must be in (0, 1), got {}",
            name, value
        )));
    }
    Ok(())
}
