use ndarray::{Array2, Axis};

use crate::utils::AnalysisError;

/// Scaling method used to bring raw features into the [0, 1] range the RBM expects
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ScalingMethod {
    /// No scaling (data already binary or in [0, 1])
    #[default]
    None,
    /// Divide everything by the global maximum, as done for pixel intensities
    Max,
    /// MinMax scaling per column: (x - min) / (max - min) -> [0, 1]
    MinMax,
}

impl std::str::FromStr for ScalingMethod {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "max" => Ok(Self::Max),
            "minmax" | "min-max" => Ok(Self::MinMax),
            other => Err(AnalysisError::ValidationError(format!(
                "unknown scaling method '{}', expected none, max or minmax",
                other
            ))),
        }
    }
}

impl ScalingMethod {
    pub fn apply(self, features: Array2<f64>) -> Result<Array2<f64>, AnalysisError> {
        match self {
            Self::None => Ok(features),
            Self::Max => scale_by_max(features),
            Self::MinMax => min_max_scale(features),
        }
    }
}

/// Divide every value by the global maximum
///
/// # Note
/// A matrix whose maximum is not positive is returned unchanged.
pub fn scale_by_max(features: Array2<f64>) -> Result<Array2<f64>, AnalysisError> {
    if features.iter().any(|v| *v < 0.0) {
        return Err(AnalysisError::ValidationError(
            "max scaling requires non-negative values".to_string(),
        ));
    }
    let max = features.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max > 0.0 {
        Ok(features / max)
    } else {
        Ok(features)
    }
}

/// Apply MinMax scaling: (x - min) / (max - min)
///
/// # Note
/// Constant columns (min == max) are set to 0.0
pub fn min_max_scale(features: Array2<f64>) -> Result<Array2<f64>, AnalysisError> {
    let mut scaled = features;

    for mut col in scaled.columns_mut() {
        let min = col.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = col.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let range = max - min;

        if range.abs() < f64::EPSILON {
            col.fill(0.0);
        } else {
            col.mapv_inplace(|v| (v - min) / range);
        }
    }

    Ok(scaled)
}

/// Standardize the given columns of `train` and `test` with statistics from `train`
///
/// Columns outside `columns` are left untouched. Constant columns get a unit
/// standard deviation so they are only centered.
pub fn standardize_columns(
    train: &mut Array2<f64>,
    test: &mut Array2<f64>,
    columns: std::ops::Range<usize>,
) -> Result<(), AnalysisError> {
    if train.ncols() != test.ncols() {
        return Err(AnalysisError::ValidationError(format!(
            "train has {} columns but test has {}",
            train.ncols(),
            test.ncols()
        )));
    }
    if columns.end > train.ncols() {
        return Err(AnalysisError::ValidationError(format!(
            "cannot standardize columns {:?} of a {}-column matrix",
            columns,
            train.ncols()
        )));
    }
    if train.nrows() == 0 {
        return Err(AnalysisError::ValidationError(
            "cannot standardize with an empty training matrix".to_string(),
        ));
    }

    for col_idx in columns {
        let col = train.index_axis(Axis(1), col_idx);
        let mean = col.mean().unwrap_or(0.0);
        let std = col.std(0.0);
        let std = if std.abs() < f64::EPSILON { 1.0 } else { std };

        train
            .index_axis_mut(Axis(1), col_idx)
            .mapv_inplace(|v| (v - mean) / std);
        test.index_axis_mut(Axis(1), col_idx)
            .mapv_inplace(|v| (v - mean) / std);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_scaling_method_from_str() {
        assert_eq!("none".parse::<ScalingMethod>().unwrap(), ScalingMethod::None);
        assert_eq!("Max".parse::<ScalingMethod>().unwrap(), ScalingMethod::Max);
        assert_eq!("minmax".parse::<ScalingMethod>().unwrap(), ScalingMethod::MinMax);
        assert!("zscore".parse::<ScalingMethod>().is_err());
    }

    #[test]
    fn test_scale_by_max() {
        let features = arr2(&[[0.0, 4.0], [8.0, 16.0]]);
        let scaled = scale_by_max(features).unwrap();
        assert_eq!(scaled, arr2(&[[0.0, 0.25], [0.5, 1.0]]));
    }

    #[test]
    fn test_scale_by_max_all_zero() {
        let features = Array2::<f64>::zeros((2, 2));
        assert_eq!(scale_by_max(features.clone()).unwrap(), features);
    }

    #[test]
    fn test_scale_by_max_negative() {
        assert!(scale_by_max(arr2(&[[-1.0, 1.0]])).is_err());
    }

    #[test]
    fn test_min_max_scale_normal() {
        let features = arr2(&[[0.0, 10.0], [5.0, 20.0], [10.0, 30.0]]);
        let scaled = min_max_scale(features).unwrap();

        assert!((scaled[[0, 0]] - 0.0).abs() < 1e-10);
        assert!((scaled[[1, 0]] - 0.5).abs() < 1e-10);
        assert!((scaled[[2, 0]] - 1.0).abs() < 1e-10);

        assert!((scaled[[0, 1]] - 0.0).abs() < 1e-10);
        assert!((scaled[[1, 1]] - 0.5).abs() < 1e-10);
        assert!((scaled[[2, 1]] - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_min_max_scale_constant_column() {
        let features = arr2(&[[5.0, 10.0], [5.0, 20.0], [5.0, 30.0]]);
        let scaled = min_max_scale(features).unwrap();

        assert_eq!(scaled[[0, 0]], 0.0);
        assert_eq!(scaled[[1, 0]], 0.0);
        assert_eq!(scaled[[2, 0]], 0.0);
        assert!((scaled[[2, 1]] - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_standardize_columns_uses_train_statistics() {
        let mut train = arr2(&[[1.0, 7.0], [2.0, 8.0], [3.0, 9.0]]);
        let mut test = arr2(&[[2.0, 100.0]]);
        standardize_columns(&mut train, &mut test, 0..1).unwrap();

        let mean = train.column(0).mean().unwrap();
        let std = train.column(0).std(0.0);
        assert!(mean.abs() < 1e-10);
        assert!((std - 1.0).abs() < 1e-10);
        // test row equals the training mean for column 0
        assert!(test[[0, 0]].abs() < 1e-10);
        // untouched columns
        assert_eq!(train[[0, 1]], 7.0);
        assert_eq!(test[[0, 1]], 100.0);
    }

    #[test]
    fn test_standardize_columns_out_of_range() {
        let mut train = Array2::<f64>::zeros((2, 3));
        let mut test = Array2::<f64>::zeros((1, 3));
        assert!(standardize_columns(&mut train, &mut test, 0..4).is_err());
    }

    #[test]
    fn test_standardize_constant_column_is_centered() {
        let mut train = arr2(&[[5.0], [5.0]]);
        let mut test = arr2(&[[6.0]]);
        standardize_columns(&mut train, &mut test, 0..1).unwrap();
        assert_eq!(train[[0, 0]], 0.0);
        assert_eq!(test[[0, 0]], 1.0);
    }
}
