use std::collections::BTreeSet;

use linfa::prelude::*;
use linfa_bayes::GaussianNb;
use linfa_ensemble::{RandomForest, RandomForestParams};
use linfa_logistic::{MultiFittedLogisticRegression, MultiLogisticRegression};
use linfa_svm::Svm;
use linfa_trees::DecisionTree;
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::utils::{validate_features, validate_width, AnalysisError};

/// A classifier that can be trained on a labeled feature matrix.
///
/// The benchmark and the pipeline comparison treat every model through
/// this interface; implementations wrap `linfa` estimators.
pub trait Classifier: Send + Sync {
    fn name(&self) -> &str;

    fn fit(
        &self,
        records: &Array2<f64>,
        targets: &Array1<usize>,
    ) -> Result<Box<dyn TrainedClassifier>, AnalysisError>;
}

/// A fitted classifier.
pub trait TrainedClassifier: Send + Sync {
    fn predict(&self, records: &Array2<f64>) -> Result<Array1<usize>, AnalysisError>;
}

/// Validate a training set before handing it to an estimator
pub fn validate_training_set(
    records: &Array2<f64>,
    targets: &Array1<usize>,
) -> Result<(), AnalysisError> {
    validate_features(records)?;
    if records.nrows() != targets.len() {
        return Err(AnalysisError::ValidationError(format!(
            "records have {} rows but there are {} targets",
            records.nrows(),
            targets.len()
        )));
    }
    Ok(())
}

/// Multinomial logistic regression with an L2 penalty
#[derive(Debug, Clone)]
pub struct LogisticClassifier {
    pub alpha: f64,
    pub max_iterations: u64,
}

impl Default for LogisticClassifier {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            max_iterations: 100,
        }
    }
}

impl LogisticClassifier {
    /// Fit returning the concrete `linfa` model, for callers that chain stages
    pub fn fit_logistic(
        &self,
        records: &Array2<f64>,
        targets: &Array1<usize>,
    ) -> Result<MultiFittedLogisticRegression<f64, usize>, AnalysisError> {
        validate_training_set(records, targets)?;
        let dataset = DatasetBase::new(records.view(), targets.view());

        MultiLogisticRegression::<f64>::default()
            .alpha(self.alpha)
            .max_iterations(self.max_iterations)
            .fit(&dataset)
            .map_err(|e| AnalysisError::ModelError(format!("logistic regression failed: {}", e)))
    }
}

struct TrainedLogistic {
    model: MultiFittedLogisticRegression<f64, usize>,
    n_features: usize,
}

impl TrainedClassifier for TrainedLogistic {
    fn predict(&self, records: &Array2<f64>) -> Result<Array1<usize>, AnalysisError> {
        validate_width("test records", records, self.n_features)?;
        Ok(self.model.predict(records))
    }
}

impl Classifier for LogisticClassifier {
    fn name(&self) -> &str {
        "logistic"
    }

    fn fit(
        &self,
        records: &Array2<f64>,
        targets: &Array1<usize>,
    ) -> Result<Box<dyn TrainedClassifier>, AnalysisError> {
        let model = self.fit_logistic(records, targets)?;
        Ok(Box::new(TrainedLogistic {
            model,
            n_features: records.ncols(),
        }))
    }
}

/// Gaussian naive Bayes
#[derive(Debug, Clone, Default)]
pub struct GaussianNbClassifier;

struct TrainedGaussianNb {
    model: GaussianNb<f64, usize>,
    n_features: usize,
}

impl TrainedClassifier for TrainedGaussianNb {
    fn predict(&self, records: &Array2<f64>) -> Result<Array1<usize>, AnalysisError> {
        validate_width("test records", records, self.n_features)?;
        Ok(self.model.predict(records))
    }
}

impl Classifier for GaussianNbClassifier {
    fn name(&self) -> &str {
        "GaussianNB"
    }

    fn fit(
        &self,
        records: &Array2<f64>,
        targets: &Array1<usize>,
    ) -> Result<Box<dyn TrainedClassifier>, AnalysisError> {
        validate_training_set(records, targets)?;
        let dataset = DatasetBase::new(records.view(), targets.view());

        let model = GaussianNb::<f64, usize>::params()
            .fit(&dataset)
            .map_err(|e| AnalysisError::ModelError(format!("Gaussian naive Bayes failed: {}", e)))?;

        Ok(Box::new(TrainedGaussianNb {
            model,
            n_features: records.ncols(),
        }))
    }
}

/// CART decision tree (Gini impurity, unlimited depth)
#[derive(Debug, Clone)]
pub struct DecisionTreeClassifier {
    pub min_weight_split: f32,
    pub max_depth: Option<usize>,
}

impl Default for DecisionTreeClassifier {
    fn default() -> Self {
        Self {
            min_weight_split: 5.0,
            max_depth: None,
        }
    }
}

struct TrainedDecisionTree {
    model: DecisionTree<f64, usize>,
    n_features: usize,
}

impl TrainedClassifier for TrainedDecisionTree {
    fn predict(&self, records: &Array2<f64>) -> Result<Array1<usize>, AnalysisError> {
        validate_width("test records", records, self.n_features)?;
        Ok(self.model.predict(records))
    }
}

impl Classifier for DecisionTreeClassifier {
    fn name(&self) -> &str {
        "CART"
    }

    fn fit(
        &self,
        records: &Array2<f64>,
        targets: &Array1<usize>,
    ) -> Result<Box<dyn TrainedClassifier>, AnalysisError> {
        validate_training_set(records, targets)?;
        let dataset = DatasetBase::new(records.view(), targets.view());

        let model = DecisionTree::<f64, usize>::params()
            .min_weight_split(self.min_weight_split)
            .max_depth(self.max_depth)
            .fit(&dataset)
            .map_err(|e| AnalysisError::ModelError(format!("decision tree failed: {}", e)))?;

        Ok(Box::new(TrainedDecisionTree {
            model,
            n_features: records.ncols(),
        }))
    }
}

/// Linear support vector machine for two-class problems
///
/// The larger label is the positive class. The solver keeps a dense kernel
/// matrix, so memory grows with the square of the training set size.
#[derive(Debug, Clone)]
pub struct LinearSvmClassifier {
    /// Penalty on misclassified samples, shared by both classes
    pub c: f64,
    pub eps: f64,
}

impl Default for LinearSvmClassifier {
    fn default() -> Self {
        Self { c: 1000.0, eps: 1e-3 }
    }
}

struct TrainedLinearSvm {
    model: Svm<f64, bool>,
    negative: usize,
    positive: usize,
    n_features: usize,
}

impl TrainedClassifier for TrainedLinearSvm {
    fn predict(&self, records: &Array2<f64>) -> Result<Array1<usize>, AnalysisError> {
        validate_width("test records", records, self.n_features)?;
        let decisions: Array1<bool> = self.model.predict(records);
        Ok(decisions.mapv(|d| if d { self.positive } else { self.negative }))
    }
}

impl Classifier for LinearSvmClassifier {
    fn name(&self) -> &str {
        "liblinear"
    }

    fn fit(
        &self,
        records: &Array2<f64>,
        targets: &Array1<usize>,
    ) -> Result<Box<dyn TrainedClassifier>, AnalysisError> {
        validate_training_set(records, targets)?;
        let labels: Vec<usize> = targets
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let (negative, positive) = match labels.as_slice() {
            &[negative, positive] => (negative, positive),
            _ => {
                return Err(AnalysisError::ValidationError(format!(
                    "linear SVM needs exactly two classes, found {}",
                    labels.len()
                )))
            }
        };

        let binary = targets.mapv(|t| t == positive);
        let dataset = DatasetBase::new(records.view(), binary.view());
        let model = Svm::<f64, bool>::params()
            .linear_kernel()
            .pos_neg_weights(self.c, self.c)
            .eps(self.eps)
            .check()
            .map_err(|e| AnalysisError::ModelError(format!("invalid SVM parameters: {}", e)))?
            .fit(&dataset)
            .map_err(|e| AnalysisError::ModelError(format!("linear SVM failed: {}", e)))?;

        Ok(Box::new(TrainedLinearSvm {
            model,
            negative,
            positive,
            n_features: records.ncols(),
        }))
    }
}

/// Bagged CART trees, each grown on a bootstrap sample and a random subset of features
#[derive(Debug, Clone)]
pub struct RandomForestClassifier {
    pub n_estimators: usize,
    pub feature_proportion: f64,
    pub min_weight_split: f32,
    pub random_seed: u64,
}

impl Default for RandomForestClassifier {
    fn default() -> Self {
        Self {
            n_estimators: 20,
            feature_proportion: 0.5,
            min_weight_split: 5.0,
            random_seed: 0,
        }
    }
}

struct TrainedRandomForest {
    model: RandomForest<f64, usize>,
    n_features: usize,
}

impl TrainedClassifier for TrainedRandomForest {
    fn predict(&self, records: &Array2<f64>) -> Result<Array1<usize>, AnalysisError> {
        validate_width("test records", records, self.n_features)?;
        let votes: Array1<usize> = self.model.predict(records);
        Ok(votes)
    }
}

impl Classifier for RandomForestClassifier {
    fn name(&self) -> &str {
        "RandomForest"
    }

    fn fit(
        &self,
        records: &Array2<f64>,
        targets: &Array1<usize>,
    ) -> Result<Box<dyn TrainedClassifier>, AnalysisError> {
        validate_training_set(records, targets)?;
        if records.nrows() == 0 {
            return Err(AnalysisError::ValidationError(
                "random forest needs at least one training sample".to_string(),
            ));
        }
        // the ensemble bootstraps from owned arrays
        let dataset = DatasetBase::new(records.clone(), targets.clone());

        let trees = DecisionTree::<f64, usize>::params().min_weight_split(self.min_weight_split);
        let model = RandomForestParams::new_fixed_rng(trees, StdRng::seed_from_u64(self.random_seed))
            .ensemble_size(self.n_estimators)
            .bootstrap_proportion(1.0)
            .feature_proportion(self.feature_proportion)
            .check()
            .map_err(|e| AnalysisError::ModelError(format!("invalid forest parameters: {}", e)))?
            .fit(&dataset)
            .map_err(|e| AnalysisError::ModelError(format!("random forest failed: {}", e)))?;

        Ok(Box::new(TrainedRandomForest {
            model,
            n_features: records.ncols(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    fn separable() -> (Array2<f64>, Array1<usize>) {
        let records = arr2(&[
            [0.0, 0.1],
            [0.2, 0.0],
            [0.1, 0.3],
            [0.3, 0.2],
            [5.0, 5.1],
            [5.2, 4.9],
            [4.8, 5.3],
            [5.1, 5.0],
        ]);
        let targets = Array1::from(vec![0, 0, 0, 0, 1, 1, 1, 1]);
        (records, targets)
    }

    fn assert_fits_separable(classifier: &dyn Classifier) {
        let (records, targets) = separable();
        let trained = classifier.fit(&records, &targets).unwrap();
        let predicted = trained.predict(&records).unwrap();
        assert_eq!(predicted, targets, "{} misclassified training data", classifier.name());
    }

    #[test]
    fn test_logistic_separable() {
        assert_fits_separable(&LogisticClassifier::default());
    }

    #[test]
    fn test_gaussian_nb_separable() {
        assert_fits_separable(&GaussianNbClassifier);
    }

    #[test]
    fn test_decision_tree_separable() {
        assert_fits_separable(&DecisionTreeClassifier {
            min_weight_split: 2.0,
            max_depth: None,
        });
    }

    #[test]
    fn test_linear_svm_separable() {
        assert_fits_separable(&LinearSvmClassifier::default());
    }

    #[test]
    fn test_linear_svm_maps_labels_back() {
        let (records, targets) = separable();
        let shifted = targets.mapv(|t| 3 * t + 2);
        let trained = LinearSvmClassifier::default().fit(&records, &shifted).unwrap();
        assert_eq!(trained.predict(&records).unwrap(), shifted);
    }

    #[test]
    fn test_linear_svm_rejects_other_class_counts() {
        let (records, _) = separable();
        let three = Array1::from(vec![0, 0, 1, 1, 2, 2, 2, 2]);
        assert!(matches!(
            LinearSvmClassifier::default().fit(&records, &three),
            Err(AnalysisError::ValidationError(_))
        ));
        let one = Array1::from(vec![1; 8]);
        assert!(LinearSvmClassifier::default().fit(&records, &one).is_err());
    }

    #[test]
    fn test_random_forest_separable() {
        assert_fits_separable(&RandomForestClassifier {
            n_estimators: 15,
            feature_proportion: 1.0,
            min_weight_split: 2.0,
            random_seed: 7,
        });
    }

    #[test]
    fn test_random_forest_is_seeded() {
        let (records, targets) = separable();
        // an odd ensemble cannot tie on two classes
        let forest = RandomForestClassifier {
            n_estimators: 21,
            random_seed: 11,
            ..RandomForestClassifier::default()
        };
        let between = arr2(&[[2.4, 2.6], [2.6, 2.4], [0.0, 5.0], [5.0, 0.0]]);
        let first = forest.fit(&records, &targets).unwrap().predict(&between).unwrap();
        let second = forest.fit(&records, &targets).unwrap().predict(&between).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_random_forest_width_mismatch_rejected() {
        let (records, targets) = separable();
        let trained = RandomForestClassifier::default().fit(&records, &targets).unwrap();
        assert!(trained.predict(&Array2::zeros((1, 5))).is_err());
    }

    #[test]
    fn test_names() {
        assert_eq!(LogisticClassifier::default().name(), "logistic");
        assert_eq!(GaussianNbClassifier.name(), "GaussianNB");
        assert_eq!(DecisionTreeClassifier::default().name(), "CART");
        assert_eq!(LinearSvmClassifier::default().name(), "liblinear");
        assert_eq!(RandomForestClassifier::default().name(), "RandomForest");
    }

    #[test]
    fn test_mismatched_targets_rejected() {
        let (records, _) = separable();
        let targets = Array1::from(vec![0, 1]);
        assert!(matches!(
            LogisticClassifier::default().fit(&records, &targets),
            Err(AnalysisError::ValidationError(_))
        ));
    }

    #[test]
    fn test_predict_width_mismatch_rejected() {
        let (records, targets) = separable();
        let trained = GaussianNbClassifier.fit(&records, &targets).unwrap();
        assert!(trained.predict(&Array2::zeros((2, 3))).is_err());
    }

    #[test]
    fn test_nan_rejected() {
        let records = arr2(&[[f64::NAN, 0.0], [1.0, 1.0]]);
        let targets = Array1::from(vec![0, 1]);
        assert!(DecisionTreeClassifier::default().fit(&records, &targets).is_err());
    }
}
