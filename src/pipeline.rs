//! RBM feature extraction chained with logistic regression.
//!
//! [`run_comparison`] fits the pipeline and a logistic regression on the raw
//! features against the same split, and reports both.

use linfa::dataset::DatasetBase;
use linfa::ParamGuard;
use linfa_logistic::MultiFittedLogisticRegression;
use ndarray::{Array1, Array2, Axis, Zip};
use tracing::info;

use crate::config::{PipelineConfig, RbmConfig};
use crate::dataset::LabeledData;
use crate::metrics::ClassificationReport;
use crate::models::{validate_training_set, Classifier, LogisticClassifier, TrainedClassifier};
use crate::rbm::BernoulliRbm;
use crate::utils::{validate_width, AnalysisError};

/// Bernoulli RBM features feeding a multinomial logistic regression.
#[derive(Debug, Clone)]
pub struct RbmLogistic {
    pub rbm: RbmConfig,
    pub logistic: LogisticClassifier,
    /// Map each column to [0, 1] with training bounds before the RBM sees it.
    pub rescale: bool,
}

impl RbmLogistic {
    pub fn new(rbm: RbmConfig, logistic: LogisticClassifier) -> Self {
        Self {
            rbm,
            logistic,
            rescale: false,
        }
    }

    pub fn with_rescaling(mut self, rescale: bool) -> Self {
        self.rescale = rescale;
        self
    }

    /// Fit both stages, returning the concrete model
    pub fn fit_pipeline(
        &self,
        records: &Array2<f64>,
        targets: &Array1<usize>,
    ) -> Result<TrainedRbmLogistic, AnalysisError> {
        validate_training_set(records, targets)?;

        let bounds = if self.rescale {
            Some(ColumnBounds::from_records(records))
        } else {
            None
        };
        let scaled;
        let inputs = match &bounds {
            Some(bounds) => {
                scaled = bounds.apply(records);
                &scaled
            }
            None => records,
        };

        let params = self.rbm.to_params::<f64>();
        let dataset = DatasetBase::new(inputs.view(), targets.view());
        let (rbm, features) = params.check_ref()?.fit_transform(&dataset)?;
        let logistic = self.logistic.fit_logistic(&features, targets)?;

        Ok(TrainedRbmLogistic {
            bounds,
            rbm,
            logistic,
        })
    }
}

impl Classifier for RbmLogistic {
    fn name(&self) -> &str {
        "RBM"
    }

    fn fit(
        &self,
        records: &Array2<f64>,
        targets: &Array1<usize>,
    ) -> Result<Box<dyn TrainedClassifier>, AnalysisError> {
        Ok(Box::new(self.fit_pipeline(records, targets)?))
    }
}

/// Fitted [`RbmLogistic`].
pub struct TrainedRbmLogistic {
    bounds: Option<ColumnBounds>,
    rbm: BernoulliRbm<f64>,
    logistic: MultiFittedLogisticRegression<f64, usize>,
}

impl TrainedRbmLogistic {
    pub fn rbm(&self) -> &BernoulliRbm<f64> {
        &self.rbm
    }

    /// RBM hidden probabilities for `records`
    pub fn features(&self, records: &Array2<f64>) -> Result<Array2<f64>, AnalysisError> {
        match &self.bounds {
            Some(bounds) => {
                validate_width("records", records, bounds.min.len())?;
                self.rbm.try_transform(&bounds.apply(records))
            }
            None => self.rbm.try_transform(records),
        }
    }
}

impl TrainedClassifier for TrainedRbmLogistic {
    fn predict(&self, records: &Array2<f64>) -> Result<Array1<usize>, AnalysisError> {
        use linfa::traits::Predict;
        let features = self.features(records)?;
        Ok(self.logistic.predict(&features))
    }
}

/// Per-column training range; values outside it are clipped.
#[derive(Debug, Clone, PartialEq)]
struct ColumnBounds {
    min: Array1<f64>,
    max: Array1<f64>,
}

impl ColumnBounds {
    fn from_records(records: &Array2<f64>) -> Self {
        let min = records.fold_axis(Axis(0), f64::INFINITY, |&acc, &x| acc.min(x));
        let max = records.fold_axis(Axis(0), f64::NEG_INFINITY, |&acc, &x| acc.max(x));
        Self { min, max }
    }

    fn apply(&self, records: &Array2<f64>) -> Array2<f64> {
        let mut scaled = records.to_owned();
        for mut row in scaled.rows_mut() {
            Zip::from(&mut row)
                .and(&self.min)
                .and(&self.max)
                .for_each(|x, &lo, &hi| {
                    let range = hi - lo;
                    *x = if range > 0.0 {
                        ((*x - lo) / range).clamp(0.0, 1.0)
                    } else {
                        0.0
                    };
                });
        }
        scaled
    }
}

/// Reports for the RBM pipeline and the raw-feature baseline.
#[derive(Debug, Clone)]
pub struct Comparison {
    pub pipeline: ClassificationReport,
    pub baseline: ClassificationReport,
    /// Mean pseudo-likelihood per epoch of the fitted RBM
    pub pseudo_likelihood: Vec<f64>,
}

/// Split `data`, fit both classifiers on the training part and evaluate them on the rest.
///
/// Features must already lie in [0, 1].
pub fn run_comparison(data: &LabeledData, config: &PipelineConfig) -> crate::Result<Comparison> {
    config.validate()?;
    let (train, test) = data.train_test_split(config.test_fraction, config.seed)?;
    info!(
        train = train.len(),
        test = test.len(),
        features = data.n_features(),
        "Split dataset"
    );

    let logistic = LogisticClassifier {
        alpha: config.logistic_alpha,
        max_iterations: config.max_iterations,
    };
    let pipeline = RbmLogistic::new(config.rbm.clone(), logistic.clone());

    info!(n_components = config.rbm.n_components, "Fitting RBM pipeline");
    let trained = pipeline.fit_pipeline(&train.records, &train.targets)?;
    let predicted = trained.predict(&test.records)?;
    let pipeline_report = ClassificationReport::from_predictions(
        "RBM features + logistic regression",
        test.targets.view(),
        predicted.view(),
    )?;

    info!("Fitting raw-feature logistic regression");
    let baseline = logistic.fit(&train.records, &train.targets)?;
    let predicted = baseline.predict(&test.records)?;
    let baseline_report = ClassificationReport::from_predictions(
        "logistic regression on raw features",
        test.targets.view(),
        predicted.view(),
    )?;

    Ok(Comparison {
        pipeline: pipeline_report,
        baseline: baseline_report,
        pseudo_likelihood: trained.rbm().pseudo_likelihood_history().to_vec(),
    })
}
