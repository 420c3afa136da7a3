//! Evaluation metrics for classification models.

use std::collections::BTreeSet;
use std::fmt;

use linfa::metrics::{ConfusionMatrix, ToConfusionMatrix};
use ndarray::{Array1, ArrayView1};
use serde::Serialize;

use crate::utils::AnalysisError;

/// Precision/recall statistics for a single class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub label: usize,
    /// `TP / (TP + FP)`.
    pub precision: f64,
    /// `TP / (TP + FN)`.
    pub recall: f64,
    pub f1: f64,
    /// Total number of true examples for the class.
    pub support: u32,
}

/// Per-class and averaged metrics for one classifier on one test set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationReport {
    pub classifier: String,
    pub per_class: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub macro_precision: f64,
    pub macro_recall: f64,
    pub macro_f1: f64,
    pub support: u64,
}

impl ClassificationReport {
    pub fn from_predictions(
        classifier: impl Into<String>,
        truth: ArrayView1<'_, usize>,
        predicted: ArrayView1<'_, usize>,
    ) -> Result<Self, AnalysisError> {
        check_lengths(truth, predicted)?;
        if truth.is_empty() {
            return Err(AnalysisError::ValidationError(
                "cannot build a report without samples".to_string(),
            ));
        }
        // rows follow the true label, so linfa's binary precision is TP / (TP + FP)
        let truth = truth.to_owned();
        let predicted = predicted.to_owned();
        let cm = truth.confusion_matrix(&predicted)?;
        let per_class = per_class_metrics(&cm, &truth, &predicted);

        let n = per_class.len() as f64;
        let macro_precision = per_class.iter().map(|c| c.precision).sum::<f64>() / n;
        let macro_recall = per_class.iter().map(|c| c.recall).sum::<f64>() / n;
        let macro_f1 = per_class.iter().map(|c| c.f1).sum::<f64>() / n;

        Ok(Self {
            classifier: classifier.into(),
            per_class,
            accuracy: f64::from(cm.accuracy()),
            macro_precision,
            macro_recall,
            macro_f1,
            support: truth.len() as u64,
        })
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Classification report for classifier {}:", self.classifier)?;
        writeln!(
            f,
            "{:>12} {:>10} {:>10} {:>10} {:>10}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        for class in &self.per_class {
            writeln!(
                f,
                "{:>12} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                class.label, class.precision, class.recall, class.f1, class.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>12} {:>10} {:>10} {:>10.2} {:>10}",
            "accuracy", "", "", self.accuracy, self.support
        )?;
        writeln!(
            f,
            "{:>12} {:>10.2} {:>10.2} {:>10.2} {:>10}",
            "macro avg", self.macro_precision, self.macro_recall, self.macro_f1, self.support
        )
    }
}

/// Per-class precision, recall and f1 from the one-vs-all split of `cm`.
///
/// linfa orders the classes ascending, except for two classes where the
/// order is reversed. Scores with an empty denominator are reported as 0.
fn per_class_metrics(
    cm: &ConfusionMatrix<usize>,
    truth: &Array1<usize>,
    predicted: &Array1<usize>,
) -> Vec<ClassMetrics> {
    let mut labels: Vec<usize> = truth
        .iter()
        .chain(predicted.iter())
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if labels.len() == 2 {
        labels.reverse();
    }

    let mut stats: Vec<ClassMetrics> = labels
        .into_iter()
        .zip(cm.split_one_vs_all())
        .map(|(label, binary)| {
            let support = truth.iter().filter(|&&t| t == label).count();
            ClassMetrics {
                label,
                precision: or_zero(binary.precision()),
                recall: or_zero(binary.recall()),
                f1: or_zero(binary.f1_score()),
                support: u32::try_from(support).unwrap_or(u32::MAX),
            }
        })
        .collect();
    stats.sort_by_key(|c| c.label);
    stats
}

fn or_zero(score: f32) -> f64 {
    if score.is_finite() {
        f64::from(score)
    } else {
        0.0
    }
}

/// Fraction of mispredicted samples (zero-one loss normalized by sample count).
pub fn error_rate(
    truth: ArrayView1<'_, usize>,
    predicted: ArrayView1<'_, usize>,
) -> Result<f64, AnalysisError> {
    check_lengths(truth, predicted)?;
    if truth.is_empty() {
        return Err(AnalysisError::ValidationError(
            "cannot compute an error rate without samples".to_string(),
        ));
    }
    let wrong = truth
        .iter()
        .zip(predicted.iter())
        .filter(|(t, p)| t != p)
        .count();
    Ok(wrong as f64 / truth.len() as f64)
}

fn check_lengths(
    truth: ArrayView1<'_, usize>,
    predicted: ArrayView1<'_, usize>,
) -> Result<(), AnalysisError> {
    if truth.len() != predicted.len() {
        return Err(AnalysisError::ValidationError(format!(
            "{} true labels but {} predictions",
            truth.len(),
            predicted.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::arr1;

    #[test]
    fn test_multiclass_report_uses_truth_rows() {
        let truth = arr1(&[0, 0, 1, 1, 2]);
        let pred = arr1(&[0, 1, 1, 1, 0]);
        let report = ClassificationReport::from_predictions("three", truth.view(), pred.view()).unwrap();

        let labels: Vec<usize> = report.per_class.iter().map(|c| c.label).collect();
        assert_eq!(labels, vec![0, 1, 2]);
        // class 1: predicted three times, right twice
        assert_abs_diff_eq!(report.per_class[1].precision, 2.0 / 3.0, epsilon = 1e-6);
        assert_abs_diff_eq!(report.per_class[1].recall, 1.0, epsilon = 1e-6);
        // class 2 is never predicted
        assert_eq!(report.per_class[2].precision, 0.0);
        assert_eq!(report.per_class[2].f1, 0.0);
        assert_eq!(report.per_class[2].support, 1);
        assert_abs_diff_eq!(report.accuracy, 0.6, epsilon = 1e-6);
    }

    #[test]
    fn test_label_only_in_predictions() {
        let truth = arr1(&[0, 0, 0]);
        let pred = arr1(&[0, 0, 4]);
        let report = ClassificationReport::from_predictions("extra", truth.view(), pred.view()).unwrap();

        assert_eq!(report.per_class.len(), 2);
        assert_eq!(report.per_class[1].label, 4);
        assert_eq!(report.per_class[1].support, 0);
        assert_abs_diff_eq!(report.per_class[0].precision, 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(report.per_class[0].recall, 2.0 / 3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_report_rejects_bad_input() {
        let empty = arr1::<usize>(&[]);
        assert!(ClassificationReport::from_predictions("x", empty.view(), empty.view()).is_err());
        let truth = arr1(&[0, 1]);
        assert!(ClassificationReport::from_predictions("x", truth.view(), arr1(&[0]).view()).is_err());
    }

    #[test]
    fn test_report_values() {
        let truth = arr1(&[0, 0, 1, 1]);
        let pred = arr1(&[0, 1, 1, 1]);
        let report = ClassificationReport::from_predictions("toy", truth.view(), pred.view()).unwrap();

        assert_eq!(report.per_class.len(), 2);
        let c0 = &report.per_class[0];
        assert_abs_diff_eq!(c0.precision, 1.0);
        assert_abs_diff_eq!(c0.recall, 0.5);
        assert_abs_diff_eq!(c0.f1, 2.0 / 3.0, epsilon = 1e-6);
        assert_eq!(c0.support, 2);

        let c1 = &report.per_class[1];
        assert_abs_diff_eq!(c1.precision, 2.0 / 3.0, epsilon = 1e-6);
        assert_abs_diff_eq!(c1.recall, 1.0);

        assert_abs_diff_eq!(report.accuracy, 0.75);
        assert_abs_diff_eq!(report.macro_recall, 0.75);
        assert_eq!(report.support, 4);
    }

    #[test]
    fn test_report_rendering() {
        let truth = arr1(&[0, 1]);
        let report = ClassificationReport::from_predictions("perfect", truth.view(), truth.view()).unwrap();
        let text = report.to_string();
        assert!(text.starts_with("Classification report for classifier perfect:"));
        assert!(text.contains("precision"));
        assert!(text.contains("macro avg"));
        assert!(text.contains("1.00"));
    }

    #[test]
    fn test_error_rate() {
        let truth = arr1(&[1, 0, 1, 0]);
        let pred = arr1(&[1, 1, 1, 1]);
        assert_abs_diff_eq!(error_rate(truth.view(), pred.view()).unwrap(), 0.5);
        assert!(error_rate(truth.view(), arr1(&[1]).view()).is_err());
        let empty = arr1::<usize>(&[]);
        assert!(error_rate(empty.view(), empty.view()).is_err());
    }
}
