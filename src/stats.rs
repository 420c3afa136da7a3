use std::fmt;

use ndarray::ArrayView1;

use crate::dataset::LabeledData;

/// Summary statistics of a series of values
#[derive(Debug, Clone, PartialEq)]
pub struct Statistics {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub sum: f64,
}

impl Statistics {
    /// Compute statistics over `values`, `None` when empty
    pub fn compute(values: ArrayView1<'_, f64>) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let count = values.len();
        let sum: f64 = values.sum();
        let mean = sum / count as f64;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Some(Statistics {
            count,
            mean,
            min,
            max,
            sum,
        })
    }
}

/// Sample counts of one side of a binary split
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleCounts {
    pub n_samples: usize,
    /// Samples labeled 1
    pub positive: usize,
    pub negative: usize,
    /// In-memory size of the feature matrix in megabytes
    pub size_mb: usize,
}

impl SampleCounts {
    pub fn compute(data: &LabeledData) -> Self {
        let positive = data.targets.iter().filter(|&&label| label == 1).count();
        let bytes = data.records.len() * std::mem::size_of::<f64>();
        Self {
            n_samples: data.len(),
            positive,
            negative: data.len() - positive,
            size_mb: (bytes as f64 / 1e6) as usize,
        }
    }
}

/// Shape and class balance of a train/test split
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetStatistics {
    pub n_features: usize,
    pub n_classes: usize,
    pub train: SampleCounts,
    pub test: SampleCounts,
}

impl DatasetStatistics {
    pub fn compute(train: &LabeledData, test: &LabeledData) -> Self {
        Self {
            n_features: train.n_features(),
            n_classes: train.class_counts().len(),
            train: SampleCounts::compute(train),
            test: SampleCounts::compute(test),
        }
    }
}

impl fmt::Display for DatasetStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Dataset statistics:")?;
        writeln!(f, "===================")?;
        writeln!(f, "{:<25} {}", "number of features:", self.n_features)?;
        writeln!(f, "{:<25} {}", "number of classes:", self.n_classes)?;
        writeln!(f, "{:<25} float64", "data type:")?;
        for (title, counts) in [
            ("number of train samples:", &self.train),
            ("number of test samples:", &self.test),
        ] {
            writeln!(
                f,
                "{:<25} {} (pos={}, neg={}, size={}MB)",
                title, counts.n_samples, counts.positive, counts.negative, counts.size_mb
            )?;
        }
        Ok(())
    }
}
