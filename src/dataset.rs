use std::collections::BTreeMap;

use anyhow::{anyhow, bail, Context};
use linfa::Dataset;
use ndarray::{Array1, Array2, Axis, Ix1};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Which CSV column holds the class label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LabelColumn {
    /// The last column
    #[default]
    Last,
    /// A zero-based column index
    Index(usize),
    /// No label column; every row gets class 0
    None,
}

impl std::str::FromStr for LabelColumn {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "last" => Ok(Self::Last),
            "none" => Ok(Self::None),
            other => other
                .parse::<usize>()
                .map(Self::Index)
                .map_err(|_| anyhow!("label column must be an index, 'last' or 'none', got '{}'", s)),
        }
    }
}

/// A single labeled sample in JSON form
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabeledPoint {
    pub features: Vec<f64>,
    #[serde(default)]
    pub label: usize,
}

/// Dense feature matrix with one class label per row
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledData {
    pub records: Array2<f64>,
    pub targets: Array1<usize>,
}

impl LabeledData {
    pub fn new(records: Array2<f64>, targets: Array1<usize>) -> crate::Result<Self> {
        if records.nrows() != targets.len() {
            bail!(
                "records have {} rows but there are {} targets",
                records.nrows(),
                targets.len()
            );
        }
        Ok(Self { records, targets })
    }

    /// Get the number of samples
    pub fn len(&self) -> usize {
        self.records.nrows()
    }

    /// Check if dataset is empty
    pub fn is_empty(&self) -> bool {
        self.records.nrows() == 0
    }

    pub fn n_features(&self) -> usize {
        self.records.ncols()
    }

    /// Number of classes, assuming labels are `0..n`
    pub fn n_classes(&self) -> usize {
        self.targets.iter().max().map_or(0, |max| max + 1)
    }

    /// Number of samples per label
    pub fn class_counts(&self) -> BTreeMap<usize, usize> {
        let mut counts = BTreeMap::new();
        for &label in self.targets.iter() {
            *counts.entry(label).or_insert(0) += 1;
        }
        counts
    }

    /// Copy into a `linfa` dataset for fitting
    pub fn to_dataset(&self) -> Dataset<f64, usize, Ix1> {
        Dataset::new(self.records.clone(), self.targets.clone())
    }

    /// Rows at `indices`, in that order
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            records: self.records.select(Axis(0), indices),
            targets: self.targets.select(Axis(0), indices),
        }
    }

    /// Shuffle and split off `test_fraction` of the samples (rounded up) as a test set
    pub fn train_test_split(&self, test_fraction: f64, seed: u64) -> crate::Result<(Self, Self)> {
        crate::utils::validate_fraction("test_fraction", test_fraction)?;
        if self.len() < 2 {
            bail!("need at least 2 samples to split, got {}", self.len());
        }

        let mut indices: Vec<usize> = (0..self.len()).collect();
        indices.shuffle(&mut StdRng::seed_from_u64(seed));

        let n_test = ((self.len() as f64) * test_fraction).ceil() as usize;
        let n_test = n_test.clamp(1, self.len() - 1);
        let (test_idx, train_idx) = indices.split_at(n_test);

        Ok((self.select(train_idx), self.select(test_idx)))
    }

    /// Load dataset from CSV
    ///
    /// A first row that does not parse as numbers is treated as a header.
    pub fn from_csv(csv_data: &str, label_column: LabelColumn) -> crate::Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .trim(csv::Trim::All)
            .from_reader(csv_data.as_bytes());

        let mut rows: Vec<Vec<f64>> = Vec::new();
        let mut labels: Vec<usize> = Vec::new();
        let mut width: Option<usize> = None;

        for (line, result) in reader.records().enumerate() {
            let record = result?;
            let values: Result<Vec<f64>, _> = record.iter().map(str::parse::<f64>).collect();
            let mut values = match values {
                Ok(values) => values,
                Err(_) if line == 0 => continue,
                Err(e) => return Err(anyhow!("row {}: {}", line + 1, e)),
            };

            let label = match label_column {
                LabelColumn::None => 0,
                LabelColumn::Last => {
                    let raw = values
                        .pop()
                        .ok_or_else(|| anyhow!("row {} is empty", line + 1))?;
                    parse_label(raw, line)?
                }
                LabelColumn::Index(idx) => {
                    if idx >= values.len() {
                        bail!("row {} has no column {}", line + 1, idx);
                    }
                    parse_label(values.remove(idx), line)?
                }
            };

            match width {
                None => width = Some(values.len()),
                Some(w) if w != values.len() => {
                    bail!("row {} has {} features, expected {}", line + 1, values.len(), w)
                }
                Some(_) => {}
            }
            rows.push(values);
            labels.push(label);
        }

        let n_features = width.unwrap_or(0);
        let records = Array2::from_shape_vec(
            (rows.len(), n_features),
            rows.into_iter().flatten().collect(),
        )?;
        Self::new(records, Array1::from(labels))
    }

    /// Load dataset from a JSON array of `{"features": [...], "label": n}`
    pub fn from_json(json_data: &str) -> crate::Result<Self> {
        let points: Vec<LabeledPoint> = serde_json::from_str(json_data)?;
        let n_features = points.first().map_or(0, |p| p.features.len());

        if let Some((i, point)) = points
            .iter()
            .enumerate()
            .find(|(_, p)| p.features.len() != n_features)
        {
            bail!(
                "point {} has {} features, expected {}",
                i,
                point.features.len(),
                n_features
            );
        }

        let labels: Array1<usize> = points.iter().map(|p| p.label).collect();
        let records = Array2::from_shape_vec(
            (points.len(), n_features),
            points.into_iter().flat_map(|p| p.features).collect(),
        )?;
        Self::new(records, labels)
    }

    /// Load from a file, picking the format from the extension
    pub fn from_path(path: &std::path::Path, label_column: LabelColumn) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json(&content),
            _ => Self::from_csv(&content, label_column),
        }
    }
}

fn parse_label(raw: f64, line: usize) -> crate::Result<usize> {
    if raw < 0.0 || raw.fract() != 0.0 {
        bail!("row {}: label {} is not a non-negative integer", line + 1, raw);
    }
    Ok(raw as usize)
}

/// Binary "bars" images: one class per horizontal or vertical bar.
///
/// Produces `2 * side` classes of `side * side` pixel images with
/// `n_per_class` samples each. Every pixel is flipped with probability `noise`.
pub fn synthetic_bars(n_per_class: usize, side: usize, noise: f64, seed: u64) -> crate::Result<LabeledData> {
    if side < 2 {
        bail!("bars need a side of at least 2, got {}", side);
    }
    if !(0.0..0.5).contains(&noise) {
        bail!("noise must be in [0, 0.5), got {}", noise);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let n_classes = 2 * side;
    let n_rows = n_classes * n_per_class;
    let mut records = Array2::<f64>::zeros((n_rows, side * side));
    let mut targets = Array1::<usize>::zeros(n_rows);

    for (row_idx, mut row) in records.rows_mut().into_iter().enumerate() {
        let class = row_idx / n_per_class;
        targets[row_idx] = class;
        for (pixel, value) in row.iter_mut().enumerate() {
            let (r, c) = (pixel / side, pixel % side);
            let on = if class < side { r == class } else { c == class - side };
            let flip = rng.gen::<f64>() < noise;
            *value = if on != flip { 1.0 } else { 0.0 };
        }
    }

    LabeledData::new(records, targets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_column_from_str() {
        assert_eq!("last".parse::<LabelColumn>().unwrap(), LabelColumn::Last);
        assert_eq!("None".parse::<LabelColumn>().unwrap(), LabelColumn::None);
        assert_eq!("3".parse::<LabelColumn>().unwrap(), LabelColumn::Index(3));
        assert!("first".parse::<LabelColumn>().is_err());
    }

    #[test]
    fn test_csv_loading_with_header() {
        let csv_data = "a,b,label\n0,1,2\n1,0,0\n1,1,1";
        let dataset = LabeledData::from_csv(csv_data, LabelColumn::Last).unwrap();

        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.n_features(), 2);
        assert_eq!(dataset.records[[0, 1]], 1.0);
        assert_eq!(dataset.targets.to_vec(), vec![2, 0, 1]);
        assert_eq!(dataset.n_classes(), 3);
    }

    #[test]
    fn test_csv_loading_label_index_and_none() {
        let csv_data = "1,0.5,0.25\n0,0.75,1";
        let dataset = LabeledData::from_csv(csv_data, LabelColumn::Index(0)).unwrap();
        assert_eq!(dataset.targets.to_vec(), vec![1, 0]);
        assert_eq!(dataset.records.row(1).to_vec(), vec![0.75, 1.0]);

        let unlabeled = LabeledData::from_csv(csv_data, LabelColumn::None).unwrap();
        assert_eq!(unlabeled.n_features(), 3);
        assert!(unlabeled.targets.iter().all(|&t| t == 0));
    }

    #[test]
    fn test_csv_rejects_ragged_and_bad_rows() {
        assert!(LabeledData::from_csv("1,2,0\n1,0", LabelColumn::Last).is_err());
        assert!(LabeledData::from_csv("1,2,0\n1,x,0", LabelColumn::Last).is_err());
        assert!(LabeledData::from_csv("1,2,0.5", LabelColumn::Last).is_err());
        assert!(LabeledData::from_csv("1,2", LabelColumn::Index(5)).is_err());
    }

    #[test]
    fn test_json_loading() {
        let json_data = r#"[
            {"features": [0.0, 1.0], "label": 1},
            {"features": [1.0, 0.0]}
        ]"#;
        let dataset = LabeledData::from_json(json_data).unwrap();

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.targets.to_vec(), vec![1, 0]);
        assert_eq!(dataset.records[[1, 0]], 1.0);
    }

    #[test]
    fn test_json_rejects_ragged() {
        let json_data = r#"[{"features": [0.0, 1.0]}, {"features": [1.0]}]"#;
        assert!(LabeledData::from_json(json_data).is_err());
    }

    #[test]
    fn test_train_test_split() {
        let data = synthetic_bars(5, 3, 0.0, 1).unwrap();
        let (train, test) = data.train_test_split(0.2, 7).unwrap();
        assert_eq!(test.len(), 6);
        assert_eq!(train.len(), 24);
        assert_eq!(train.n_features(), 9);

        let (train2, test2) = data.train_test_split(0.2, 7).unwrap();
        assert_eq!(train, train2);
        assert_eq!(test, test2);
    }

    #[test]
    fn test_split_needs_two_samples() {
        let one = LabeledData::new(Array2::zeros((1, 2)), Array1::zeros(1)).unwrap();
        assert!(one.train_test_split(0.5, 0).is_err());
        let data = synthetic_bars(2, 2, 0.0, 0).unwrap();
        assert!(data.train_test_split(0.0, 0).is_err());
    }

    #[test]
    fn test_synthetic_bars_without_noise() {
        let data = synthetic_bars(2, 3, 0.0, 0).unwrap();
        assert_eq!(data.len(), 12);
        assert_eq!(data.n_classes(), 6);
        // class 1: middle row lit
        assert_eq!(
            data.records.row(2).to_vec(),
            vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0]
        );
        // class 3: first column lit
        assert_eq!(
            data.records.row(6).to_vec(),
            vec![1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0]
        );
        assert!(data.class_counts().values().all(|&c| c == 2));
    }

    #[test]
    fn test_synthetic_bars_rejects_bad_args() {
        assert!(synthetic_bars(2, 1, 0.0, 0).is_err());
        assert!(synthetic_bars(2, 3, 0.6, 0).is_err());
    }

    #[test]
    fn test_to_dataset_keeps_single_targets() {
        use crate::rbm::BernoulliRbm;
        use linfa::dataset::{AsSingleTargets, Records};
        use linfa::traits::Fit;
        use linfa::ParamGuard;

        let csv_data = "0,1,1\n1,0,0\n1,1,1";
        let data = LabeledData::from_csv(csv_data, LabelColumn::Last).unwrap();
        let dataset = data.to_dataset();

        assert_eq!(dataset.nsamples(), 3);
        assert_eq!(dataset.nfeatures(), 2);
        assert_eq!(dataset.as_single_targets().to_vec(), vec![1, 0, 1]);

        let model = BernoulliRbm::<f64>::params()
            .n_components(2)
            .epochs(1)
            .check()
            .unwrap()
            .fit(&dataset)
            .unwrap();
        assert_eq!(model.pseudo_likelihood_history().len(), 1);
    }

    #[test]
    fn test_mismatched_targets() {
        assert!(LabeledData::new(Array2::zeros((3, 2)), Array1::zeros(2)).is_err());
    }
}
