use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Write};
use std::time::{Duration, Instant};

use anyhow::Context;
use rayon::prelude::*;
use tracing::info;

use crate::config::RbmConfig;
use crate::dataset::LabeledData;
use crate::metrics::error_rate;
use crate::models::{
    Classifier, DecisionTreeClassifier, GaussianNbClassifier, LinearSvmClassifier,
    LogisticClassifier, RandomForestClassifier,
};
use crate::pipeline::RbmLogistic;
use crate::utils::AnalysisError;

/// Timing and error of one classifier on one train/test split
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkResult {
    pub name: String,
    pub train_time: Duration,
    pub test_time: Duration,
    pub error_rate: f64,
}

/// Registry of named classifiers to benchmark
pub struct Benchmark {
    classifiers: BTreeMap<String, Box<dyn Classifier>>,
}

impl Benchmark {
    /// Create an empty benchmark
    pub fn new() -> Self {
        Self {
            classifiers: BTreeMap::new(),
        }
    }

    /// Benchmark with every built-in classifier registered
    pub fn with_defaults(random_seed: u64) -> Self {
        let mut bench = Self::new();
        bench.register(Box::new(LinearSvmClassifier::default()));
        bench.register(Box::new(LogisticClassifier::default()));
        bench.register(Box::new(GaussianNbClassifier));
        bench.register(Box::new(DecisionTreeClassifier::default()));
        bench.register(Box::new(RandomForestClassifier {
            random_seed,
            ..RandomForestClassifier::default()
        }));

        let rbm = RbmConfig {
            n_components: 64,
            epsilon: 0.06,
            epochs: 2,
            random_state: random_seed,
            ..RbmConfig::default()
        };
        bench.register(Box::new(
            RbmLogistic::new(rbm, LogisticClassifier::default()).with_rescaling(true),
        ));
        bench
    }

    /// Add a classifier, replacing any with the same name
    pub fn register(&mut self, classifier: Box<dyn Classifier>) {
        self.classifiers
            .insert(classifier.name().to_string(), classifier);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Classifier> {
        self.classifiers.get(name).map(|c| c.as_ref())
    }

    /// Registered classifier names, sorted
    pub fn names(&self) -> Vec<String> {
        self.classifiers.keys().cloned().collect()
    }

    /// Train and evaluate the `selected` classifiers.
    ///
    /// Every name is checked before anything is trained. With `n_jobs > 1`
    /// classifiers train concurrently on a dedicated thread pool. Results
    /// are sorted by error rate.
    pub fn run(
        &self,
        selected: &[String],
        train: &LabeledData,
        test: &LabeledData,
        n_jobs: usize,
    ) -> crate::Result<Vec<BenchmarkResult>> {
        let names = self.resolve(selected)?;

        let run_one = |name: &String| -> Result<BenchmarkResult, AnalysisError> {
            let classifier = self.classifiers[name.as_str()].as_ref();
            info!("Training {} ...", name);
            benchmark(classifier, train, test)
        };

        let mut results = if n_jobs > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(n_jobs)
                .build()
                .context("failed to build benchmark thread pool")?;
            pool.install(|| names.par_iter().map(run_one).collect::<Result<Vec<_>, _>>())?
        } else {
            names.iter().map(run_one).collect::<Result<Vec<_>, _>>()?
        };

        results.sort_by(|a, b| a.error_rate.total_cmp(&b.error_rate));
        Ok(results)
    }

    fn resolve(&self, selected: &[String]) -> Result<BTreeSet<String>, AnalysisError> {
        if selected.is_empty() {
            return Err(AnalysisError::ValidationError(
                "no classifiers selected".to_string(),
            ));
        }
        let mut names = BTreeSet::new();
        for name in selected {
            if !self.classifiers.contains_key(name) {
                return Err(AnalysisError::ValidationError(format!(
                    "classifier '{}' unknown, available: {}",
                    name,
                    self.names().join(",")
                )));
            }
            names.insert(name.clone());
        }
        Ok(names)
    }
}

impl Default for Benchmark {
    fn default() -> Self {
        Self::new()
    }
}

/// Fit on `train`, predict `test` and time both phases
pub fn benchmark(
    classifier: &dyn Classifier,
    train: &LabeledData,
    test: &LabeledData,
) -> Result<BenchmarkResult, AnalysisError> {
    let start = Instant::now();
    let trained = classifier.fit(&train.records, &train.targets)?;
    let train_time = start.elapsed();

    let start = Instant::now();
    let predicted = trained.predict(&test.records)?;
    let test_time = start.elapsed();

    Ok(BenchmarkResult {
        name: classifier.name().to_string(),
        train_time,
        test_time,
        error_rate: error_rate(test.targets.view(), predicted.view())?,
    })
}

fn center(text: &str, width: usize) -> String {
    format!("{:^width$}", text, width = width)
}

/// One row of the performance table
pub fn format_row(result: &BenchmarkResult) -> String {
    format!(
        "{:<12} {} {} {}",
        result.name,
        center(&format!("{:.4}s", result.train_time.as_secs_f64()), 10),
        center(&format!("{:.4}s", result.test_time.as_secs_f64()), 10),
        center(&format!("{:.4}", result.error_rate), 10),
    )
}

/// Write the performance table, in the order given
pub fn write_report<W: Write>(out: &mut W, results: &[BenchmarkResult]) -> io::Result<()> {
    writeln!(out, "Classification performance:")?;
    writeln!(out, "===========================")?;
    writeln!(out)?;
    writeln!(out, "{:<12} train-time test-time error-rate", "Classifier")?;
    writeln!(out, "{}", "-".repeat(44))?;
    for result in results {
        writeln!(out, "{}", format_row(result))?;
    }
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BenchConfig;
    use ndarray::{arr2, Array1, Array2};

    /// Always predicts a fixed label
    struct Constant {
        name: &'static str,
        label: usize,
    }

    struct TrainedConstant(usize);

    impl crate::models::TrainedClassifier for TrainedConstant {
        fn predict(&self, records: &Array2<f64>) -> Result<Array1<usize>, AnalysisError> {
            Ok(Array1::from_elem(records.nrows(), self.0))
        }
    }

    impl Classifier for Constant {
        fn name(&self) -> &str {
            self.name
        }

        fn fit(
            &self,
            _records: &Array2<f64>,
            _targets: &Array1<usize>,
        ) -> Result<Box<dyn crate::models::TrainedClassifier>, AnalysisError> {
            Ok(Box::new(TrainedConstant(self.label)))
        }
    }

    fn split() -> (LabeledData, LabeledData) {
        let records = arr2(&[[0.0, 0.0], [0.1, 0.2], [1.0, 1.0], [0.9, 1.1]]);
        let train = LabeledData::new(records.clone(), Array1::from(vec![0, 0, 1, 1])).unwrap();
        let test = LabeledData::new(records, Array1::from(vec![0, 1, 1, 1])).unwrap();
        (train, test)
    }

    fn constant_bench() -> Benchmark {
        let mut bench = Benchmark::new();
        bench.register(Box::new(Constant { name: "zeros", label: 0 }));
        bench.register(Box::new(Constant { name: "ones", label: 1 }));
        bench
    }

    #[test]
    fn test_default_registry() {
        let bench = Benchmark::with_defaults(13);
        assert_eq!(
            bench.names(),
            vec!["CART", "GaussianNB", "RBM", "RandomForest", "liblinear", "logistic"]
        );
        assert!(bench.get("CART").is_some());
        assert!(bench.get("liblinear").is_some());
        assert!(bench.get("SGD").is_none());
    }

    #[test]
    fn test_results_sorted_by_error() {
        let (train, test) = split();
        let selected = vec!["zeros".to_string(), "ones".to_string()];
        let results = constant_bench().run(&selected, &train, &test, 1).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].name, "ones");
        assert_eq!(results[0].error_rate, 0.25);
        assert_eq!(results[1].name, "zeros");
        assert_eq!(results[1].error_rate, 0.75);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let (train, test) = split();
        let selected = vec!["zeros".to_string(), "ones".to_string(), "ones".to_string()];
        let bench = constant_bench();
        let sequential = bench.run(&selected, &train, &test, 1).unwrap();
        let parallel = bench.run(&selected, &train, &test, 3).unwrap();

        let errors = |results: &[BenchmarkResult]| {
            results
                .iter()
                .map(|r| (r.name.clone(), r.error_rate))
                .collect::<Vec<_>>()
        };
        assert_eq!(sequential.len(), 2);
        assert_eq!(errors(&sequential), errors(&parallel));
    }

    #[test]
    fn test_unknown_classifier_rejected() {
        let (train, test) = split();
        let err = constant_bench()
            .run(&["SGD".to_string()], &train, &test, 1)
            .unwrap_err();
        assert!(err.to_string().contains("classifier 'SGD' unknown"));
        assert!(constant_bench().run(&[], &train, &test, 1).is_err());
    }

    #[test]
    fn test_real_classifiers_run() {
        let (train, test) = split();
        let selected: Vec<String> = BenchConfig::default().classifiers;
        let results = Benchmark::with_defaults(13)
            .run(&selected, &train, &test, 2)
            .unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| (0.0..=1.0).contains(&r.error_rate)));
    }

    #[test]
    fn test_report_layout() {
        let results = vec![BenchmarkResult {
            name: "CART".to_string(),
            train_time: Duration::from_millis(1500),
            test_time: Duration::from_millis(52),
            error_rate: 0.0469,
        }];
        let mut out = Vec::new();
        write_report(&mut out, &results).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[3], "Classifier   train-time test-time error-rate");
        assert_eq!(lines[4], "-".repeat(44));
        assert_eq!(lines[5], "CART          1.5000s    0.0520s     0.0469  ");
    }
}
