//! Fast RBM Engine - Bernoulli Restricted Boltzmann Machines for feature learning
//!
//! This library provides a `linfa`-compatible Bernoulli RBM trained with
//! Stochastic Maximum Likelihood, a feature-extraction pipeline that feeds
//! RBM features to a logistic regression, and a classifier benchmark on the
//! forest covertype dataset.

pub mod bench;
pub mod config;
pub mod covertype;
pub mod dataset;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod rbm;
pub mod stats;
pub mod utils;

pub use bench::{Benchmark, BenchmarkResult};
pub use config::{BenchConfig, PipelineConfig, RbmConfig};
pub use dataset::{LabelColumn, LabeledData};
pub use metrics::ClassificationReport;
pub use rbm::{BernoulliRbm, RbmParams, RbmValidParams};
pub use stats::{DatasetStatistics, Statistics};
pub use utils::AnalysisError;

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;
