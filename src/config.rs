//! Estimator and pipeline configuration loaded from TOML files.
//!
//! Every field has a default so partial files are accepted:
//!
//! ```toml
//! seed = 65259
//! logistic_alpha = 1.0
//!
//! [rbm]
//! n_components = 100
//! epsilon = 0.06
//! epochs = 20
//! ```

use std::fs;
use std::path::Path;

use linfa::Float;
use serde::{Deserialize, Serialize};

use crate::rbm::RbmParams;
use crate::utils::{validate_fraction, AnalysisError};

/// RBM hyper-parameters as they appear in configuration files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RbmConfig {
    pub n_components: usize,
    pub epsilon: f64,
    /// Number of persistent fantasy particles
    pub n_particles: usize,
    pub epochs: usize,
    pub verbose: bool,
    pub random_state: u64,
}

impl Default for RbmConfig {
    fn default() -> Self {
        Self {
            n_components: 1024,
            epsilon: 0.1,
            n_particles: 10,
            epochs: 10,
            verbose: false,
            random_state: 0,
        }
    }
}

impl RbmConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, AnalysisError> {
        let contents = read_config(path.as_ref())?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(toml_str: &str) -> Result<Self, AnalysisError> {
        toml::from_str(toml_str)
            .map_err(|err| AnalysisError::ValidationError(format!("invalid RBM config: {}", err)))
    }

    /// Unchecked estimator parameters; validation happens when fitting.
    pub fn to_params<F: Float>(&self) -> RbmParams<F> {
        RbmParams::new()
            .n_components(self.n_components)
            .epsilon(F::cast(self.epsilon))
            .n_particles(self.n_particles)
            .epochs(self.epochs)
            .verbose(self.verbose)
            .random_state(self.random_state)
    }
}

/// Settings of the RBM + logistic regression comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub rbm: RbmConfig,
    /// L2 penalty of the logistic regression stage
    pub logistic_alpha: f64,
    pub max_iterations: u64,
    pub test_fraction: f64,
    pub seed: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            rbm: RbmConfig {
                n_components: 100,
                epsilon: 0.06,
                epochs: 20,
                ..RbmConfig::default()
            },
            logistic_alpha: 1.0,
            max_iterations: 100,
            test_fraction: 0.2,
            seed: 0xfeeb,
        }
    }
}

impl PipelineConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, AnalysisError> {
        let contents = read_config(path.as_ref())?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(toml_str: &str) -> Result<Self, AnalysisError> {
        let config: Self = toml::from_str(toml_str).map_err(|err| {
            AnalysisError::ValidationError(format!("invalid pipeline config: {}", err))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        validate_fraction("test_fraction", self.test_fraction)?;
        if !(self.logistic_alpha.is_finite() && self.logistic_alpha >= 0.0) {
            return Err(AnalysisError::ValidationError(format!(
                "logistic_alpha must be a non-negative number, got {}",
                self.logistic_alpha
            )));
        }
        Ok(())
    }
}

/// Settings of the covertype benchmark, assembled from the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchConfig {
    pub classifiers: Vec<String>,
    pub n_jobs: usize,
    pub random_seed: u64,
    pub data_dir: std::path::PathBuf,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            classifiers: vec![
                "liblinear".to_string(),
                "GaussianNB".to_string(),
                "CART".to_string(),
            ],
            n_jobs: 1,
            random_seed: 13,
            data_dir: std::path::PathBuf::from("bench_covertype_data"),
        }
    }
}

impl BenchConfig {
    /// Parse a comma-separated classifier list, dropping empty entries
    pub fn parse_classifier_list(list: &str) -> Vec<String> {
        list.split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }
}

fn read_config(path: &Path) -> Result<String, AnalysisError> {
    fs::read_to_string(path).map_err(|err| {
        AnalysisError::DataError(format!("failed to read config {}: {}", path.display(), err))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use linfa::ParamGuard;

    #[test]
    fn test_rbm_config_defaults_match_estimator() {
        let from_config = RbmConfig::default().to_params::<f64>();
        assert_eq!(from_config, RbmParams::<f64>::new());
    }

    #[test]
    fn test_partial_rbm_config() {
        let config = RbmConfig::from_toml_str("n_components = 32\nepochs = 3\n").unwrap();
        assert_eq!(config.n_components, 32);
        assert_eq!(config.epochs, 3);
        assert_eq!(config.epsilon, 0.1);
        assert_eq!(config.n_particles, 10);
    }

    #[test]
    fn test_rbm_config_to_params() {
        let config = RbmConfig {
            n_components: 8,
            epsilon: 0.5,
            n_particles: 3,
            epochs: 2,
            verbose: true,
            random_state: 99,
        };
        let params = config.to_params::<f32>().check().unwrap();
        assert_eq!(params.n_components(), 8);
        assert_eq!(params.epsilon(), 0.5f32);
        assert_eq!(params.n_particles(), 3);
        assert_eq!(params.epochs(), 2);
        assert!(params.verbose());
        assert_eq!(params.random_state(), 99);
    }

    #[test]
    fn test_pipeline_config_nested_table() {
        let toml = r#"
            seed = 1
            logistic_alpha = 0.5

            [rbm]
            n_components = 64
            epsilon = 0.02
        "#;
        let config = PipelineConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.seed, 1);
        assert_eq!(config.logistic_alpha, 0.5);
        assert_eq!(config.rbm.n_components, 64);
        assert_eq!(config.rbm.epsilon, 0.02);
        assert_eq!(config.rbm.epochs, 10);
        assert_eq!(config.test_fraction, 0.2);
    }

    #[test]
    fn test_pipeline_config_rejects_bad_values() {
        assert!(PipelineConfig::from_toml_str("test_fraction = 1.5").is_err());
        assert!(PipelineConfig::from_toml_str("logistic_alpha = -1.0").is_err());
        assert!(PipelineConfig::from_toml_str("seed = \"abc\"").is_err());
    }

    #[test]
    fn test_load_from_missing_file() {
        let err = RbmConfig::load_from_file("/nonexistent/rbm.toml").unwrap_err();
        assert!(matches!(err, AnalysisError::DataError(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.toml");
        std::fs::write(&path, "max_iterations = 7\n").unwrap();
        let config = PipelineConfig::load_from_file(&path).unwrap();
        assert_eq!(config.max_iterations, 7);
        assert_eq!(config.rbm.n_components, 100);
    }

    #[test]
    fn test_parse_classifier_list() {
        assert_eq!(
            BenchConfig::parse_classifier_list("logistic, CART,,GaussianNB"),
            vec!["logistic", "CART", "GaussianNB"]
        );
        assert!(BenchConfig::parse_classifier_list("").is_empty());
    }
}
