use linfa::{Float, ParamGuard};

use crate::utils::AnalysisError;

/// Checked hyper-parameters of a Bernoulli RBM.
///
/// Obtained from [`RbmParams`] through [`ParamGuard::check`] or implicitly
/// when calling `fit` on the unchecked parameter set.
#[derive(Clone, Debug, PartialEq)]
pub struct RbmValidParams<F> {
    pub(crate) n_components: usize,
    pub(crate) epsilon: F,
    pub(crate) n_particles: usize,
    pub(crate) epochs: usize,
    pub(crate) verbose: bool,
    pub(crate) random_state: u64,
}

impl<F: Float> RbmValidParams<F> {
    /// Number of binary hidden units
    pub fn n_components(&self) -> usize {
        self.n_components
    }

    /// Learning rate
    pub fn epsilon(&self) -> F {
        self.epsilon
    }

    /// Number of persistent fantasy particles, which also bounds the mini-batch size
    pub fn n_particles(&self) -> usize {
        self.n_particles
    }

    pub fn epochs(&self) -> usize {
        self.epochs
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Seed of the generator used for initialisation, shuffling and sampling
    pub fn random_state(&self) -> u64 {
        self.random_state
    }
}

/// Hyper-parameters of a Bernoulli RBM trained with Stochastic Maximum Likelihood.
///
/// | name           | default | description                               |
/// |----------------|---------|-------------------------------------------|
/// | `n_components` | 1024    | binary hidden units                       |
/// | `epsilon`      | 0.1     | learning rate, worth tuning in 1e-3..1    |
/// | `n_particles`  | 10      | fantasy particles / mini-batch size bound |
/// | `epochs`       | 10      | passes over the training data             |
/// | `verbose`      | false   | log pseudo-likelihood after every epoch   |
/// | `random_state` | 0       | seed                                      |
#[derive(Clone, Debug, PartialEq)]
pub struct RbmParams<F>(RbmValidParams<F>);

impl<F: Float> Default for RbmParams<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Float> RbmParams<F> {
    pub fn new() -> Self {
        Self(RbmValidParams {
            n_components: 1024,
            epsilon: F::cast(0.1),
            n_particles: 10,
            epochs: 10,
            verbose: false,
            random_state: 0,
        })
    }

    pub fn n_components(mut self, n_components: usize) -> Self {
        self.0.n_components = n_components;
        self
    }

    pub fn epsilon(mut self, epsilon: F) -> Self {
        self.0.epsilon = epsilon;
        self
    }

    pub fn n_particles(mut self, n_particles: usize) -> Self {
        self.0.n_particles = n_particles;
        self
    }

    pub fn epochs(mut self, epochs: usize) -> Self {
        self.0.epochs = epochs;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.0.verbose = verbose;
        self
    }

    pub fn random_state(mut self, seed: u64) -> Self {
        self.0.random_state = seed;
        self
    }
}

impl<F: Float> ParamGuard for RbmParams<F> {
    type Checked = RbmValidParams<F>;
    type Error = AnalysisError;

    fn check_ref(&self) -> Result<&Self::Checked, Self::Error> {
        if self.0.n_components == 0 {
            return Err(AnalysisError::ValidationError(
                "n_components must be > 0".to_string(),
            ));
        }
        if self.0.n_particles == 0 {
            return Err(AnalysisError::ValidationError(
                "n_particles must be > 0".to_string(),
            ));
        }
        if !self.0.epsilon.is_finite() || self.0.epsilon <= F::zero() {
            return Err(AnalysisError::ValidationError(format!(
                "epsilon must be a positive finite number, got {}",
                self.0.epsilon
            )));
        }
        Ok(&self.0)
    }

    fn check(self) -> Result<Self::Checked, Self::Error> {
        self.check_ref()?;
        Ok(self.0)
    }
}
