//! Stochastic Maximum Likelihood training loop.
//!
//! Implements persistent contrastive divergence (Tieleman, 2008): the
//! negative phase is driven by a fixed set of fantasy particles that are
//! carried from one mini-batch to the next instead of being restarted
//! from the data.

use linfa::Float;
use ndarray::{Array1, Array2, ArrayBase, Axis, Data, Ix2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use tracing::{debug, info};

use super::algorithm::{bernoulli, BernoulliRbm};
use super::hyperparams::RbmValidParams;
use crate::utils::{validate_unit_interval, validate_width, AnalysisError};

/// Standard deviation of the initial weights.
const WEIGHT_INIT_STD: f64 = 0.01;

/// Owns a model under training together with its generator.
///
/// `fit` drives a trainer over full epochs; [`SmlTrainer::step`] exposes the
/// single mini-batch update for callers that schedule batches themselves.
pub struct SmlTrainer<F> {
    params: RbmValidParams<F>,
    model: BernoulliRbm<F>,
    rng: StdRng,
}

impl<F: Float> SmlTrainer<F> {
    /// Allocate parameters and the fantasy-particle buffer for `n_visible` inputs.
    ///
    /// Weights are drawn from `N(0, 0.01²)`, biases and particles start at zero.
    pub fn new(params: RbmValidParams<F>, n_visible: usize) -> Result<Self, AnalysisError> {
        if n_visible == 0 {
            return Err(AnalysisError::ValidationError(
                "feature matrix must have at least one column".to_string(),
            ));
        }

        let mut rng = StdRng::seed_from_u64(params.random_state());
        let n_components = params.n_components();

        let weights = Array2::from_shape_simple_fn((n_visible, n_components), || {
            F::cast(WEIGHT_INIT_STD * rng.sample::<f64, _>(StandardNormal))
        });
        let model = BernoulliRbm {
            weights,
            hidden_bias: Array1::zeros(n_components),
            visible_bias: Array1::zeros(n_visible),
            hidden_samples: Array2::zeros((params.n_particles(), n_components)),
            pseudo_likelihood_history: Vec::with_capacity(params.epochs()),
        };

        Ok(Self { params, model, rng })
    }

    pub fn model(&self) -> &BernoulliRbm<F> {
        &self.model
    }

    pub fn into_model(self) -> BernoulliRbm<F> {
        self.model
    }

    /// Number of mini-batches a dataset of `n_rows` samples is split into.
    pub fn n_batches(&self, n_rows: usize) -> usize {
        n_rows.div_ceil(self.params.n_particles())
    }

    /// Apply one SML update for the positive batch `v_pos`.
    ///
    /// Returns the pseudo-likelihood of every row of `v_pos`, measured with the
    /// updated parameters.
    pub fn step<D: Data<Elem = F>>(
        &mut self,
        v_pos: &ArrayBase<D, Ix2>,
    ) -> Result<Array1<F>, AnalysisError> {
        validate_width("mini-batch", v_pos, self.model.n_visible())?;
        let mean_v_pos = v_pos.mean_axis(Axis(0)).ok_or_else(|| {
            AnalysisError::ValidationError("mini-batch cannot be empty".to_string())
        })?;

        let h_pos = self.model.hidden_activation(v_pos);
        let v_neg = bernoulli(
            &self.model.visible_activation(&self.model.hidden_samples),
            &mut self.rng,
        );
        let h_neg = self.model.hidden_activation(&v_neg);

        let epsilon = self.params.epsilon();
        let weight_rate = epsilon / F::cast(self.params.n_particles());
        let gradient = v_pos.t().dot(&h_pos) - v_neg.t().dot(&h_neg);
        self.model.weights.scaled_add(weight_rate, &gradient);

        // rows > 0 for both phases, checked above and by n_particles > 0
        let mean_h_pos = h_pos.mean_axis(Axis(0)).unwrap_or_default();
        let mean_h_neg = h_neg.mean_axis(Axis(0)).unwrap_or_default();
        let mean_v_neg = v_neg.mean_axis(Axis(0)).unwrap_or_default();
        self.model
            .hidden_bias
            .scaled_add(epsilon, &(mean_h_pos - mean_h_neg));
        self.model
            .visible_bias
            .scaled_add(epsilon, &(mean_v_pos - mean_v_neg));

        self.model.hidden_samples = bernoulli(&h_neg, &mut self.rng);

        self.model.pseudo_likelihood(v_pos, &mut self.rng)
    }

    /// Run every configured epoch over `x`.
    ///
    /// Sample indices are shuffled once; mini-batch `k` takes every
    /// `n_batches`-th shuffled index starting at `k`.
    pub fn train<D: Data<Elem = F>>(&mut self, x: &ArrayBase<D, Ix2>) -> Result<(), AnalysisError> {
        validate_unit_interval(x)?;
        validate_width("training data", x, self.model.n_visible())?;

        let n_rows = x.nrows();
        let mut indices: Vec<usize> = (0..n_rows).collect();
        indices.shuffle(&mut self.rng);

        let n_batches = self.n_batches(n_rows);
        let batches = strided_batches(&indices, n_batches);

        debug!(
            n_rows,
            n_visible = self.model.n_visible(),
            n_components = self.model.n_components(),
            n_batches,
            epochs = self.params.epochs(),
            "starting SML training"
        );

        for epoch in 0..self.params.epochs() {
            let mut pseudo_likelihood = F::zero();
            for batch in &batches {
                let v_pos = x.select(Axis(0), batch);
                pseudo_likelihood += self.step(&v_pos)?.sum();
            }
            pseudo_likelihood = pseudo_likelihood / F::cast(n_rows);
            self.model.pseudo_likelihood_history.push(pseudo_likelihood);

            if self.params.verbose() {
                info!("Epoch {}, Pseudo-Likelihood = {:.2}", epoch, pseudo_likelihood);
            } else {
                debug!("Epoch {}, Pseudo-Likelihood = {:.2}", epoch, pseudo_likelihood);
            }
        }

        Ok(())
    }
}

/// Split `indices` into `n_batches` interleaved batches: batch `k` holds
/// positions `k, k + n_batches, k + 2 * n_batches, ...`.
pub(crate) fn strided_batches(indices: &[usize], n_batches: usize) -> Vec<Vec<usize>> {
    (0..n_batches)
        .map(|k| indices.iter().skip(k).step_by(n_batches).copied().collect())
        .collect()
}
