use linfa::dataset::DatasetBase;
use linfa::traits::{Fit, Transformer};
use linfa::Float;
use ndarray::{Array1, Array2, ArrayBase, Axis, Data, Ix2, Zip};
use rand::Rng;

use super::hyperparams::{RbmParams, RbmValidParams};
use super::trainer::SmlTrainer;
use crate::utils::{validate_width, AnalysisError};

/// Pre-activations are clamped to this magnitude before exponentiation.
pub const SIGMOID_CLAMP: f64 = 30.0;

/// Logistic function with the argument saturated to `[-30, 30]`.
pub fn sigmoid<F: Float>(x: F) -> F {
    let bound = F::cast(SIGMOID_CLAMP);
    let x = x.max(-bound).min(bound);
    F::one() / (F::one() + (-x).exp())
}

/// `ln(1 + e^x)` without overflowing for large `x`.
pub(crate) fn softplus<F: Float>(x: F) -> F {
    x.max(F::zero()) + (-x.abs()).exp().ln_1p()
}

/// Independent Bernoulli draw for every entry of `probabilities`.
pub(crate) fn bernoulli<F, D, R>(probabilities: &ArrayBase<D, Ix2>, rng: &mut R) -> Array2<F>
where
    F: Float,
    D: Data<Elem = F>,
    R: Rng,
{
    probabilities.mapv(|p| {
        if F::cast(rng.gen::<f64>()) < p {
            F::one()
        } else {
            F::zero()
        }
    })
}

/// A fitted Restricted Boltzmann Machine with binary visible and hidden units.
///
/// Produced by fitting [`RbmParams`] on a binary or `[0, 1]`-valued data
/// matrix. Used as a [`Transformer`], it maps every sample to the activation
/// probabilities of its hidden units, `P(h_j = 1 | v)`.
///
/// ```
/// use fast_rbm_engine::rbm::BernoulliRbm;
/// use linfa::prelude::*;
/// use linfa::ParamGuard;
/// use ndarray::array;
///
/// let x = array![[0., 0., 0.], [0., 1., 1.], [1., 0., 1.], [1., 1., 1.]];
/// let dataset = DatasetBase::from(x.clone());
/// let params = BernoulliRbm::<f64>::params().n_components(2).check().unwrap();
/// let model = params.fit(&dataset).unwrap();
/// let features = model.transform(&x);
/// assert_eq!(features.dim(), (4, 2));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct BernoulliRbm<F> {
    /// Shape `(n_visible, n_components)`
    pub(crate) weights: Array2<F>,
    pub(crate) hidden_bias: Array1<F>,
    pub(crate) visible_bias: Array1<F>,
    /// Persistent fantasy particles (hidden states), shape `(n_particles, n_components)`
    pub(crate) hidden_samples: Array2<F>,
    pub(crate) pseudo_likelihood_history: Vec<F>,
}

impl<F: Float> BernoulliRbm<F> {
    /// Default hyper-parameters, see [`RbmParams`]
    pub fn params() -> RbmParams<F> {
        RbmParams::new()
    }

    /// Build a model from explicit parameters.
    ///
    /// The fantasy-particle buffer starts as a single all-zero particle.
    pub fn from_parameters(
        weights: Array2<F>,
        hidden_bias: Array1<F>,
        visible_bias: Array1<F>,
    ) -> Result<Self, AnalysisError> {
        let (n_visible, n_components) = weights.dim();
        if n_visible == 0 || n_components == 0 {
            return Err(AnalysisError::ValidationError(
                "weight matrix cannot be empty".to_string(),
            ));
        }
        if hidden_bias.len() != n_components {
            return Err(AnalysisError::ValidationError(format!(
                "hidden bias has length {}, expected {}",
                hidden_bias.len(),
                n_components
            )));
        }
        if visible_bias.len() != n_visible {
            return Err(AnalysisError::ValidationError(format!(
                "visible bias has length {}, expected {}",
                visible_bias.len(),
                n_visible
            )));
        }

        Ok(Self {
            weights,
            hidden_bias,
            visible_bias,
            hidden_samples: Array2::zeros((1, n_components)),
            pseudo_likelihood_history: Vec::new(),
        })
    }

    pub fn n_visible(&self) -> usize {
        self.weights.nrows()
    }

    pub fn n_components(&self) -> usize {
        self.weights.ncols()
    }

    /// Weight matrix `W`, shape `(n_visible, n_components)`
    pub fn weights(&self) -> &Array2<F> {
        &self.weights
    }

    /// Hidden unit biases `b`
    pub fn hidden_bias(&self) -> &Array1<F> {
        &self.hidden_bias
    }

    /// Visible unit biases `c`
    pub fn visible_bias(&self) -> &Array1<F> {
        &self.visible_bias
    }

    /// Fantasy particles left by the last training step
    pub fn hidden_samples(&self) -> &Array2<F> {
        &self.hidden_samples
    }

    /// Average pseudo-likelihood per sample, one entry per training epoch
    pub fn pseudo_likelihood_history(&self) -> &[F] {
        &self.pseudo_likelihood_history
    }

    /// `P(h = 1 | v)` for every row of `v`.
    pub fn mean_hidden<D: Data<Elem = F>>(
        &self,
        v: &ArrayBase<D, Ix2>,
    ) -> Result<Array2<F>, AnalysisError> {
        validate_width("visible batch", v, self.n_visible())?;
        Ok(self.hidden_activation(v))
    }

    /// Sample `h ~ P(h | v)`.
    pub fn sample_hidden<D, R>(
        &self,
        v: &ArrayBase<D, Ix2>,
        rng: &mut R,
    ) -> Result<Array2<F>, AnalysisError>
    where
        D: Data<Elem = F>,
        R: Rng,
    {
        let probabilities = self.mean_hidden(v)?;
        Ok(bernoulli(&probabilities, rng))
    }

    /// `P(v = 1 | h)` for every row of `h`.
    pub fn mean_visible<D: Data<Elem = F>>(
        &self,
        h: &ArrayBase<D, Ix2>,
    ) -> Result<Array2<F>, AnalysisError> {
        validate_width("hidden batch", h, self.n_components())?;
        Ok(self.visible_activation(h))
    }

    /// Sample `v ~ P(v | h)`.
    pub fn sample_visible<D, R>(
        &self,
        h: &ArrayBase<D, Ix2>,
        rng: &mut R,
    ) -> Result<Array2<F>, AnalysisError>
    where
        D: Data<Elem = F>,
        R: Rng,
    {
        let probabilities = self.mean_visible(h)?;
        Ok(bernoulli(&probabilities, rng))
    }

    /// Free energy `F(v) = -c·v - Σ_j ln(1 + exp((vW + b)_j))` per row.
    pub fn free_energy<D: Data<Elem = F>>(
        &self,
        v: &ArrayBase<D, Ix2>,
    ) -> Result<Array1<F>, AnalysisError> {
        validate_width("visible batch", v, self.n_visible())?;
        Ok(self.free_energy_unchecked(v))
    }

    /// One Gibbs step: `v -> h ~ P(h|v) -> v' ~ P(v|h)`.
    pub fn gibbs<D, R>(&self, v: &ArrayBase<D, Ix2>, rng: &mut R) -> Result<Array2<F>, AnalysisError>
    where
        D: Data<Elem = F>,
        R: Rng,
    {
        let h = self.sample_hidden(v, rng)?;
        Ok(bernoulli(&self.visible_activation(&h), rng))
    }

    /// Stochastic pseudo-likelihood estimate for every row of `v`.
    ///
    /// One randomly chosen feature per row is flipped and the free energies
    /// before and after are compared. The result approximates
    /// `n_features * ln P(v_i | v_-i)` and is only meant for monitoring.
    pub fn pseudo_likelihood<D, R>(
        &self,
        v: &ArrayBase<D, Ix2>,
        rng: &mut R,
    ) -> Result<Array1<F>, AnalysisError>
    where
        D: Data<Elem = F>,
        R: Rng,
    {
        validate_width("visible batch", v, self.n_visible())?;
        let n_features = v.ncols();

        let energy = self.free_energy_unchecked(v);

        let mut flipped = v.to_owned();
        for mut row in flipped.rows_mut() {
            let i = rng.gen_range(0..n_features);
            row[i] = if row[i] == F::zero() { F::one() } else { F::zero() };
        }
        let flipped_energy = self.free_energy_unchecked(&flipped);

        let scale = F::cast(n_features);
        Ok(Zip::from(&flipped_energy)
            .and(&energy)
            .map_collect(|&after, &before| scale * sigmoid(after - before).ln()))
    }

    /// Checked counterpart of [`Transformer::transform`].
    pub fn try_transform<D: Data<Elem = F>>(
        &self,
        x: &ArrayBase<D, Ix2>,
    ) -> Result<Array2<F>, AnalysisError> {
        self.mean_hidden(x)
    }

    pub(crate) fn hidden_activation<D: Data<Elem = F>>(&self, v: &ArrayBase<D, Ix2>) -> Array2<F> {
        (v.dot(&self.weights) + &self.hidden_bias).mapv_into(sigmoid)
    }

    pub(crate) fn visible_activation<D: Data<Elem = F>>(&self, h: &ArrayBase<D, Ix2>) -> Array2<F> {
        (h.dot(&self.weights.t()) + &self.visible_bias).mapv_into(sigmoid)
    }

    fn free_energy_unchecked<D: Data<Elem = F>>(&self, v: &ArrayBase<D, Ix2>) -> Array1<F> {
        let visible_term = v.dot(&self.visible_bias);
        let hidden_term = (v.dot(&self.weights) + &self.hidden_bias)
            .mapv_into(softplus)
            .sum_axis(Axis(1));
        -(visible_term + hidden_term)
    }
}

impl<F: Float, D: Data<Elem = F>> Transformer<&ArrayBase<D, Ix2>, Array2<F>> for BernoulliRbm<F> {
    /// Hidden activation probabilities, shape `(n_samples, n_components)`.
    ///
    /// # Panics
    /// When `x` does not have `n_visible` columns. Use
    /// [`BernoulliRbm::try_transform`] to get an error instead.
    fn transform(&self, x: &ArrayBase<D, Ix2>) -> Array2<F> {
        self.hidden_activation(x)
    }
}

impl<F: Float, D: Data<Elem = F>, T> Fit<ArrayBase<D, Ix2>, T, AnalysisError>
    for RbmValidParams<F>
{
    type Object = BernoulliRbm<F>;

    /// Fit the RBM with Stochastic Maximum Likelihood (persistent contrastive divergence).
    fn fit(&self, dataset: &DatasetBase<ArrayBase<D, Ix2>, T>) -> Result<Self::Object, AnalysisError> {
        let records = dataset.records();
        let mut trainer = SmlTrainer::new(self.clone(), records.ncols())?;
        trainer.train(records)?;
        Ok(trainer.into_model())
    }
}

impl<F: Float> RbmValidParams<F> {
    /// Fit on `dataset` and return the model with the transformed records.
    pub fn fit_transform<D: Data<Elem = F>, T>(
        &self,
        dataset: &DatasetBase<ArrayBase<D, Ix2>, T>,
    ) -> Result<(BernoulliRbm<F>, Array2<F>), AnalysisError> {
        let model = self.fit(dataset)?;
        let features = model.try_transform(dataset.records())?;
        Ok((model, features))
    }
}

impl<F: Float> RbmParams<F> {
    /// Validate, fit on `dataset` and return the model with the transformed records.
    pub fn fit_transform<D: Data<Elem = F>, T>(
        &self,
        dataset: &DatasetBase<ArrayBase<D, Ix2>, T>,
    ) -> Result<(BernoulliRbm<F>, Array2<F>), AnalysisError> {
        use linfa::ParamGuard;
        self.check_ref()?.fit_transform(dataset)
    }
}
