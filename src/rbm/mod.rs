//! Bernoulli Restricted Boltzmann Machine trained with Stochastic Maximum Likelihood.
//!
//! [`RbmParams`] holds the hyper-parameters and implements `linfa`'s
//! `Fit`; the resulting [`BernoulliRbm`] implements `Transformer` and
//! exposes the sampling and energy primitives.
mod algorithm;
mod hyperparams;
mod trainer;

pub use algorithm::{sigmoid, BernoulliRbm, SIGMOID_CLAMP};
pub use hyperparams::{RbmParams, RbmValidParams};
pub use trainer::SmlTrainer;
