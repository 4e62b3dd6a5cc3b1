//! A minimal feedforward neural network trained by mini-batch stochastic
//! gradient descent with backpropagation.
//!
//! Most users want [`feed_forward::Network`] together with
//! [`trainer::Trainer`]. `Network` lives in [`feed_forward`], which also
//! re-exports `Trainer`.

pub mod activator;
pub mod cost;
pub mod error;
pub mod feed_forward;
pub mod trainer;

mod layer;
mod utils;

pub use error::{Error, Result};
