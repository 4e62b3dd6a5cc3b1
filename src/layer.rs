use crate::error::{Error, Result};

use ndarray::{Array1, Array2, Axis};
use ndarray_rand::rand_distr::StandardNormal;
use ndarray_rand::RandomExt;
use rand::Rng;
use std::ops::AddAssign;

/// A wrapper for a single fully connected layer transition of the network.
///
/// Each neuron's incoming weights are stored as a row, so `weights` has shape
/// `(outputs, inputs)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Layer {
    pub(crate) weights: Array2<f64>,
    pub(crate) biases: Array1<f64>,
}

impl Layer {
    /// Initializes a new, untrained layer with standard normal parameters.
    ///
    /// Arguments:
    ///
    ///  * `inputs` - the number of inputs to this layer.
    ///  * `outputs` - the number of outputs from this layer.
    ///  * `rng` - the source of the initial weights and biases.
    pub fn new<R>(inputs: usize, outputs: usize, rng: &mut R) -> Self
    where
        R: Rng + ?Sized,
    {
        Layer {
            weights: Array2::random_using((outputs, inputs), StandardNormal, rng),
            biases: Array1::random_using(outputs, StandardNormal, rng),
        }
    }

    /// Wraps existing parameters, checking that their shapes agree.
    pub fn from_parts(weights: Array2<f64>, biases: Array1<f64>) -> Result<Self> {
        if weights.nrows() != biases.len() {
            return Err(Error::Configuration(format!(
                "a {}x{} weight matrix needs {} biases, found {}",
                weights.nrows(),
                weights.ncols(),
                weights.nrows(),
                biases.len()
            )));
        }
        if weights.is_empty() {
            return Err(Error::Configuration("layer has no neurons".into()));
        }
        Ok(Layer { weights, biases })
    }

    /// Returns the number of inputs to this layer.
    pub fn input_len(&self) -> usize {
        self.weights.ncols()
    }

    /// Returns the number of outputs from this layer.
    pub fn output_len(&self) -> usize {
        self.weights.nrows()
    }

    /// Computes the weighted input `z = w·a + b`.
    pub fn weighted_input(&self, activation: &Array1<f64>) -> Array1<f64> {
        self.weights.dot(activation) + &self.biases
    }

    /// Carries an error signal back through the weights, computing `wᵀ·δ`.
    pub fn backward(&self, delta: &Array1<f64>) -> Array1<f64> {
        self.weights.t().dot(delta)
    }

    /// Returns an all-zero update shaped like this layer.
    pub fn new_update(&self) -> Update {
        Update {
            weights: Array2::zeros(self.weights.raw_dim()),
            biases: Array1::zeros(self.biases.raw_dim()),
        }
    }

    /// Takes a gradient descent step of size `rate` along `update`.
    pub fn apply_update(&mut self, rate: f64, update: &Update) {
        self.weights.scaled_add(-rate, &update.weights);
        self.biases.scaled_add(-rate, &update.biases);
    }
}

/// The cost gradient with respect to one layer's parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct Update {
    pub(crate) weights: Array2<f64>,
    pub(crate) biases: Array1<f64>,
}

impl Update {
    /// Builds the gradient for a layer from its error signal `delta` and the
    /// activation of the layer below: `∇b = δ` and `∇w = δ·aᵀ`.
    pub fn from_delta(delta: &Array1<f64>, below: &Array1<f64>) -> Self {
        let column = delta.view().insert_axis(Axis(1));
        let row = below.view().insert_axis(Axis(0));
        Update {
            weights: column.dot(&row),
            biases: delta.clone(),
        }
    }
}

impl<'a> AddAssign<&'a Update> for Update {
    fn add_assign(&mut self, other: &Update) {
        self.weights += &other.weights;
        self.biases += &other.biases;
    }
}
