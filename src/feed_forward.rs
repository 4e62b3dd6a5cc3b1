//! A [Feedforward neural network]
//! (https://en.wikipedia.org/wiki/Feedforward_neural_network).
//!
//! # Example
//!
//! Let's train a small network on the XOR function:
//!
//! ```
//! # use backprop::feed_forward::*;
//! # use ndarray::array;
//! # use rand::{rngs::StdRng, SeedableRng};
//! // Create examples of the XOR function
//! let mut examples = vec![
//!     (array![0.0, 0.0], array![0.0]),
//!     (array![0.0, 1.0], array![1.0]),
//!     (array![1.0, 0.0], array![1.0]),
//!     (array![1.0, 1.0], array![0.0]),
//! ];
//!
//! // Build a network with a hidden layer of three neurons
//! let mut network = Network::with_rng(&[2, 3, 1], &mut StdRng::seed_from_u64(7))?;
//!
//! // Train it using mini-batches of two examples
//! Trainer::new(Hyperparameters::default())
//!     .epochs(100)
//!     .mini_batch_size(2)
//!     .learning_rate(3.0)
//!     .seed(7)
//!     .logging(Logging::Silent)
//!     .train(&mut network, &mut examples, None)?;
//!
//! let output = network.feed_forward(&array![1.0, 0.0])?;
//! assert_eq!(output.len(), 1);
//! # Ok::<(), backprop::Error>(())
//! ```

pub use crate::activator::{Activation, Sigmoid};
pub use crate::cost::{Cost, Quadratic};
pub use crate::trainer::{
    Classifier, EpochReport, Hyperparameters, Logging, Observer, Score, Trainable, Trainer,
};

use crate::error::{check_len, Error, Result};
use crate::layer::{Layer, Update};
use crate::utils::{argmax, Back, Front};

use itertools::Itertools;
use ndarray::{Array1, Array2};
use rand::Rng;
use std::fmt;
use std::ops::Add;
use tracing::debug;

/// A feedforward neural network.
///
/// The activation function `A` and the cost function `C` are strategies
/// fixed at construction, defaulting to the sigmoid and the quadratic cost.
#[derive(Clone, Debug, PartialEq)]
pub struct Network<A = Sigmoid, C = Quadratic> {
    sizes: Vec<usize>,
    layers: Vec<Layer>,
    activation: A,
    cost: C,
}

impl Network {
    /// Creates a new, untrained neural network with randomly initialized
    /// parameters.
    ///
    /// Arguments:
    ///  * `sizes` - the number of neurons in each layer, starting with the
    ///              input layer. Must contain at least an input and an output
    ///              layer, none of them empty.
    pub fn new(sizes: &[usize]) -> Result<Self> {
        Self::with_rng(sizes, &mut rand::thread_rng())
    }

    /// Like [`Network::new`], drawing the initial parameters from `rng`.
    pub fn with_rng<R>(sizes: &[usize], rng: &mut R) -> Result<Self>
    where
        R: Rng + ?Sized,
    {
        validate_sizes(sizes)?;
        let layers = sizes
            .iter()
            .tuple_windows()
            .map(|(&inputs, &outputs)| Layer::new(inputs, outputs, &mut *rng))
            .collect();
        debug!(?sizes, "initialized network");
        Ok(Network {
            sizes: sizes.into(),
            layers,
            activation: Sigmoid,
            cost: Quadratic,
        })
    }

    /// Creates a network from explicit parameters.
    ///
    /// `weights[i]` must have shape `(sizes[i + 1], sizes[i])` and
    /// `biases[i]` length `sizes[i + 1]`, with consecutive layers agreeing on
    /// their shared size.
    pub fn from_parameters(weights: Vec<Array2<f64>>, biases: Vec<Array1<f64>>) -> Result<Self> {
        if weights.is_empty() || weights.len() != biases.len() {
            return Err(Error::Configuration(format!(
                "expected matching, non-empty weight and bias lists, found {} and {}",
                weights.len(),
                biases.len()
            )));
        }
        let layers = weights
            .into_iter()
            .zip(biases)
            .map(|(w, b)| Layer::from_parts(w, b))
            .collect::<Result<Vec<_>>>()?;
        for (i, (below, above)) in layers.iter().tuple_windows().enumerate() {
            if below.output_len() != above.input_len() {
                return Err(Error::Configuration(format!(
                    "layer {} has {} outputs but layer {} takes {} inputs",
                    i,
                    below.output_len(),
                    i + 1,
                    above.input_len()
                )));
            }
        }
        let mut sizes = vec![layers.front().input_len()];
        sizes.extend(layers.iter().map(Layer::output_len));
        Ok(Network {
            sizes,
            layers,
            activation: Sigmoid,
            cost: Quadratic,
        })
    }
}

impl<A, C> Network<A, C> {
    /// Replaces the activation function used by every layer.
    pub fn with_activation<B: Activation>(self, activation: B) -> Network<B, C> {
        Network {
            sizes: self.sizes,
            layers: self.layers,
            activation,
            cost: self.cost,
        }
    }

    /// Replaces the cost function minimized during training.
    pub fn with_cost<D: Cost>(self, cost: D) -> Network<A, D> {
        Network {
            sizes: self.sizes,
            layers: self.layers,
            activation: self.activation,
            cost,
        }
    }

    /// Returns the number of neurons in each layer, input layer first.
    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    /// Returns the size of the input layer to the network.
    pub fn input_len(&self) -> usize {
        *self.sizes.front()
    }

    /// Returns the size of the output layer from the network.
    pub fn output_len(&self) -> usize {
        *self.sizes.back()
    }

    /// Returns the weight matrix of every layer transition, in order.
    pub fn weights(&self) -> impl Iterator<Item = &Array2<f64>> {
        self.layers.iter().map(|l| &l.weights)
    }

    /// Returns the bias vector of every non-input layer, in order.
    pub fn biases(&self) -> impl Iterator<Item = &Array1<f64>> {
        self.layers.iter().map(|l| &l.biases)
    }
}

impl<A: Activation, C: Cost> Network<A, C> {
    /// Feeds the provided `input` through the network, returning the output
    /// layer.
    pub fn feed_forward(&self, input: &Array1<f64>) -> Result<Array1<f64>> {
        check_len(self.input_len(), input.len())?;
        Ok(self.layers.iter().fold(input.clone(), |a, layer| {
            self.activate(&layer.weighted_input(&a))
        }))
    }

    /// Trains the network using mini-batch stochastic gradient descent,
    /// logging progress after every epoch.
    ///
    /// `training_data` is shuffled in place. If `test_data` is provided, the
    /// number of correctly classified test examples is logged after each
    /// epoch. See [`Trainer`] for finer control.
    pub fn sgd(
        &mut self,
        training_data: &mut [(Array1<f64>, Array1<f64>)],
        epochs: usize,
        mini_batch_size: usize,
        eta: f64,
        test_data: Option<&[(Array1<f64>, usize)]>,
    ) -> Result<()> {
        Trainer::new(Hyperparameters {
            epochs,
            mini_batch_size,
            learning_rate: eta,
            seed: None,
        })
        .logging(Logging::Epochs(1))
        .train(self, training_data, test_data)
    }

    /// Returns the cost of the network's prediction for `input` against
    /// `target`.
    pub fn cost(&self, input: &Array1<f64>, target: &Array1<f64>) -> Result<f64> {
        check_len(self.output_len(), target.len())?;
        Ok(self.cost.cost(&self.feed_forward(input)?, target))
    }

    /// Returns the partial derivatives of the cost with respect to each
    /// output activation.
    pub fn cost_derivative(&self, output: &Array1<f64>, target: &Array1<f64>) -> Array1<f64> {
        self.cost.derivative(output, target)
    }

    /// Feeds `input` forward, keeping every layer's weighted input and
    /// activation.
    fn trace(&self, input: &Array1<f64>) -> Trace {
        let mut activations = Vec::with_capacity(self.layers.len() + 1);
        let mut weighted_inputs = Vec::with_capacity(self.layers.len());
        activations.push(input.clone());
        for layer in &self.layers {
            let z = layer.weighted_input(activations.back());
            activations.push(self.activate(&z));
            weighted_inputs.push(z);
        }
        Trace {
            activations,
            weighted_inputs,
        }
    }

    fn activate(&self, z: &Array1<f64>) -> Array1<f64> {
        z.mapv(|z| self.activation.f(z))
    }

    fn activate_prime(&self, z: &Array1<f64>) -> Array1<f64> {
        z.mapv(|z| self.activation.prime(z))
    }
}

impl<A, C> fmt::Display for Network<A, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Network {:?}", self.sizes)
    }
}

/// The activations and weighted inputs of every layer from one forward pass.
struct Trace {
    /// Starts with the input itself.
    activations: Vec<Array1<f64>>,
    weighted_inputs: Vec<Array1<f64>>,
}

/// The cost gradient with respect to every weight and bias of a network.
#[derive(Clone, Debug, PartialEq)]
pub struct Gradient {
    layers: Vec<Update>,
}

impl Gradient {
    /// Returns the gradient of every weight matrix, in layer order.
    pub fn weights(&self) -> impl Iterator<Item = &Array2<f64>> {
        self.layers.iter().map(|u| &u.weights)
    }

    /// Returns the gradient of every bias vector, in layer order.
    pub fn biases(&self) -> impl Iterator<Item = &Array1<f64>> {
        self.layers.iter().map(|u| &u.biases)
    }
}

impl Add for Gradient {
    type Output = Gradient;

    fn add(mut self, other: Gradient) -> Gradient {
        for (l, r) in self.layers.iter_mut().zip(&other.layers) {
            *l += r;
        }
        self
    }
}

impl<A: Activation, C: Cost> Trainable for Network<A, C> {
    type Input = Array1<f64>;
    type Target = Array1<f64>;
    type Update = Gradient;

    fn new_update(&self) -> Gradient {
        Gradient {
            layers: self.layers.iter().map(Layer::new_update).collect(),
        }
    }

    fn backprop(&self, input: &Array1<f64>, target: &Array1<f64>) -> Result<Gradient> {
        self.check_input(input)?;
        self.check_target(target)?;

        let Trace {
            activations,
            weighted_inputs,
        } = self.trace(input);

        let last = self.layers.len() - 1;
        let mut delta = self.cost_derivative(activations.back(), target)
            * self.activate_prime(&weighted_inputs[last]);
        let mut layers = Vec::with_capacity(self.layers.len());
        layers.push(Update::from_delta(&delta, &activations[last]));

        for l in (0..last).rev() {
            delta = self.layers[l + 1].backward(&delta) * self.activate_prime(&weighted_inputs[l]);
            layers.push(Update::from_delta(&delta, &activations[l]));
        }
        layers.reverse();

        Ok(Gradient { layers })
    }

    fn apply_update(&mut self, rate: f64, update: &Gradient) {
        for (layer, u) in self.layers.iter_mut().zip(&update.layers) {
            layer.apply_update(rate, u);
        }
    }

    fn check_input(&self, input: &Array1<f64>) -> Result<()> {
        check_len(self.input_len(), input.len())
    }

    fn check_target(&self, target: &Array1<f64>) -> Result<()> {
        check_len(self.output_len(), target.len())
    }
}

impl<A: Activation, C: Cost> Classifier for Network<A, C> {
    fn classify(&self, input: &Array1<f64>) -> Result<usize> {
        let output = self.feed_forward(input)?;
        argmax(&output).ok_or_else(|| Error::Configuration("network has no outputs".into()))
    }
}

/// Verifies that `sizes` describes a network with at least one layer
/// transition and no empty layers.
fn validate_sizes(sizes: &[usize]) -> Result<()> {
    if sizes.len() < 2 {
        return Err(Error::Configuration(format!(
            "need at least an input and an output layer, found {} layer(s)",
            sizes.len()
        )));
    }
    if let Some(i) = sizes.iter().position(|&size| size == 0) {
        return Err(Error::Configuration(format!("layer {} has no neurons", i)));
    }
    Ok(())
}
