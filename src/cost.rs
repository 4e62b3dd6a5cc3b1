//! Cost functions.

use ndarray::Array1;

/// A cost function comparing the network output to the expected target.
pub trait Cost {
    /// Returns the cost of producing `output` when `target` was expected.
    fn cost(&self, output: &Array1<f64>, target: &Array1<f64>) -> f64;

    /// Returns the partial derivatives of the cost with respect to each
    /// component of `output`.
    fn derivative(&self, output: &Array1<f64>, target: &Array1<f64>) -> Array1<f64>;
}

/// The quadratic cost `½‖a - y‖²`, whose derivative is simply `a - y`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Quadratic;

impl Cost for Quadratic {
    fn cost(&self, output: &Array1<f64>, target: &Array1<f64>) -> f64 {
        let diff = output - target;
        0.5 * diff.dot(&diff)
    }

    fn derivative(&self, output: &Array1<f64>, target: &Array1<f64>) -> Array1<f64> {
        output - target
    }
}
