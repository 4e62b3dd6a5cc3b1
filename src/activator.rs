//! Activation functions.

/// An elementwise [activation
/// function](https://en.wikipedia.org/wiki/Activation_function) and its
/// derivative.
pub trait Activation {
    /// Evaluates `f(z)`.
    fn f(&self, z: f64) -> f64;

    /// Evaluates the derivative `f'(z)` at the weighted input `z` (not at the
    /// activated output).
    fn prime(&self, z: f64) -> f64;
}

/// The logistic sigmoid `1 / (1 + e^-z)`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Sigmoid;

impl Activation for Sigmoid {
    fn f(&self, z: f64) -> f64 {
        1.0 / (1.0 + (-z).exp())
    }

    fn prime(&self, z: f64) -> f64 {
        let y = self.f(z);
        y * (1.0 - y)
    }
}
