//! Error types.

/// Errors raised by invalid caller input.
///
/// None of these are recoverable by retrying: they all describe a network,
/// dataset or hyperparameter that doesn't fit together.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The layer sizes or explicit parameters don't describe a valid network.
    #[error("invalid network configuration: {0}")]
    Configuration(String),
    /// A vector's length doesn't match the layer it's fed to.
    #[error("expected a vector of length {expected}, found length {found}")]
    DimensionMismatch { expected: usize, found: usize },
    /// A training argument is out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Fails with `DimensionMismatch` unless `found == expected`.
pub(crate) fn check_len(expected: usize, found: usize) -> Result<()> {
    if expected == found {
        Ok(())
    } else {
        Err(Error::DimensionMismatch { expected, found })
    }
}
