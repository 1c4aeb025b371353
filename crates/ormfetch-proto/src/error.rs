//! Protocol error types.

use thiserror::Error;

/// Errors raised while building or decoding fetch descriptions.
#[derive(Debug, Error)]
pub enum Error {
    /// A set comparison was given no values.
    #[error("set comparison requires at least one value")]
    EmptyValueSet,

    /// Serialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}
