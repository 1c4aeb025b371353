//! Core error types.

use thiserror::Error;

/// Fetch engine errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ormfetch_proto::Error),

    /// The named model is not registered.
    #[error("unknown model: {0}")]
    UnknownModel(String),

    /// A fetched row had no usable primary key.
    #[error("row of model {model} has no primary key")]
    MissingPrimaryKey {
        /// Model name.
        model: String,
    },

    /// Invalid data format.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Index past the end of a result list.
    #[error("index {index} out of range for result list of length {len}")]
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// List length.
        len: usize,
    },

    /// Structural mutation of a read-only result list.
    #[error("result list is read-only: {0} is not supported")]
    ReadOnly(&'static str),
}
