use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("malformed digest {input:?}: {reason}")]
    MalformedDigest { input: String, reason: String },

    #[error("unsupported digest algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("label {key:?} is {size} bytes, exceeds {max}")]
    LabelTooLarge { key: String, size: usize, max: usize },

    #[error("label key must not be empty")]
    EmptyLabelKey,
}
