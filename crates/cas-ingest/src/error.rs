use cas_store::StoreError;
use cas_types::{Digest, TypeError};
use thiserror::Error;

/// Errors from session operations.
///
/// Every variant names the ref it concerns.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Another writer currently holds the ref.
    #[error("ref {reference} is locked by another writer")]
    Locked { reference: String },

    /// No open session exists for the ref.
    #[error("no open session for ref {reference}")]
    NotFound { reference: String },

    /// The session was committed, aborted, or expired while this writer
    /// still referenced it.
    #[error("session for ref {reference} is closed")]
    Closed { reference: String },

    /// Write offset lies beyond the bytes received so far.
    #[error("offset {offset} for ref {reference} is beyond current offset {current}")]
    OffsetOutOfRange {
        reference: String,
        offset: u64,
        current: u64,
    },

    /// Commit size differs from the declared total.
    #[error("size mismatch for ref {reference}: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        reference: String,
        expected: u64,
        actual: u64,
    },

    /// Commit digest differs from the declared digest.
    #[error("digest mismatch for ref {reference}: expected {expected}, got {actual}")]
    DigestMismatch {
        reference: String,
        expected: Digest,
        actual: Digest,
    },

    /// The committed content is already in the store.
    #[error("content of ref {reference} already exists as {digest}")]
    AlreadyExists { reference: String, digest: Digest },

    /// The ref name is unusable.
    #[error("invalid ref {reference:?}: {reason}")]
    InvalidRef { reference: String, reason: String },

    /// Commit labels failed validation.
    #[error("invalid labels for ref {reference}: {source}")]
    InvalidLabels {
        reference: String,
        #[source]
        source: TypeError,
    },

    /// The blob store failed while committing.
    #[error("store failure committing ref {reference}: {source}")]
    Store {
        reference: String,
        #[source]
        source: StoreError,
    },
}

impl IngestError {
    /// The ref this error concerns.
    pub fn reference(&self) -> &str {
        match self {
            Self::Locked { reference }
            | Self::NotFound { reference }
            | Self::Closed { reference }
            | Self::OffsetOutOfRange { reference, .. }
            | Self::SizeMismatch { reference, .. }
            | Self::DigestMismatch { reference, .. }
            | Self::AlreadyExists { reference, .. }
            | Self::InvalidRef { reference, .. }
            | Self::InvalidLabels { reference, .. }
            | Self::Store { reference, .. } => reference,
        }
    }
}

/// Result alias for session operations.
pub type IngestResult<T> = Result<T, IngestError>;
