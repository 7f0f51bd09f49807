use cas_types::{Digest, TypeError};

/// Errors from blob store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested blob was not found.
    #[error("blob not found: {0}")]
    NotFound(Digest),

    /// A blob with this digest is already committed.
    #[error("blob already exists: {0}")]
    AlreadyExists(Digest),

    /// Content hash mismatch (bytes handed to `put` or read back from disk).
    #[error("hash mismatch for {digest}: computed {computed}")]
    HashMismatch { digest: Digest, computed: Digest },

    /// An update tried to change a field fixed at commit.
    #[error("field {field} of {digest} is immutable")]
    ImmutableField { digest: Digest, field: String },

    /// A field mask named a path that does not exist.
    #[error("unknown field path {path:?} for {digest}")]
    InvalidFieldPath { digest: Digest, path: String },

    /// Labels failed validation.
    #[error("invalid labels for {digest}: {source}")]
    InvalidLabels {
        digest: Digest,
        #[source]
        source: TypeError,
    },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored metadata is malformed or disagrees with the blob bytes.
    #[error("corrupt blob {digest}: {reason}")]
    Corrupt { digest: Digest, reason: String },
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
