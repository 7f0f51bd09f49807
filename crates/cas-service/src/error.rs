use std::fmt;

use cas_ingest::IngestError;
use cas_query::QueryError;
use cas_store::StoreError;
use cas_types::TypeError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Protocol-level error class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Code {
    NotFound,
    AlreadyExists,
    InvalidArgument,
    OutOfRange,
    /// The ref is held by another writer; retry later.
    Unavailable,
    /// A blocking worker was cancelled before it ran, which only happens
    /// while the runtime shuts down. A caller dropping a stream is not an
    /// error: the stream simply ends.
    Cancelled,
    Internal,
}

impl Code {
    pub fn as_str(&self) -> &'static str {
        match self {
            Code::NotFound => "not_found",
            Code::AlreadyExists => "already_exists",
            Code::InvalidArgument => "invalid_argument",
            Code::OutOfRange => "out_of_range",
            Code::Unavailable => "unavailable",
            Code::Cancelled => "cancelled",
            Code::Internal => "internal",
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable machine-readable reasons carried next to a [`Code`].
pub mod reason {
    pub const NOT_FOUND: &str = "not_found";
    pub const ALREADY_EXISTS: &str = "already_exists";
    pub const SIZE_MISMATCH: &str = "size_mismatch";
    pub const DIGEST_MISMATCH: &str = "digest_mismatch";
    pub const LOCKED: &str = "locked";
    pub const OFFSET_OUT_OF_RANGE: &str = "offset_out_of_range";
    pub const LABEL_TOO_LARGE: &str = "label_too_large";
    pub const INVALID_LABEL: &str = "invalid_label";
    pub const IMMUTABLE_FIELD: &str = "immutable_field";
    pub const INVALID_FIELD_PATH: &str = "invalid_field_path";
    pub const MALFORMED_DIGEST: &str = "malformed_digest";
    pub const INVALID_REF: &str = "invalid_ref";
    pub const INVALID_FILTER: &str = "invalid_filter";
    pub const REF_MISMATCH: &str = "ref_mismatch";
    pub const STREAM_CLOSED: &str = "stream_closed";
    pub const SESSION_CLOSED: &str = "session_closed";
    pub const CANCELLED: &str = "cancelled";
    pub const STORAGE: &str = "storage";
}

/// Error returned by every service operation.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize)]
#[error("{code} ({reason}) on {resource:?}: {message}")]
pub struct ServiceError {
    pub code: Code,
    /// Digest or ref the error concerns; empty when there is none.
    pub resource: String,
    pub reason: &'static str,
    pub message: String,
}

impl ServiceError {
    pub fn new(
        code: Code,
        resource: impl Into<String>,
        reason: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            resource: resource.into(),
            reason,
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        let resource = resource.into();
        let message = format!("{resource} not found");
        Self::new(Code::NotFound, resource, reason::NOT_FOUND, message)
    }

    pub fn invalid_argument(
        resource: impl Into<String>,
        reason: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::new(Code::InvalidArgument, resource, reason, message)
    }

    /// See [`Code::Cancelled`].
    pub fn cancelled(resource: impl Into<String>) -> Self {
        Self::new(Code::Cancelled, resource, reason::CANCELLED, "operation cancelled")
    }

    pub fn internal(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Code::Internal, resource, reason::STORAGE, message)
    }
}

fn label_reason(err: &TypeError) -> &'static str {
    match err {
        TypeError::LabelTooLarge { .. } => reason::LABEL_TOO_LARGE,
        _ => reason::INVALID_LABEL,
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        let message = err.to_string();
        match err {
            StoreError::NotFound(d) => Self::new(Code::NotFound, d.to_string(), reason::NOT_FOUND, message),
            StoreError::AlreadyExists(d) => {
                Self::new(Code::AlreadyExists, d.to_string(), reason::ALREADY_EXISTS, message)
            }
            StoreError::HashMismatch { digest, .. } => {
                Self::invalid_argument(digest.to_string(), reason::DIGEST_MISMATCH, message)
            }
            StoreError::ImmutableField { digest, .. } => {
                Self::invalid_argument(digest.to_string(), reason::IMMUTABLE_FIELD, message)
            }
            StoreError::InvalidFieldPath { digest, .. } => {
                Self::invalid_argument(digest.to_string(), reason::INVALID_FIELD_PATH, message)
            }
            StoreError::InvalidLabels { digest, source } => {
                Self::invalid_argument(digest.to_string(), label_reason(&source), message)
            }
            StoreError::Corrupt { digest, .. } => Self::internal(digest.to_string(), message),
            StoreError::Serialization(_) | StoreError::Io(_) => Self::internal("", message),
        }
    }
}

impl From<IngestError> for ServiceError {
    fn from(err: IngestError) -> Self {
        let message = err.to_string();
        match err {
            IngestError::Locked { reference } => {
                Self::new(Code::Unavailable, reference, reason::LOCKED, message)
            }
            IngestError::NotFound { reference } => {
                Self::new(Code::NotFound, reference, reason::NOT_FOUND, message)
            }
            IngestError::Closed { reference } => {
                Self::new(Code::NotFound, reference, reason::SESSION_CLOSED, message)
            }
            IngestError::OffsetOutOfRange { reference, .. } => {
                Self::new(Code::OutOfRange, reference, reason::OFFSET_OUT_OF_RANGE, message)
            }
            IngestError::SizeMismatch { reference, .. } => {
                Self::invalid_argument(reference, reason::SIZE_MISMATCH, message)
            }
            IngestError::DigestMismatch { reference, .. } => {
                Self::invalid_argument(reference, reason::DIGEST_MISMATCH, message)
            }
            IngestError::AlreadyExists { reference, .. } => {
                Self::new(Code::AlreadyExists, reference, reason::ALREADY_EXISTS, message)
            }
            IngestError::InvalidRef { reference, .. } => {
                Self::invalid_argument(reference, reason::INVALID_REF, message)
            }
            IngestError::InvalidLabels { reference, source } => {
                Self::invalid_argument(reference, label_reason(&source), message)
            }
            IngestError::Store { reference, source } => {
                let mut err = Self::from(source);
                if err.resource.is_empty() {
                    err.resource = reference;
                }
                err.message = message;
                err
            }
        }
    }
}

impl From<QueryError> for ServiceError {
    fn from(err: QueryError) -> Self {
        Self::invalid_argument(err.filter(), reason::INVALID_FILTER, err.to_string())
    }
}

impl From<TypeError> for ServiceError {
    fn from(err: TypeError) -> Self {
        let message = err.to_string();
        match err {
            TypeError::MalformedDigest { input, .. } => {
                Self::invalid_argument(input, reason::MALFORMED_DIGEST, message)
            }
            TypeError::UnknownAlgorithm(alg) => {
                Self::invalid_argument(alg, reason::MALFORMED_DIGEST, message)
            }
            TypeError::InvalidLength { .. } => {
                Self::invalid_argument("", reason::MALFORMED_DIGEST, message)
            }
            TypeError::LabelTooLarge { key, .. } => {
                Self::invalid_argument(key, reason::LABEL_TOO_LARGE, message)
            }
            TypeError::EmptyLabelKey => Self::invalid_argument("", reason::INVALID_LABEL, message),
        }
    }
}

/// Result alias for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;
