//! Foundation types for the content store.
//!
//! Every other `cas-*` crate depends on `cas-types`.
//!
//! # Key Types
//!
//! - [`Digest`] - Content identifier of the form `<algorithm>:<hex>`
//! - [`DigestAlgorithm`] - The hash function a digest was produced with
//! - [`Labels`] - Mutable string-to-string metadata attached to blobs
//! - [`TypeError`] - Parse and validation failures for the above

pub mod digest;
pub mod error;
pub mod labels;

pub use digest::{Digest, DigestAlgorithm};
pub use error::TypeError;
pub use labels::{validate_label, validate_labels, Labels, MAX_LABEL_PAIR_SIZE};
