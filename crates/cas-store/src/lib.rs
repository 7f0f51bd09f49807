//! Content-addressed blob storage.
//!
//! A blob is an immutable byte sequence identified by its [`Digest`]. Next to
//! the bytes every blob carries a [`BlobInfo`] record: size and creation time
//! fixed at commit, plus labels and an update time that may change later.
//!
//! # Storage Backends
//!
//! All backends implement the [`BlobStore`] trait:
//!
//! - [`InMemoryBlobStore`] -- `HashMap`-based store for tests and embedding
//! - [`FsBlobStore`] -- one file per blob plus a JSON metadata sidecar
//!
//! # Design Rules
//!
//! 1. Blob bytes, digest, and size are immutable once committed.
//! 2. Commit is compare-and-swap: a digest that already exists is rejected.
//! 3. Bytes and metadata become visible together or not at all.
//! 4. Concurrent reads are always safe (bytes are immutable).
//! 5. Put and delete of the same digest are serialized.
//! 6. All I/O errors are propagated, never silently ignored.
//!
//! [`Digest`]: cas_types::Digest

pub mod error;
pub mod fs;
pub mod info;
mod locks;
pub mod memory;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use error::{StoreError, StoreResult};
pub use fs::FsBlobStore;
pub use info::{BlobInfo, BlobUpdate, FieldMask};
pub use memory::InMemoryBlobStore;
pub use traits::{BlobIter, BlobReader, BlobStore, OpenBlob, ReadSeek};
