use std::io::{Read, Seek};

use bytes::Bytes;
use cas_types::{Digest, Labels};

use crate::error::StoreResult;
use crate::info::{BlobInfo, BlobUpdate, FieldMask};

/// Seekable byte source.
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek> ReadSeek for T {}

/// Reader over the bytes of one committed blob.
pub type BlobReader = Box<dyn ReadSeek + Send>;

/// Lazy listing of committed blobs.
///
/// Items are produced on demand; blobs deleted while the iterator is alive
/// are skipped rather than reported.
pub type BlobIter = Box<dyn Iterator<Item = StoreResult<BlobInfo>> + Send>;

/// A committed blob opened for reading.
pub struct OpenBlob {
    pub info: BlobInfo,
    pub reader: BlobReader,
}

impl std::fmt::Debug for OpenBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenBlob").field("info", &self.info).finish_non_exhaustive()
    }
}

/// Content-addressed blob store.
///
/// All implementations must satisfy these invariants:
/// - A [`BlobInfo`] exists iff its bytes are committed; both become visible
///   in one step.
/// - `digest` and `size` never change after commit.
/// - `put` is compare-and-swap: it never overwrites an existing digest.
/// - `put` and `delete` on the same digest are serialized.
/// - Concurrent reads are always safe.
/// - All I/O errors are propagated, never silently ignored.
pub trait BlobStore: Send + Sync {
    /// Look up metadata for a blob.
    ///
    /// Returns `Ok(None)` if the blob does not exist.
    fn info(&self, digest: &Digest) -> StoreResult<Option<BlobInfo>>;

    /// Apply a partial update under a field mask. Only labels are mutable.
    ///
    /// Fails with `NotFound` for unknown digests.
    fn update(&self, digest: &Digest, update: &BlobUpdate, mask: &FieldMask) -> StoreResult<BlobInfo>;

    /// Lazily enumerate all committed blobs.
    ///
    /// Ordering is unspecified but stable within one iterator.
    fn list(&self) -> StoreResult<BlobIter>;

    /// Delete a blob. Returns `true` if the blob existed.
    fn delete(&self, digest: &Digest) -> StoreResult<bool>;

    /// Open a blob for reading.
    ///
    /// Returns `Ok(None)` if the blob does not exist.
    fn open(&self, digest: &Digest) -> StoreResult<Option<OpenBlob>>;

    /// Commit bytes under `digest`.
    ///
    /// The bytes are hashed and checked against `digest` before anything
    /// becomes visible. Fails with `AlreadyExists` if the digest is present.
    fn put(&self, digest: &Digest, data: Bytes, labels: Labels) -> StoreResult<BlobInfo>;

    /// Check whether a blob exists.
    fn exists(&self, digest: &Digest) -> StoreResult<bool> {
        Ok(self.info(digest)?.is_some())
    }
}
