use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, RwLock};

use bytes::Bytes;
use cas_crypto::ContentHasher;
use cas_types::{validate_labels, Digest, Labels};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::info::{apply_update, BlobInfo, BlobUpdate, FieldMask};
use crate::traits::{BlobIter, BlobStore, OpenBlob};

#[derive(Clone)]
struct Entry {
    info: BlobInfo,
    data: Bytes,
}

type EntryMap = HashMap<Digest, Entry>;

/// In-memory, HashMap-based blob store.
///
/// Intended for tests and embedding. Entries live behind one `RwLock`, which
/// makes put/delete of any digest mutually exclusive. Blob bytes are shared
/// `Bytes`, so readers never copy them.
pub struct InMemoryBlobStore {
    entries: Arc<RwLock<EntryMap>>,
}

impl InMemoryBlobStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of blobs currently stored.
    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().expect("lock poisoned").is_empty()
    }

    /// Total bytes across all stored blobs.
    pub fn total_bytes(&self) -> u64 {
        self.entries
            .read()
            .expect("lock poisoned")
            .values()
            .map(|e| e.info.size)
            .sum()
    }
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobStore for InMemoryBlobStore {
    fn info(&self, digest: &Digest) -> StoreResult<Option<BlobInfo>> {
        let map = self.entries.read().expect("lock poisoned");
        Ok(map.get(digest).map(|e| e.info.clone()))
    }

    fn update(&self, digest: &Digest, update: &BlobUpdate, mask: &FieldMask) -> StoreResult<BlobInfo> {
        let mut map = self.entries.write().expect("lock poisoned");
        let entry = map.get_mut(digest).ok_or(StoreError::NotFound(*digest))?;
        let next = apply_update(&entry.info, update, mask)?;
        entry.info = next.clone();
        Ok(next)
    }

    fn list(&self) -> StoreResult<BlobIter> {
        // Snapshot the keys only; records are resolved as the caller pulls.
        let mut keys: Vec<Digest> = self
            .entries
            .read()
            .expect("lock poisoned")
            .keys()
            .copied()
            .collect();
        keys.sort();

        let entries = Arc::clone(&self.entries);
        let iter = keys.into_iter().filter_map(move |digest| {
            let map = entries.read().expect("lock poisoned");
            map.get(&digest).map(|e| Ok(e.info.clone()))
        });
        Ok(Box::new(iter))
    }

    fn delete(&self, digest: &Digest) -> StoreResult<bool> {
        let mut map = self.entries.write().expect("lock poisoned");
        Ok(map.remove(digest).is_some())
    }

    fn open(&self, digest: &Digest) -> StoreResult<Option<OpenBlob>> {
        let map = self.entries.read().expect("lock poisoned");
        Ok(map.get(digest).map(|e| OpenBlob {
            info: e.info.clone(),
            reader: Box::new(Cursor::new(e.data.clone())),
        }))
    }

    fn put(&self, digest: &Digest, data: Bytes, labels: Labels) -> StoreResult<BlobInfo> {
        validate_labels(&labels)
            .map_err(|source| StoreError::InvalidLabels { digest: *digest, source })?;
        if !ContentHasher::verify(&data, digest) {
            return Err(StoreError::HashMismatch {
                digest: *digest,
                computed: ContentHasher::new(digest.algorithm()).hash(&data),
            });
        }

        let mut map = self.entries.write().expect("lock poisoned");
        if map.contains_key(digest) {
            return Err(StoreError::AlreadyExists(*digest));
        }
        let info = BlobInfo::new(*digest, data.len() as u64, labels);
        map.insert(*digest, Entry { info: info.clone(), data });
        debug!(%digest, size = info.size, "blob committed");
        Ok(info)
    }
}

impl std::fmt::Debug for InMemoryBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.len();
        f.debug_struct("InMemoryBlobStore")
            .field("blob_count", &count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Seek, SeekFrom};

    fn put_bytes(store: &InMemoryBlobStore, data: &'static [u8]) -> BlobInfo {
        let digest = ContentHasher::SHA256.hash(data);
        store.put(&digest, Bytes::from_static(data), Labels::new()).unwrap()
    }

    // -----------------------------------------------------------------------
    // Core CRUD
    // -----------------------------------------------------------------------

    #[test]
    fn put_and_info() {
        let store = InMemoryBlobStore::new();
        let info = put_bytes(&store, b"hello world");
        assert_eq!(info.size, 11);
        assert_eq!(info.created_at, info.updated_at);

        let read_back = store.info(&info.digest).unwrap().expect("should exist");
        assert_eq!(read_back, info);
    }

    #[test]
    fn open_reads_committed_bytes() {
        let store = InMemoryBlobStore::new();
        let info = put_bytes(&store, b"0123456789");
        let mut blob = store.open(&info.digest).unwrap().expect("should exist");
        blob.reader.seek(SeekFrom::Start(4)).unwrap();
        let mut out = String::new();
        blob.reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "456789");
        assert_eq!(blob.info.size, 10);
    }

    #[test]
    fn info_missing_returns_none() {
        let store = InMemoryBlobStore::new();
        let digest = ContentHasher::SHA256.hash(b"missing");
        assert!(store.info(&digest).unwrap().is_none());
        assert!(store.open(&digest).unwrap().is_none());
        assert!(!store.exists(&digest).unwrap());
    }

    // -----------------------------------------------------------------------
    // Content-addressing correctness
    // -----------------------------------------------------------------------

    #[test]
    fn duplicate_put_is_rejected() {
        let store = InMemoryBlobStore::new();
        let info = put_bytes(&store, b"identical content");
        let err = store
            .put(&info.digest, Bytes::from_static(b"identical content"), Labels::new())
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(d) if d == info.digest));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn put_with_wrong_digest_is_rejected() {
        let store = InMemoryBlobStore::new();
        let digest = ContentHasher::SHA256.hash(b"claimed");
        let err = store.put(&digest, Bytes::from_static(b"actual"), Labels::new()).unwrap_err();
        assert!(matches!(err, StoreError::HashMismatch { .. }));
        assert!(store.is_empty());
    }

    #[test]
    fn put_rejects_oversized_labels() {
        let store = InMemoryBlobStore::new();
        let digest = ContentHasher::SHA256.hash(b"x");
        let mut labels = Labels::new();
        labels.insert("k".into(), "v".repeat(5000));
        let err = store.put(&digest, Bytes::from_static(b"x"), labels).unwrap_err();
        assert!(matches!(err, StoreError::InvalidLabels { .. }));
    }

    // -----------------------------------------------------------------------
    // Update / Delete
    // -----------------------------------------------------------------------

    #[test]
    fn update_labels_roundtrip() {
        let store = InMemoryBlobStore::new();
        let info = put_bytes(&store, b"labelled");
        let mut labels = Labels::new();
        labels.insert("k".into(), "v".into());

        store
            .update(&info.digest, &BlobUpdate::labels(labels), &FieldMask::empty())
            .unwrap();

        let after = store.info(&info.digest).unwrap().unwrap();
        assert_eq!(after.labels.get("k").map(String::as_str), Some("v"));
        assert_eq!(after.created_at, info.created_at);
        assert!(after.updated_at > info.updated_at);
    }

    #[test]
    fn update_missing_is_not_found() {
        let store = InMemoryBlobStore::new();
        let digest = ContentHasher::SHA256.hash(b"nope");
        let err = store
            .update(&digest, &BlobUpdate::default(), &FieldMask::empty())
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn delete_present_and_missing() {
        let store = InMemoryBlobStore::new();
        let info = put_bytes(&store, b"to-delete");
        assert!(store.delete(&info.digest).unwrap());
        assert!(!store.exists(&info.digest).unwrap());
        assert!(!store.delete(&info.digest).unwrap());
    }

    #[test]
    fn put_after_delete_succeeds() {
        let store = InMemoryBlobStore::new();
        let info = put_bytes(&store, b"again");
        store.delete(&info.digest).unwrap();
        put_bytes(&store, b"again");
        assert_eq!(store.len(), 1);
    }

    // -----------------------------------------------------------------------
    // Listing
    // -----------------------------------------------------------------------

    #[test]
    fn list_yields_every_blob() {
        let store = InMemoryBlobStore::new();
        put_bytes(&store, b"aaa");
        put_bytes(&store, b"bbb");
        put_bytes(&store, b"ccc");
        let listed: Vec<BlobInfo> = store.list().unwrap().collect::<StoreResult<_>>().unwrap();
        assert_eq!(listed.len(), 3);
        assert_eq!(store.total_bytes(), 9);
    }

    #[test]
    fn list_skips_blobs_deleted_mid_iteration() {
        let store = InMemoryBlobStore::new();
        let a = put_bytes(&store, b"aaa");
        let b = put_bytes(&store, b"bbb");
        let mut iter = store.list().unwrap();
        let first = iter.next().unwrap().unwrap();
        let other = if first.digest == a.digest { b.digest } else { a.digest };
        store.delete(&other).unwrap();
        assert!(iter.next().is_none());
    }

    #[test]
    fn list_does_not_see_later_puts() {
        let store = InMemoryBlobStore::new();
        put_bytes(&store, b"before");
        let iter = store.list().unwrap();
        put_bytes(&store, b"after");
        assert_eq!(iter.count(), 1);
    }

    // -----------------------------------------------------------------------
    // Concurrency
    // -----------------------------------------------------------------------

    #[test]
    fn concurrent_puts_of_same_digest_commit_once() {
        use std::thread;

        let store = Arc::new(InMemoryBlobStore::new());
        let digest = ContentHasher::SHA256.hash(b"race");
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.put(&digest, Bytes::from_static(b"race"), Labels::new()).is_ok())
            })
            .collect();
        let wins = handles
            .into_iter()
            .map(|h| h.join().expect("thread should not panic"))
            .filter(|ok| *ok)
            .count();
        assert_eq!(wins, 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn debug_format() {
        let store = InMemoryBlobStore::new();
        put_bytes(&store, b"x");
        let debug = format!("{store:?}");
        assert!(debug.contains("InMemoryBlobStore"));
        assert!(debug.contains("blob_count"));
    }
}
