use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use cas_crypto::ContentHasher;
use cas_types::{validate_labels, Digest, DigestAlgorithm, Labels};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::info::{apply_update, BlobInfo, BlobUpdate, FieldMask};
use crate::locks::DigestLocks;
use crate::traits::{BlobIter, BlobStore, OpenBlob};

const LOCK_STRIPES: usize = 64;

/// Filesystem-backed blob store.
///
/// Layout under `root`:
///
/// ```text
/// blobs/<algorithm>/<hex>       blob bytes
/// meta/<algorithm>/<hex>.json   BlobInfo record
/// tmp/                          staging area for atomic renames
/// ```
///
/// The metadata file is the commit marker: bytes are persisted first, then
/// the record is renamed into place. Delete removes the record first, so a
/// blob disappears in one step from every reader's point of view.
pub struct FsBlobStore {
    paths: Arc<Paths>,
    locks: DigestLocks,
}

struct Paths {
    root: PathBuf,
}

impl Paths {
    fn blob(&self, digest: &Digest) -> PathBuf {
        self.root
            .join("blobs")
            .join(digest.algorithm().name())
            .join(digest.to_hex())
    }

    fn meta_dir(&self, algorithm: DigestAlgorithm) -> PathBuf {
        self.root.join("meta").join(algorithm.name())
    }

    fn meta(&self, digest: &Digest) -> PathBuf {
        self.meta_dir(digest.algorithm())
            .join(format!("{}.json", digest.to_hex()))
    }

    fn tmp(&self) -> PathBuf {
        self.root.join("tmp")
    }
}

impl FsBlobStore {
    /// Open (or create) a store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let paths = Paths {
            root: root.as_ref().to_path_buf(),
        };
        for alg in DigestAlgorithm::ALL {
            fs::create_dir_all(paths.root.join("blobs").join(alg.name()))?;
            fs::create_dir_all(paths.meta_dir(alg))?;
        }
        fs::create_dir_all(paths.tmp())?;
        debug!(root = %paths.root.display(), "opened filesystem blob store");
        Ok(Self {
            paths: Arc::new(paths),
            locks: DigestLocks::new(LOCK_STRIPES),
        })
    }

    /// Root directory of this store.
    pub fn root(&self) -> &Path {
        &self.paths.root
    }

    fn write_atomic(&self, target: &Path, data: &[u8]) -> StoreResult<()> {
        let mut tmp = NamedTempFile::new_in(self.paths.tmp())?;
        tmp.write_all(data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(target).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }

    fn write_meta(&self, info: &BlobInfo) -> StoreResult<()> {
        let json = serde_json::to_vec_pretty(info)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.write_atomic(&self.paths.meta(&info.digest), &json)
    }
}

fn read_meta(path: &Path, digest: &Digest) -> StoreResult<Option<BlobInfo>> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let info: BlobInfo =
        serde_json::from_slice(&data).map_err(|e| StoreError::Serialization(e.to_string()))?;
    if info.digest != *digest {
        return Err(StoreError::Corrupt {
            digest: *digest,
            reason: format!("metadata names {}", info.digest),
        });
    }
    Ok(Some(info))
}

fn remove_if_present(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

fn digest_from_meta_name(algorithm: DigestAlgorithm, name: &str) -> Option<Digest> {
    let hex = name.strip_suffix(".json")?;
    Digest::parse(&format!("{algorithm}:{hex}")).ok()
}

impl BlobStore for FsBlobStore {
    fn info(&self, digest: &Digest) -> StoreResult<Option<BlobInfo>> {
        read_meta(&self.paths.meta(digest), digest)
    }

    fn update(&self, digest: &Digest, update: &BlobUpdate, mask: &FieldMask) -> StoreResult<BlobInfo> {
        let _guard = self.locks.lock(digest);
        let current = read_meta(&self.paths.meta(digest), digest)?
            .ok_or(StoreError::NotFound(*digest))?;
        let next = apply_update(&current, update, mask)?;
        self.write_meta(&next)?;
        Ok(next)
    }

    fn list(&self) -> StoreResult<BlobIter> {
        let mut dirs = Vec::new();
        for alg in DigestAlgorithm::ALL {
            dirs.push((alg, fs::read_dir(self.paths.meta_dir(alg))?));
        }

        let paths = Arc::clone(&self.paths);
        let iter = dirs.into_iter().flat_map(move |(alg, entries)| {
            let paths = Arc::clone(&paths);
            entries.filter_map(move |entry| {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => return Some(Err(StoreError::Io(e))),
                };
                let name = entry.file_name();
                let Some(digest) = name.to_str().and_then(|n| digest_from_meta_name(alg, n)) else {
                    warn!(path = %entry.path().display(), "ignoring stray file in metadata directory");
                    return None;
                };
                read_meta(&paths.meta(&digest), &digest).transpose()
            })
        });
        Ok(Box::new(iter))
    }

    fn delete(&self, digest: &Digest) -> StoreResult<bool> {
        let _guard = self.locks.lock(digest);
        if !remove_if_present(&self.paths.meta(digest))? {
            return Ok(false);
        }
        remove_if_present(&self.paths.blob(digest))?;
        debug!(%digest, "blob deleted");
        Ok(true)
    }

    fn open(&self, digest: &Digest) -> StoreResult<Option<OpenBlob>> {
        let Some(info) = self.info(digest)? else {
            return Ok(None);
        };
        let file = match File::open(self.paths.blob(digest)) {
            Ok(file) => file,
            // Deleted between reading the record and opening the bytes.
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let on_disk = file.metadata()?.len();
        if on_disk != info.size {
            return Err(StoreError::Corrupt {
                digest: *digest,
                reason: format!("record says {} bytes, file has {on_disk}", info.size),
            });
        }
        Ok(Some(OpenBlob {
            info,
            reader: Box::new(file),
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

        let _guard = self.locks.lock(digest);
        if self.paths.meta(digest).exists() {
            return Err(StoreError::AlreadyExists(*digest));
        }
        self.write_atomic(&self.paths.blob(digest), &data)?;
        let info = BlobInfo::new(*digest, data.len() as u64, labels);
        self.write_meta(&info)?;
        debug!(%digest, size = info.size, "blob committed");
        Ok(info)
    }
}

impl std::fmt::Debug for FsBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsBlobStore")
            .field("root", &self.paths.root)
            .finish()
    }
}
