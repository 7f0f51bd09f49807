//! The session table and per-ref writer locks.
//!
//! Lock order: the table lock and a session's state lock are never held at
//! the same time. The `held` flag on each slot is an atomic so acquiring a
//! ref only needs the table lock.
//!
//! `closed` only flips under the state lock, and only once: commit, abort
//! and expiry each check it there first, so exactly one of them ends a
//! session. A closed slot may linger in the table until its closer removes
//! it; `acquire` replaces such a slot instead of attaching to it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::{Duration, Instant};

use cas_store::{BlobInfo, BlobStore, StoreError};
use cas_types::{validate_labels, Digest, Labels};
use tracing::{debug, info, warn};

use crate::config::IngestConfig;
use crate::error::{IngestError, IngestResult};
use crate::session::{Session, SessionStatus, WriteProgress};

/// One table entry. Replaced, never reused, once closed.
struct Slot {
    reference: String,
    held: AtomicBool,
    closed: AtomicBool,
    session: Mutex<Session>,
}

impl Slot {
    fn state(&self) -> MutexGuard<'_, Session> {
        self.session.lock().expect("lock poisoned")
    }

    fn closed(&self) -> IngestError {
        IngestError::Closed {
            reference: self.reference.clone(),
        }
    }
}

struct Inner {
    slots: RwLock<HashMap<String, Arc<Slot>>>,
    store: Arc<dyn BlobStore>,
    config: IngestConfig,
}

impl Inner {
    /// Drop `slot` from the table if it is still the live entry for its ref.
    fn remove(&self, slot: &Arc<Slot>) -> bool {
        let mut slots = self.slots.write().expect("lock poisoned");
        match slots.get(&slot.reference) {
            Some(current) if Arc::ptr_eq(current, slot) => {
                slots.remove(&slot.reference);
                true
            }
            _ => false,
        }
    }

    /// Close `slot`, discard its bytes, and drop it from the table.
    fn close(&self, slot: &Arc<Slot>) {
        {
            let mut session = slot.state();
            slot.closed.store(true, Ordering::Release);
            session.discard();
        }
        self.remove(slot);
    }

    fn lookup(&self, reference: &str) -> IngestResult<Arc<Slot>> {
        self.slots
            .read()
            .expect("lock poisoned")
            .get(reference)
            .cloned()
            .ok_or_else(|| IngestError::NotFound {
                reference: reference.to_string(),
            })
    }
}

/// Owns every open ingestion session.
///
/// Cheap to clone; clones share the same session table and store.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let open = self.inner.slots.read().map(|s| s.len()).unwrap_or(0);
        f.debug_struct("SessionManager")
            .field("open_sessions", &open)
            .field("config", &self.inner.config)
            .finish()
    }
}

impl SessionManager {
    /// Create a manager committing into `store`.
    pub fn new(store: Arc<dyn BlobStore>, config: IngestConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                slots: RwLock::new(HashMap::new()),
                store,
                config,
            }),
        }
    }

    /// The store commits land in.
    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.inner.store
    }

    pub fn config(&self) -> &IngestConfig {
        &self.inner.config
    }

    /// Take the writer lock for `reference`, opening a session if none exists.
    ///
    /// Fails fast with [`IngestError::Locked`] while another writer holds the
    /// ref. An existing open session is resumed as-is.
    pub fn acquire(&self, reference: &str) -> IngestResult<SessionWriter> {
        self.validate_ref(reference)?;

        let slot = {
            let mut slots = self.inner.slots.write().expect("lock poisoned");
            let slot = match slots.get(reference) {
                Some(slot) if !slot.closed.load(Ordering::Acquire) => Arc::clone(slot),
                _ => {
                    debug!(reference, "session opened");
                    let slot = Arc::new(Slot {
                        reference: reference.to_string(),
                        held: AtomicBool::new(false),
                        closed: AtomicBool::new(false),
                        session: Mutex::new(Session::new(
                            reference.to_string(),
                            self.inner.config.default_algorithm,
                        )),
                    });
                    slots.insert(reference.to_string(), Arc::clone(&slot));
                    slot
                }
            };
            if slot
                .held
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return Err(IngestError::Locked {
                    reference: reference.to_string(),
                });
            }
            slot
        };

        slot.state().touch();
        Ok(SessionWriter {
            inner: Arc::clone(&self.inner),
            slot,
        })
    }

    /// Snapshot of an open session. Does not take the writer lock.
    pub fn status(&self, reference: &str) -> IngestResult<SessionStatus> {
        let slot = self.inner.lookup(reference)?;
        let session = slot.state();
        if slot.closed.load(Ordering::Acquire) {
            return Err(IngestError::NotFound {
                reference: reference.to_string(),
            });
        }
        Ok(session.status())
    }

    /// Snapshots of every open session, ordered by ref.
    pub fn statuses(&self) -> Vec<SessionStatus> {
        let slots: Vec<Arc<Slot>> = self
            .inner
            .slots
            .read()
            .expect("lock poisoned")
            .values()
            .cloned()
            .collect();

        let mut out: Vec<SessionStatus> = slots
            .iter()
            .filter_map(|slot| {
                let session = slot.state();
                (!slot.closed.load(Ordering::Acquire)).then(|| session.status())
            })
            .collect();
        out.sort_by(|a, b| a.reference.cmp(&b.reference));
        out
    }

    /// Discard the open session for `reference`.
    ///
    /// Works whether or not a writer holds the ref; that writer's next call
    /// fails with [`IngestError::Closed`]. A session that already committed
    /// or expired is `NotFound`, even if its slot is still in the table.
    pub fn abort(&self, reference: &str) -> IngestResult<()> {
        let slot = self.inner.lookup(reference)?;
        {
            let mut session = slot.state();
            if slot.closed.swap(true, Ordering::AcqRel) {
                return Err(IngestError::NotFound {
                    reference: reference.to_string(),
                });
            }
            session.discard();
        }
        self.inner.remove(&slot);
        info!(reference, "session aborted");
        Ok(())
    }

    /// Abort every session untouched for at least `max_idle`.
    ///
    /// Returns the refs that were reclaimed.
    pub fn expire_idle(&self, max_idle: Duration) -> Vec<String> {
        let now = Instant::now();
        let candidates: Vec<Arc<Slot>> = self
            .inner
            .slots
            .read()
            .expect("lock poisoned")
            .values()
            .cloned()
            .collect();

        let mut expired = Vec::new();
        for slot in candidates {
            let idle = {
                let mut session = slot.state();
                let idle = now.saturating_duration_since(session.idle_since());
                if idle < max_idle || slot.closed.swap(true, Ordering::AcqRel) {
                    continue;
                }
                session.discard();
                idle
            };
            self.inner.remove(&slot);
            info!(reference = %slot.reference, idle_secs = idle.as_secs(), "session expired");
            expired.push(slot.reference.clone());
        }
        expired.sort();
        expired
    }

    /// Expire sessions idle past the configured timeout.
    pub fn reap(&self) -> Vec<String> {
        self.expire_idle(self.inner.config.idle_timeout())
    }

    fn validate_ref(&self, reference: &str) -> IngestResult<()> {
        let reason = if reference.is_empty() {
            "ref is empty".to_string()
        } else if reference.len() > self.inner.config.max_ref_len {
            format!(
                "ref is {} bytes, limit is {}",
                reference.len(),
                self.inner.config.max_ref_len
            )
        } else {
            return Ok(());
        };
        Err(IngestError::InvalidRef {
            reference: reference.to_string(),
            reason,
        })
    }
}

/// Outcome of a successful commit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Committed {
    pub info: BlobInfo,
    /// Session state at the moment of commit.
    pub progress: WriteProgress,
}

/// Exclusive handle on one ref. Dropping it releases the ref.
pub struct SessionWriter {
    inner: Arc<Inner>,
    slot: Arc<Slot>,
}

impl std::fmt::Debug for SessionWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionWriter")
            .field("reference", &self.slot.reference)
            .finish_non_exhaustive()
    }
}

impl SessionWriter {
    pub fn reference(&self) -> &str {
        &self.slot.reference
    }

    fn open_state(&self) -> IngestResult<MutexGuard<'_, Session>> {
        let mut session = self.slot.state();
        if self.slot.closed.load(Ordering::Acquire) {
            return Err(self.slot.closed());
        }
        session.touch();
        Ok(session)
    }

    /// Current state without mutation.
    pub fn stat(&self) -> IngestResult<WriteProgress> {
        Ok(self.open_state()?.progress())
    }

    /// Declare the final size (0 leaves it unknown) and/or digest.
    pub fn expect(&self, total: u64, expected: Option<Digest>) -> IngestResult<WriteProgress> {
        let mut session = self.open_state()?;
        session.declare(total, expected);
        Ok(session.progress())
    }

    /// Place `data` at `offset`. Empty data is a probe and changes nothing.
    pub fn write(&self, offset: u64, data: &[u8]) -> IngestResult<WriteProgress> {
        let mut session = self.open_state()?;
        if !data.is_empty() {
            session.write(offset, data)?;
        }
        Ok(session.progress())
    }

    /// Verify the session and hand its bytes to the store.
    ///
    /// `data`, if non-empty, is written at `offset` first. Any failure closes
    /// the session and discards its bytes.
    pub fn commit(self, offset: u64, data: &[u8], labels: Labels) -> IngestResult<Committed> {
        let reference = self.slot.reference.clone();
        match self.try_commit(offset, data, labels) {
            Ok(committed) => {
                info!(
                    reference = %reference,
                    digest = %committed.info.digest,
                    size = committed.info.size,
                    "session committed"
                );
                Ok(committed)
            }
            Err(err) => {
                warn!(reference = %reference, error = %err, "commit failed, session discarded");
                self.inner.close(&self.slot);
                Err(err)
            }
        }
    }

    fn try_commit(&self, offset: u64, data: &[u8], labels: Labels) -> IngestResult<Committed> {
        let (digest, bytes, progress) = {
            let mut session = self.open_state()?;
            if !data.is_empty() {
                session.write(offset, data)?;
            }
            validate_labels(&labels).map_err(|source| IngestError::InvalidLabels {
                reference: self.slot.reference.clone(),
                source,
            })?;
            let progress = session.progress();
            let (digest, bytes) = session.seal()?;
            self.slot.closed.store(true, Ordering::Release);
            (digest, bytes, progress)
        };
        self.inner.remove(&self.slot);

        let info = self
            .inner
            .store
            .put(&digest, bytes, labels)
            .map_err(|source| match source {
                StoreError::AlreadyExists(digest) => IngestError::AlreadyExists {
                    reference: self.slot.reference.clone(),
                    digest,
                },
                source => IngestError::Store {
                    reference: self.slot.reference.clone(),
                    source,
                },
            })?;
        Ok(Committed { info, progress })
    }
}

impl Drop for SessionWriter {
    fn drop(&mut self) {
        self.slot.held.store(false, Ordering::Release);
    }
}
