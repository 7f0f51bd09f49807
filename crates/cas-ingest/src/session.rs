use std::time::Instant;

use bytes::Bytes;
use cas_crypto::DigestState;
use cas_types::{Digest, DigestAlgorithm};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{IngestError, IngestResult};

/// Point-in-time view of an open session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    #[serde(rename = "ref")]
    pub reference: String,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Bytes received so far.
    pub offset: u64,
    /// Declared total size, 0 when unknown.
    pub total: u64,
    /// Declared digest, if any.
    pub expected: Option<Digest>,
}

/// Session state after a writer operation, plus the digest of the bytes
/// received so far.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteProgress {
    pub status: SessionStatus,
    pub digest: Digest,
}

/// Mutable state of one in-flight session.
///
/// Pure bookkeeping: locking and store interaction live in the manager.
pub(crate) struct Session {
    reference: String,
    started_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    touched: Instant,
    expected_total: u64,
    expected_digest: Option<Digest>,
    buffer: Vec<u8>,
    state: DigestState,
}

impl Session {
    pub(crate) fn new(reference: String, algorithm: DigestAlgorithm) -> Self {
        let now = Utc::now();
        Self {
            reference,
            started_at: now,
            updated_at: now,
            touched: Instant::now(),
            expected_total: 0,
            expected_digest: None,
            buffer: Vec::new(),
            state: DigestState::new(algorithm),
        }
    }

    pub(crate) fn offset(&self) -> u64 {
        self.buffer.len() as u64
    }

    pub(crate) fn status(&self) -> SessionStatus {
        SessionStatus {
            reference: self.reference.clone(),
            started_at: self.started_at,
            updated_at: self.updated_at,
            offset: self.offset(),
            total: self.expected_total,
            expected: self.expected_digest,
        }
    }

    pub(crate) fn progress(&self) -> WriteProgress {
        WriteProgress {
            status: self.status(),
            digest: self.state.finalize(),
        }
    }

    pub(crate) fn touch(&mut self) {
        self.touched = Instant::now();
    }

    pub(crate) fn idle_since(&self) -> Instant {
        self.touched
    }

    /// Record a declared total and/or digest. A zero total and `None`
    /// digest leave the existing declarations untouched.
    pub(crate) fn declare(&mut self, total: u64, expected: Option<Digest>) {
        let mut changed = false;
        if total > 0 && total != self.expected_total {
            self.expected_total = total;
            changed = true;
        }
        if let Some(digest) = expected {
            if self.expected_digest != Some(digest) {
                if digest.algorithm() != self.state.algorithm() {
                    self.rehash(digest.algorithm());
                }
                self.expected_digest = Some(digest);
                changed = true;
            }
        }
        if changed {
            self.updated_at = Utc::now();
        }
    }

    /// Place `data` at `offset`.
    ///
    /// Appends when `offset` equals the current offset. A smaller offset
    /// drops everything from `offset` on first (offset 0 restarts the
    /// transfer). A larger offset would leave a gap and is rejected without
    /// touching the session.
    pub(crate) fn write(&mut self, offset: u64, data: &[u8]) -> IngestResult<()> {
        let current = self.offset();
        if offset > current {
            return Err(IngestError::OffsetOutOfRange {
                reference: self.reference.clone(),
                offset,
                current,
            });
        }
        if offset < current {
            self.buffer.truncate(offset as usize);
            self.rehash(self.state.algorithm());
            debug!(reference = %self.reference, from = current, to = offset, "session rewound");
        }
        self.buffer.extend_from_slice(data);
        self.state.update(data);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Check declarations and hand out the finished bytes.
    ///
    /// Leaves the session empty whether or not the checks pass; a failed
    /// commit never resumes.
    pub(crate) fn seal(&mut self) -> IngestResult<(Digest, Bytes)> {
        let buffer = std::mem::take(&mut self.buffer);
        let actual_size = buffer.len() as u64;
        let digest = self.state.finalize();
        self.state = DigestState::new(self.state.algorithm());

        if self.expected_total > 0 && actual_size != self.expected_total {
            return Err(IngestError::SizeMismatch {
                reference: self.reference.clone(),
                expected: self.expected_total,
                actual: actual_size,
            });
        }
        if let Some(expected) = self.expected_digest {
            if expected != digest {
                return Err(IngestError::DigestMismatch {
                    reference: self.reference.clone(),
                    expected,
                    actual: digest,
                });
            }
        }
        Ok((digest, Bytes::from(buffer)))
    }

    /// Drop buffered bytes.
    pub(crate) fn discard(&mut self) {
        self.buffer = Vec::new();
        self.state = DigestState::new(self.state.algorithm());
    }

    fn rehash(&mut self, algorithm: DigestAlgorithm) {
        let mut state = DigestState::new(algorithm);
        state.update(&self.buffer);
        self.state = state;
    }
}
