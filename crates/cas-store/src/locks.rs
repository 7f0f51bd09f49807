use std::sync::{Mutex, MutexGuard};

use cas_types::Digest;

/// Striped per-digest locks.
///
/// Digests are uniformly distributed, so the first hash byte picks a stripe.
/// Two digests may share a stripe; that only costs a little contention.
pub(crate) struct DigestLocks {
    stripes: Vec<Mutex<()>>,
}

impl DigestLocks {
    pub(crate) fn new(stripes: usize) -> Self {
        Self {
            stripes: (0..stripes.max(1)).map(|_| Mutex::new(())).collect(),
        }
    }

    pub(crate) fn lock(&self, digest: &Digest) -> MutexGuard<'_, ()> {
        let idx = digest.as_bytes()[0] as usize % self.stripes.len();
        // The guarded value is `()`, so a poisoned stripe carries no broken state.
        self.stripes[idx]
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cas_types::DigestAlgorithm;

    #[test]
    fn same_digest_same_stripe() {
        let locks = DigestLocks::new(16);
        let d = Digest::new(DigestAlgorithm::Sha256, [3; 32]);
        let guard = locks.lock(&d);
        assert!(locks.stripes[3].try_lock().is_err());
        drop(guard);
        assert!(locks.stripes[3].try_lock().is_ok());
    }

    #[test]
    fn zero_stripes_clamped() {
        let locks = DigestLocks::new(0);
        let _g = locks.lock(&Digest::new(DigestAlgorithm::Blake3, [200; 32]));
    }
}
