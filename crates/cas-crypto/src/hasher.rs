use std::io::{self, Read};

use cas_types::{Digest, DigestAlgorithm};
use sha2::Digest as _;

/// One-shot content hasher bound to a digest algorithm.
///
/// Two hashers exist, one per supported algorithm. A digest records which
/// algorithm produced it, so verification always re-hashes with the
/// algorithm named in the expected digest.
pub struct ContentHasher {
    algorithm: DigestAlgorithm,
}

impl ContentHasher {
    /// SHA-256 hasher.
    pub const SHA256: Self = Self {
        algorithm: DigestAlgorithm::Sha256,
    };
    /// BLAKE3 hasher.
    pub const BLAKE3: Self = Self {
        algorithm: DigestAlgorithm::Blake3,
    };

    pub const fn new(algorithm: DigestAlgorithm) -> Self {
        Self { algorithm }
    }

    /// Hash raw bytes.
    pub fn hash(&self, data: &[u8]) -> Digest {
        let mut state = DigestState::new(self.algorithm);
        state.update(data);
        state.finalize()
    }

    /// Hash everything a reader yields, in 64 KiB steps.
    pub fn hash_reader<R: Read>(&self, mut reader: R) -> io::Result<Digest> {
        let mut state = DigestState::new(self.algorithm);
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            state.update(&buf[..n]);
        }
        Ok(state.finalize())
    }

    /// Verify that data produces the expected digest, using the expected
    /// digest's algorithm.
    pub fn verify(data: &[u8], expected: &Digest) -> bool {
        Self::new(expected.algorithm()).hash(data) == *expected
    }

    /// The algorithm used by this hasher.
    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }
}

#[derive(Clone)]
enum Inner {
    Sha256(sha2::Sha256),
    Blake3(Box<blake3::Hasher>),
}

/// Incremental hash accumulator.
///
/// `finalize` borrows the state, so a session can report its running digest
/// after every write and keep appending afterwards.
#[derive(Clone)]
pub struct DigestState {
    inner: Inner,
    bytes_hashed: u64,
}

impl DigestState {
    /// Fresh state for the given algorithm.
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        let inner = match algorithm {
            DigestAlgorithm::Sha256 => Inner::Sha256(sha2::Sha256::new()),
            DigestAlgorithm::Blake3 => Inner::Blake3(Box::new(blake3::Hasher::new())),
        };
        Self {
            inner,
            bytes_hashed: 0,
        }
    }

    /// Fold more bytes into the state.
    pub fn update(&mut self, data: &[u8]) {
        match &mut self.inner {
            Inner::Sha256(h) => h.update(data),
            Inner::Blake3(h) => {
                h.update(data);
            }
        }
        self.bytes_hashed += data.len() as u64;
    }

    /// Digest of everything folded in so far.
    pub fn finalize(&self) -> Digest {
        match &self.inner {
            Inner::Sha256(h) => Digest::new(DigestAlgorithm::Sha256, h.clone().finalize().into()),
            Inner::Blake3(h) => Digest::new(DigestAlgorithm::Blake3, *h.finalize().as_bytes()),
        }
    }

    /// Returns `true` if the accumulated digest equals `expected`.
    pub fn matches(&self, expected: &Digest) -> bool {
        digests_match(&self.finalize(), expected)
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        match self.inner {
            Inner::Sha256(_) => DigestAlgorithm::Sha256,
            Inner::Blake3(_) => DigestAlgorithm::Blake3,
        }
    }

    /// Number of bytes folded in since creation.
    pub fn bytes_hashed(&self) -> u64 {
        self.bytes_hashed
    }
}

impl std::fmt::Debug for DigestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigestState")
            .field("algorithm", &self.algorithm())
            .field("bytes_hashed", &self.bytes_hashed)
            .finish()
    }
}

/// Compare two digests. Digests from different algorithms never match.
pub fn digests_match(actual: &Digest, expected: &Digest) -> bool {
    actual == expected
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const HELLO_SHA256: &str =
        "sha256:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";
    const EMPTY_SHA256: &str =
        "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn known_sha256_vectors() {
        assert_eq!(ContentHasher::SHA256.hash(b"hello").to_string(), HELLO_SHA256);
        assert_eq!(ContentHasher::SHA256.hash(b"").to_string(), EMPTY_SHA256);
    }

    #[test]
    fn blake3_matches_library() {
        let d = ContentHasher::BLAKE3.hash(b"hello");
        assert_eq!(d.algorithm(), DigestAlgorithm::Blake3);
        assert_eq!(d.as_bytes(), blake3::hash(b"hello").as_bytes());
    }

    #[test]
    fn algorithms_produce_different_digests() {
        let a = ContentHasher::SHA256.hash(b"same content");
        let b = ContentHasher::BLAKE3.hash(b"same content");
        assert_ne!(a, b);
        assert!(!digests_match(&a, &b));
    }

    #[test]
    fn verify_correct_and_tampered() {
        let id = ContentHasher::BLAKE3.hash(b"original");
        assert!(ContentHasher::verify(b"original", &id));
        assert!(!ContentHasher::verify(b"tampered", &id));
    }

    #[test]
    fn incremental_equals_one_shot() {
        let mut state = DigestState::new(DigestAlgorithm::Sha256);
        state.update(b"he");
        state.update(b"");
        state.update(b"llo");
        assert_eq!(state.finalize().to_string(), HELLO_SHA256);
        assert_eq!(state.bytes_hashed(), 5);
        assert!(state.matches(&ContentHasher::SHA256.hash(b"hello")));
    }

    #[test]
    fn finalize_does_not_consume() {
        let mut state = DigestState::new(DigestAlgorithm::Blake3);
        state.update(b"abc");
        let first = state.finalize();
        assert_eq!(first, state.finalize());
        state.update(b"def");
        assert_eq!(state.finalize(), ContentHasher::BLAKE3.hash(b"abcdef"));
    }

    #[test]
    fn hash_reader_matches_hash() {
        let data = vec![7u8; 200_000];
        let d = ContentHasher::SHA256.hash_reader(&data[..]).unwrap();
        assert_eq!(d, ContentHasher::SHA256.hash(&data));
    }

    #[test]
    fn debug_shows_algorithm() {
        let state = DigestState::new(DigestAlgorithm::Blake3);
        let debug = format!("{state:?}");
        assert!(debug.contains("Blake3"));
    }

    proptest! {
        #[test]
        fn chunking_does_not_change_digest(data in proptest::collection::vec(any::<u8>(), 0..2048), split in 0usize..2048) {
            let split = split.min(data.len());
            for alg in DigestAlgorithm::ALL {
                let mut state = DigestState::new(alg);
                state.update(&data[..split]);
                state.update(&data[split..]);
                prop_assert_eq!(state.finalize(), ContentHasher::new(alg).hash(&data));
            }
        }
    }
}
