//! Digest computation for the content store.
//!
//! Provides one-shot hashing through [`ContentHasher`] and incremental
//! hashing through [`DigestState`], which ingestion sessions carry while
//! bytes stream in. SHA-256 and BLAKE3 are supported; the algorithm is part
//! of every [`Digest`](cas_types::Digest) so both can coexist.
//!
//! All crypto operations wrap established libraries; there is no custom cryptography.

pub mod hasher;

pub use hasher::{digests_match, ContentHasher, DigestState};
