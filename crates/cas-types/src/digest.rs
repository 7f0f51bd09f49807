use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Hash function used to produce a [`Digest`].
///
/// The algorithm name is part of the digest string, so blobs hashed with
/// different algorithms can live side by side in one store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    #[default]
    Sha256,
    Blake3,
}

impl DigestAlgorithm {
    /// All supported algorithms.
    pub const ALL: [DigestAlgorithm; 2] = [Self::Sha256, Self::Blake3];

    /// Canonical lowercase name used in digest strings.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Blake3 => "blake3",
        }
    }

    /// Length of the raw hash output in bytes.
    pub fn output_len(&self) -> usize {
        match self {
            Self::Sha256 | Self::Blake3 => 32,
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sha256" => Ok(Self::Sha256),
            "blake3" => Ok(Self::Blake3),
            other => Err(TypeError::UnknownAlgorithm(other.to_string())),
        }
    }
}

/// Content identifier: an algorithm tag plus the raw hash of a blob's bytes.
///
/// The string form is `<algorithm>:<lowercase hex>`, e.g.
/// `sha256:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824`.
/// Identical content hashed with the same algorithm always yields the same
/// digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest {
    algorithm: DigestAlgorithm,
    hash: [u8; 32],
}

impl Digest {
    /// Build a digest from a pre-computed hash.
    pub fn new(algorithm: DigestAlgorithm, hash: [u8; 32]) -> Self {
        Self { algorithm, hash }
    }

    /// Build a digest from a raw byte slice, checking its length.
    pub fn from_slice(algorithm: DigestAlgorithm, bytes: &[u8]) -> Result<Self, TypeError> {
        let hash: [u8; 32] = bytes.try_into().map_err(|_| TypeError::InvalidLength {
            expected: algorithm.output_len(),
            actual: bytes.len(),
        })?;
        Ok(Self { algorithm, hash })
    }

    /// Parse the `<algorithm>:<hex>` string form.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let malformed = |reason: &str| TypeError::MalformedDigest {
            input: s.to_string(),
            reason: reason.to_string(),
        };

        let (alg, encoded) = s
            .split_once(':')
            .ok_or_else(|| malformed("missing ':' separator"))?;
        let algorithm: DigestAlgorithm = alg.parse()?;

        if encoded.len() != algorithm.output_len() * 2 {
            return Err(malformed(&format!(
                "expected {} hex characters, got {}",
                algorithm.output_len() * 2,
                encoded.len()
            )));
        }
        if !encoded.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(malformed("hash must be lowercase hex"));
        }

        let bytes = hex::decode(encoded).map_err(|e| malformed(&e.to_string()))?;
        Self::from_slice(algorithm, &bytes)
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// The raw hash bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.hash
    }

    /// Hex-encoded hash without the algorithm prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.hash)
    }

    /// Short hex representation (first 12 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.hash[..6])
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({}:{})", self.algorithm, self.short_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.to_hex())
    }
}

impl FromStr for Digest {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
