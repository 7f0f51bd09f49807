use bytes::Bytes;
use cas_ingest::WriteProgress;
use cas_types::{Digest, Labels};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a write message asks the session to do.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteAction {
    /// Report state only.
    Stat,
    /// Place `data` at `offset`.
    #[default]
    Write,
    /// Write any trailing `data`, verify, and publish the blob.
    Commit,
}

/// One message of a write stream.
///
/// `total` and `expected` may arrive on any message; the latest non-empty
/// declaration wins. `labels` is only read on commit.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteRequest {
    #[serde(default)]
    pub action: WriteAction,
    /// May be left empty after the first message of a stream.
    #[serde(rename = "ref", default)]
    pub reference: String,
    #[serde(default)]
    pub total: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<Digest>,
    #[serde(default)]
    pub offset: u64,
    #[serde(default, with = "hex_bytes")]
    pub data: Bytes,
    #[serde(default, skip_serializing_if = "Labels::is_empty")]
    pub labels: Labels,
}

impl WriteRequest {
    pub fn stat(reference: impl Into<String>) -> Self {
        Self {
            action: WriteAction::Stat,
            reference: reference.into(),
            ..Default::default()
        }
    }

    pub fn write(reference: impl Into<String>, offset: u64, data: impl Into<Bytes>) -> Self {
        Self {
            action: WriteAction::Write,
            reference: reference.into(),
            offset,
            data: data.into(),
            ..Default::default()
        }
    }

    /// Commit at `offset` with no trailing data.
    pub fn commit(reference: impl Into<String>, offset: u64) -> Self {
        Self {
            action: WriteAction::Commit,
            reference: reference.into(),
            offset,
            ..Default::default()
        }
    }

    pub fn with_total(mut self, total: u64) -> Self {
        self.total = total;
        self
    }

    pub fn with_expected(mut self, expected: Digest) -> Self {
        self.expected = Some(expected);
        self
    }

    pub fn with_labels(mut self, labels: Labels) -> Self {
        self.labels = labels;
        self
    }
}

/// Reply to one accepted write message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteResponse {
    pub action: WriteAction,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub offset: u64,
    pub total: u64,
    /// Digest of the bytes received so far; the blob digest after commit.
    pub digest: Digest,
}

impl WriteResponse {
    pub(crate) fn new(action: WriteAction, progress: WriteProgress) -> Self {
        Self {
            action,
            started_at: progress.status.started_at,
            updated_at: progress.status.updated_at,
            offset: progress.status.offset,
            total: progress.status.total,
            digest: progress.digest,
        }
    }
}

/// One piece of a streamed read.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadChunk {
    /// Position of `data` within the blob.
    pub offset: u64,
    #[serde(with = "hex_bytes")]
    pub data: Bytes,
}

/// Hex encoding for byte payloads in text formats.
pub mod hex_bytes {
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let text = String::deserialize(deserializer)?;
        hex::decode(text)
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}
