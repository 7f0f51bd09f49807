use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use cas_types::{validate_labels, Digest, Labels};

use crate::error::{StoreError, StoreResult};

/// Metadata for one committed blob.
///
/// `digest`, `size` and `created_at` are fixed when the blob is committed.
/// `labels` may be changed through [`BlobStore::update`], which also bumps
/// `updated_at`.
///
/// [`BlobStore::update`]: crate::BlobStore::update
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobInfo {
    pub digest: Digest,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub labels: Labels,
}

impl BlobInfo {
    /// Metadata for a blob committed right now.
    pub fn new(digest: Digest, size: u64, labels: Labels) -> Self {
        let now = Utc::now();
        Self {
            digest,
            size,
            created_at: now,
            updated_at: now,
            labels,
        }
    }
}

/// A partial [`BlobInfo`] supplied to an update.
///
/// Immutable fields may be present as long as they equal the stored values;
/// clients commonly echo back a record they fetched earlier.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobUpdate {
    pub digest: Option<Digest>,
    pub size: Option<u64>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub labels: Option<Labels>,
}

impl BlobUpdate {
    /// An update that only carries labels.
    pub fn labels(labels: Labels) -> Self {
        Self {
            labels: Some(labels),
            ..Default::default()
        }
    }
}

/// Field paths an update applies to.
///
/// Supported paths are `labels` (replace the whole map) and `labels.<key>`
/// (set or remove one key). An empty mask applies every mutable field that
/// is present in the [`BlobUpdate`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMask {
    paths: Vec<String>,
}

impl FieldMask {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }
}

const IMMUTABLE_FIELDS: [&str; 4] = ["digest", "size", "created_at", "updated_at"];

/// Compute the record that results from applying `update` under `mask`.
///
/// Shared by every backend so they agree on validation. `updated_at` is
/// always strictly later than before, even with a coarse clock.
pub fn apply_update(
    current: &BlobInfo,
    update: &BlobUpdate,
    mask: &FieldMask,
) -> StoreResult<BlobInfo> {
    let digest = current.digest;
    let immutable = |field: &str| StoreError::ImmutableField {
        digest,
        field: field.to_string(),
    };

    if update.digest.is_some_and(|d| d != current.digest) {
        return Err(immutable("digest"));
    }
    if update.size.is_some_and(|s| s != current.size) {
        return Err(immutable("size"));
    }
    if update.created_at.is_some_and(|t| t != current.created_at) {
        return Err(immutable("created_at"));
    }

    let mut next = current.clone();
    if mask.is_empty() {
        if let Some(labels) = &update.labels {
            next.labels = labels.clone();
        }
    } else {
        for path in mask.paths() {
            if path == "labels" {
                next.labels = update.labels.clone().unwrap_or_default();
            } else if let Some(key) = path.strip_prefix("labels.") {
                match update.labels.as_ref().and_then(|l| l.get(key)) {
                    Some(value) => {
                        next.labels.insert(key.to_string(), value.clone());
                    }
                    None => {
                        next.labels.remove(key);
                    }
                }
            } else if IMMUTABLE_FIELDS.contains(&path.as_str()) {
                return Err(immutable(path));
            } else {
                return Err(StoreError::InvalidFieldPath {
                    digest,
                    path: path.clone(),
                });
            }
        }
    }

    validate_labels(&next.labels)
        .map_err(|source| StoreError::InvalidLabels { digest, source })?;

    next.updated_at = Utc::now().max(current.updated_at + Duration::nanoseconds(1));
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cas_crypto::ContentHasher;

    fn info() -> BlobInfo {
        let mut labels = Labels::new();
        labels.insert("keep".into(), "1".into());
        labels.insert("drop".into(), "2".into());
        BlobInfo::new(ContentHasher::SHA256.hash(b"x"), 1, labels)
    }

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn empty_mask_replaces_labels() {
        let cur = info();
        let next = apply_update(&cur, &BlobUpdate::labels(labels(&[("k", "v")])), &FieldMask::empty()).unwrap();
        assert_eq!(next.labels, labels(&[("k", "v")]));
        assert_eq!(next.created_at, cur.created_at);
        assert!(next.updated_at > cur.updated_at);
    }

    #[test]
    fn empty_mask_without_labels_keeps_them() {
        let cur = info();
        let next = apply_update(&cur, &BlobUpdate::default(), &FieldMask::empty()).unwrap();
        assert_eq!(next.labels, cur.labels);
    }

    #[test]
    fn key_paths_set_and_remove() {
        let cur = info();
        let update = BlobUpdate::labels(labels(&[("new", "3")]));
        let mask = FieldMask::new(["labels.new", "labels.drop"]);
        let next = apply_update(&cur, &update, &mask).unwrap();
        assert_eq!(next.labels, labels(&[("keep", "1"), ("new", "3")]));
    }

    #[test]
    fn labels_path_replaces_whole_map() {
        let cur = info();
        let next = apply_update(&cur, &BlobUpdate::default(), &FieldMask::new(["labels"])).unwrap();
        assert!(next.labels.is_empty());
    }

    #[test]
    fn immutable_paths_rejected() {
        let cur = info();
        for path in ["digest", "size", "created_at", "updated_at"] {
            let err = apply_update(&cur, &BlobUpdate::default(), &FieldMask::new([path])).unwrap_err();
            assert!(matches!(err, StoreError::ImmutableField { ref field, .. } if field == path));
        }
    }

    #[test]
    fn changed_immutable_values_rejected() {
        let cur = info();
        let update = BlobUpdate { size: Some(99), ..Default::default() };
        assert!(matches!(
            apply_update(&cur, &update, &FieldMask::empty()),
            Err(StoreError::ImmutableField { .. })
        ));

        let echoed = BlobUpdate {
            digest: Some(cur.digest),
            size: Some(cur.size),
            created_at: Some(cur.created_at),
            ..Default::default()
        };
        assert!(apply_update(&cur, &echoed, &FieldMask::empty()).is_ok());
    }

    #[test]
    fn unknown_path_rejected() {
        let err = apply_update(&info(), &BlobUpdate::default(), &FieldMask::new(["owner"])).unwrap_err();
        assert!(matches!(err, StoreError::InvalidFieldPath { .. }));
    }

    #[test]
    fn oversized_label_rejected() {
        let big = "v".repeat(cas_types::MAX_LABEL_PAIR_SIZE);
        let update = BlobUpdate::labels(labels(&[("k", &big)]));
        let err = apply_update(&info(), &update, &FieldMask::empty()).unwrap_err();
        assert!(matches!(err, StoreError::InvalidLabels { .. }));
    }

    #[test]
    fn serde_roundtrip() {
        let cur = info();
        let json = serde_json::to_string(&cur).unwrap();
        let back: BlobInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(cur, back);
    }

    #[test]
    fn field_mask_is_transparent_list() {
        let mask: FieldMask = serde_json::from_str(r#"["labels.a"]"#).unwrap();
        assert_eq!(mask.paths(), ["labels.a".to_string()]);
    }
}
