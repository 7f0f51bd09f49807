use std::cmp::Ordering;
use std::fmt;

use cas_ingest::SessionStatus;
use cas_store::BlobInfo;
use chrono::{DateTime, SecondsFormat, Utc};

/// A field value as seen by filters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldValue {
    Str(String),
    Uint(u64),
    Time(DateTime<Utc>),
}

impl FieldValue {
    /// Order this value against a literal taken from a filter.
    ///
    /// The literal is read as the same kind as the value. `None` means the
    /// literal cannot be read that way and the two are incomparable.
    pub fn compare(&self, literal: &str) -> Option<Ordering> {
        match self {
            Self::Str(s) => Some(s.as_str().cmp(literal)),
            Self::Uint(n) => literal.trim().parse::<u64>().ok().map(|v| n.cmp(&v)),
            Self::Time(t) => DateTime::parse_from_rfc3339(literal.trim())
                .ok()
                .map(|v| t.cmp(&v.with_timezone(&Utc))),
        }
    }

    /// Substring test on the textual form.
    pub fn contains(&self, needle: &str) -> bool {
        match self {
            Self::Str(s) => s.contains(needle),
            other => other.to_string().contains(needle),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Uint(n) => write!(f, "{n}"),
            Self::Time(t) => f.write_str(&t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        }
    }
}

/// A record whose fields can be addressed by path.
pub trait Filterable {
    /// Value at `path`, or `None` when the record has no such field.
    fn field(&self, path: &str) -> Option<FieldValue>;
}

impl Filterable for BlobInfo {
    fn field(&self, path: &str) -> Option<FieldValue> {
        match path {
            "digest" => Some(FieldValue::Str(self.digest.to_string())),
            "size" => Some(FieldValue::Uint(self.size)),
            "created_at" => Some(FieldValue::Time(self.created_at)),
            "updated_at" => Some(FieldValue::Time(self.updated_at)),
            _ => {
                let key = path.strip_prefix("labels.")?;
                self.labels.get(key).map(|v| FieldValue::Str(v.clone()))
            }
        }
    }
}

/// An undeclared total (0) counts as absent.
impl Filterable for SessionStatus {
    fn field(&self, path: &str) -> Option<FieldValue> {
        match path {
            "ref" => Some(FieldValue::Str(self.reference.clone())),
            "offset" => Some(FieldValue::Uint(self.offset)),
            "total" => (self.total > 0).then_some(FieldValue::Uint(self.total)),
            "expected" => self.expected.map(|d| FieldValue::Str(d.to_string())),
            "started_at" => Some(FieldValue::Time(self.started_at)),
            "updated_at" => Some(FieldValue::Time(self.updated_at)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cas_types::{Digest, DigestAlgorithm, Labels};
    use chrono::TimeZone;

    fn blob() -> BlobInfo {
        let mut labels = Labels::new();
        labels.insert("team".into(), "storage".into());
        let mut info = BlobInfo::new(Digest::new(DigestAlgorithm::Sha256, [0xab; 32]), 42, labels);
        info.created_at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        info
    }

    #[test]
    fn blob_fields() {
        let b = blob();
        assert_eq!(b.field("size"), Some(FieldValue::Uint(42)));
        assert_eq!(b.field("labels.team"), Some(FieldValue::Str("storage".into())));
        assert_eq!(b.field("labels.missing"), None);
        assert_eq!(b.field("labels"), None);
        assert_eq!(b.field("nope"), None);
        match b.field("digest") {
            Some(FieldValue::Str(s)) => assert!(s.starts_with("sha256:abab")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn numeric_comparison_is_not_lexicographic() {
        let v = FieldValue::Uint(42);
        assert_eq!(v.compare("100"), Some(Ordering::Less));
        assert_eq!(v.compare("42"), Some(Ordering::Equal));
        assert_eq!(v.compare("abc"), None);
    }

    #[test]
    fn time_comparison_honors_offsets() {
        let v = blob().field("created_at").unwrap();
        assert_eq!(v.compare("2024-03-01T13:00:00+01:00"), Some(Ordering::Equal));
        assert_eq!(v.compare("2024-01-01T00:00:00Z"), Some(Ordering::Greater));
        assert_eq!(v.compare("yesterday"), None);
    }

    #[test]
    fn contains_uses_text_form() {
        assert!(FieldValue::Uint(12345).contains("234"));
        assert!(FieldValue::Str("upload-7".into()).contains("load"));
    }

    #[test]
    fn session_total_zero_is_absent() {
        let status = SessionStatus {
            reference: "r".into(),
            started_at: Utc::now(),
            updated_at: Utc::now(),
            offset: 3,
            total: 0,
            expected: None,
        };
        assert_eq!(status.field("total"), None);
        assert_eq!(status.field("expected"), None);
        assert_eq!(status.field("offset"), Some(FieldValue::Uint(3)));
        assert_eq!(status.field("ref"), Some(FieldValue::Str("r".into())));
    }
}
