//! Blob labels: free-form string metadata.

use std::collections::BTreeMap;

use crate::error::TypeError;

/// Maximum combined size in bytes of one label's key plus value.
pub const MAX_LABEL_PAIR_SIZE: usize = 4096;

/// String-to-string label map. Ordered so listings and serialized forms are
/// deterministic.
pub type Labels = BTreeMap<String, String>;

/// Validate a single label pair.
pub fn validate_label(key: &str, value: &str) -> Result<(), TypeError> {
    if key.is_empty() {
        return Err(TypeError::EmptyLabelKey);
    }
    let size = key.len() + value.len();
    if size > MAX_LABEL_PAIR_SIZE {
        return Err(TypeError::LabelTooLarge {
            key: truncate_key(key),
            size,
            max: MAX_LABEL_PAIR_SIZE,
        });
    }
    Ok(())
}

/// Validate every pair in a label map.
pub fn validate_labels(labels: &Labels) -> Result<(), TypeError> {
    labels.iter().try_for_each(|(k, v)| validate_label(k, v))
}

// Keys near the cap would otherwise flood error messages.
fn truncate_key(key: &str) -> String {
    const SHOWN: usize = 64;
    if key.len() <= SHOWN {
        return key.to_string();
    }
    let mut end = SHOWN;
    while !key.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &key[..end])
}
