use std::time::Duration;

use cas_types::DigestAlgorithm;
use serde::{Deserialize, Serialize};

/// Configuration for the session manager.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Hash used for sessions until the writer declares an expected digest.
    pub default_algorithm: DigestAlgorithm,
    /// Sessions untouched for this many seconds are aborted by the reaper.
    pub idle_timeout_secs: u64,
    /// Longest accepted ref name, in bytes.
    pub max_ref_len: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            default_algorithm: DigestAlgorithm::Sha256,
            idle_timeout_secs: 10 * 60,
            max_ref_len: 1024,
        }
    }
}

impl IngestConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = IngestConfig::default();
        assert_eq!(c.default_algorithm, DigestAlgorithm::Sha256);
        assert_eq!(c.idle_timeout(), Duration::from_secs(600));
        assert_eq!(c.max_ref_len, 1024);
    }
}
