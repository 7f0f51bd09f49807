use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use cas_ingest::IngestConfig;
use cas_service::ServiceConfig;
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

/// Top-level server configuration, usually read from a TOML file.
///
/// Every field has a default, so an empty file is a valid configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Seconds between sweeps for idle sessions.
    pub reap_interval_secs: u64,
    pub storage: StorageConfig,
    pub service: ServiceConfig,
    pub ingest: IngestConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 7420)),
            reap_interval_secs: 30,
            storage: StorageConfig::default(),
            service: ServiceConfig::default(),
            ingest: IngestConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_toml_str(text: &str) -> ServerResult<Self> {
        toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> ServerResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs.max(1))
    }
}

/// Where committed blobs live.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Process memory; contents vanish on exit.
    #[default]
    Memory,
    Filesystem { root: PathBuf },
}

#[cfg(test)]
mod tests {
    use super::*;
    use cas_types::DigestAlgorithm;

    #[test]
    fn default_config() {
        let c = ServerConfig::default();
        assert_eq!(c.bind_addr, "127.0.0.1:7420".parse::<SocketAddr>().unwrap());
        assert_eq!(c.storage, StorageConfig::Memory);
        assert_eq!(c.reap_interval(), Duration::from_secs(30));
        assert_eq!(c.service.read_chunk_size, 1024 * 1024);
    }

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(ServerConfig::from_toml_str("").unwrap(), ServerConfig::default());
    }

    #[test]
    fn full_toml() {
        let text = r#"
            bind_addr = "0.0.0.0:9000"
            reap_interval_secs = 5

            [storage]
            backend = "filesystem"
            root = "/var/lib/cas"

            [service]
            read_chunk_size = 65536

            [ingest]
            default_algorithm = "blake3"
            idle_timeout_secs = 120
        "#;
        let c = ServerConfig::from_toml_str(text).unwrap();
        assert_eq!(c.bind_addr.port(), 9000);
        assert_eq!(
            c.storage,
            StorageConfig::Filesystem {
                root: PathBuf::from("/var/lib/cas")
            }
        );
        assert_eq!(c.service.read_chunk_size, 65536);
        assert_eq!(c.service.list_batch_size, 100);
        assert_eq!(c.ingest.default_algorithm, DigestAlgorithm::Blake3);
        assert_eq!(c.ingest.idle_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn bad_toml_is_config_error() {
        let err = ServerConfig::from_toml_str("bind_addr = 12").unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = ServerConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }
}
