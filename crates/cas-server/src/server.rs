use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use cas_ingest::SessionManager;
use cas_service::ContentService;
use cas_store::{BlobStore, FsBlobStore, InMemoryBlobStore};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::config::{ServerConfig, StorageConfig};
use crate::error::{ServerError, ServerResult};
use crate::router::build_router;

/// Content store server.
pub struct CasServer {
    config: ServerConfig,
    service: ContentService,
}

impl CasServer {
    /// Open the configured storage and wire up sessions and the service.
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        let store: Arc<dyn BlobStore> = match &config.storage {
            StorageConfig::Memory => Arc::new(InMemoryBlobStore::new()),
            StorageConfig::Filesystem { root } => Arc::new(FsBlobStore::open(root)?),
        };
        let sessions = SessionManager::new(store, config.ingest.clone());
        let service = ContentService::new(sessions, config.service.clone());
        Ok(Self { config, service })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn service(&self) -> &ContentService {
        &self.service
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(self.service.clone())
    }

    /// Serve until the process is killed.
    pub async fn serve(self) -> ServerResult<()> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Serve until `shutdown` resolves, reaping idle sessions meanwhile.
    pub async fn serve_with_shutdown<F>(self, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!(addr = %self.config.bind_addr, storage = ?self.config.storage, "cas server listening");

        let reaper = spawn_reaper(self.service.sessions().clone(), self.config.reap_interval());
        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()));
        reaper.abort();
        info!("cas server stopped");
        result
    }
}

/// Periodically abort sessions idle past the configured timeout.
pub fn spawn_reaper(sessions: SessionManager, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let expired = sessions.reap();
            if !expired.is_empty() {
                warn!(count = expired.len(), refs = ?expired, "reaped idle sessions");
            }
        }
    })
}
