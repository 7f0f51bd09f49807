//! HTTP server for the content store.
//!
//! Exposes [`cas_service::ContentService`] as a JSON/HTTP API:
//!
//! ```text
//! GET    /v1/health
//! GET    /v1/blobs?filter=..              newline-delimited BlobInfo
//! GET    /v1/blobs/:digest                BlobInfo
//! PATCH  /v1/blobs/:digest                {"info": {...}, "mask": [...]}
//! DELETE /v1/blobs/:digest
//! GET    /v1/blobs/:digest/content?offset=&length=
//! GET    /v1/sessions?filter=..           [SessionStatus]
//! GET    /v1/sessions/:ref                SessionStatus
//! POST   /v1/sessions/:ref                [WriteRequest] -> [WriteResponse]
//! DELETE /v1/sessions/:ref                abort
//! ```
//!
//! Errors are returned as `{"code", "resource", "reason", "message"}` with a
//! matching HTTP status.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use config::{ServerConfig, StorageConfig};
pub use error::{ServerError, ServerResult};
pub use server::{spawn_reaper, CasServer};
