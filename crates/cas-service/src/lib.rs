//! Content service facade.
//!
//! [`ContentService`] exposes the store and the session manager as a flat
//! set of operations, the way a remote API would see them:
//!
//! | Operation | Result |
//! |---|---|
//! | `info`, `update`, `delete` | one blob record |
//! | `list` | stream of record batches |
//! | `read` | stream of [`ReadChunk`]s |
//! | `status`, `list_statuses`, `abort` | open sessions |
//! | `write` | stream of [`WriteResponse`]s for a stream of [`WriteRequest`]s |
//!
//! Every failure is a [`ServiceError`] carrying a [`Code`], the digest or
//! ref it concerns, and a stable reason string.

pub mod config;
pub mod error;
pub mod message;
pub mod service;

pub use config::ServiceConfig;
pub use error::{reason, Code, ServiceError, ServiceResult};
pub use message::{ReadChunk, WriteAction, WriteRequest, WriteResponse};
pub use service::{ContentService, ResponseStream};
