//! Ingestion sessions for the content store.
//!
//! Bytes reach the store through sessions. A session is named by a caller
//! chosen *ref*, accumulates bytes over any number of write calls, and ends
//! either in a verified commit (the bytes become a blob) or in an abort.
//!
//! # Lifecycle
//!
//! ```text
//! absent --acquire--> open --commit--> closed (blob in store)
//!                       |  --abort---> closed (bytes discarded)
//!                       |  --expire--> closed (bytes discarded)
//!                       +--drop writer--> open, resumable by the next writer
//! ```
//!
//! # Locking
//!
//! A ref has at most one [`SessionWriter`] at a time. A second
//! [`SessionManager::acquire`] on a held ref fails immediately with
//! [`IngestError::Locked`]; callers retry later. Dropping the writer releases
//! the ref on every exit path. [`SessionManager::status`] reads a snapshot
//! without taking the writer lock.

pub mod config;
pub mod error;
pub mod manager;
pub mod session;

pub use config::IngestConfig;
pub use error::{IngestError, IngestResult};
pub use manager::{Committed, SessionManager, SessionWriter};
pub use session::{SessionStatus, WriteProgress};
