//! Filtering for listing operations.
//!
//! Listing calls take a set of filter strings. Each string is a conjunction
//! of clauses separated by commas; the set matches a record when any one of
//! its filters does. An empty set matches everything.
//!
//! ```text
//! labels.team==storage,size>1024
//! ref~=upload-
//! labels."app.kubernetes.io/name"        (presence)
//! created_at>=2024-01-01T00:00:00Z
//! ```
//!
//! Records expose their fields through [`Filterable`]; any matcher plugs in
//! through [`Predicate`]. [`select`] and [`select_ok`] apply a predicate to a
//! sequence lazily, keeping order.

pub mod error;
pub mod field;
pub mod filter;
pub mod select;

pub use error::{QueryError, QueryResult};
pub use field::{FieldValue, Filterable};
pub use filter::{Clause, Filter, FilterSet, Op};
pub use select::{select, select_ok, Predicate};
