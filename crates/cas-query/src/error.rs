use thiserror::Error;

/// Errors from parsing filter expressions.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    /// The filter text is not well formed.
    #[error("invalid filter {filter:?} at byte {position}: {reason}")]
    Syntax {
        filter: String,
        position: usize,
        reason: String,
    },
}

impl QueryError {
    pub(crate) fn syntax(filter: &str, position: usize, reason: impl Into<String>) -> Self {
        Self::Syntax {
            filter: filter.to_string(),
            position,
            reason: reason.into(),
        }
    }

    /// The filter text that failed.
    pub fn filter(&self) -> &str {
        match self {
            Self::Syntax { filter, .. } => filter,
        }
    }
}

/// Result alias for query operations.
pub type QueryResult<T> = Result<T, QueryError>;
