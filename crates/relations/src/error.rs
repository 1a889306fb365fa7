//! Relation Error Types
//!
//! Fetch failures are not errors here: a relation list that can't be
//! fetched settles as [`Failed`](crate::RelationState::Failed). The only
//! errors are about waiting itself.

use derive_more::{Display, Error};

/// A relation error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for relation operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The run was cancelled while waiting for the key to settle.
    #[display("cancelled while resolving {_0}")]
    Cancelled(#[error(not(source))] String),
    /// The key's state disappeared before it settled (the cache was dropped).
    #[display("resolution of {_0} was abandoned")]
    Abandoned(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
