//! Extraction Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! Only structural problems are errors. Fields that can be dropped without
//! invalidating the entry (a broken detail row, unparseable structured data)
//! are omitted by the extractor and logged instead.

use derive_more::{Display, Error};

/// An extraction error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required structural anchor is missing, or the page contradicts
    /// itself (e.g. more timestamps than an entry can have).
    #[display("malformed page: {_0}")]
    MalformedPage(#[error(not(source))] &'static str),
    /// A field was found but could not be parsed.
    #[display("failed to parse field '{field}', found value: {value}")]
    ParseError {
        /// The field that failed to parse.
        field: &'static str,
        /// Details about the parsing failure.
        value: String,
    },
    /// The page URL (or the configured site base) is not an absolute URL.
    #[display("invalid URL: {_0}")]
    InvalidUrl(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // There are no retryable errors in this crate, the HTML is
        // either valid or its not.
        false
    }
}
