//! Errors surfaced by the search executor.

use thiserror::Error;

use crate::db::DbError;

/// A search that could not be completed. Callers should present a generic
/// "search failed, try again" message; the source is for logs.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search failed: {0}")]
    Store(#[from] DbError),
}

pub type Result<T> = std::result::Result<T, SearchError>;
