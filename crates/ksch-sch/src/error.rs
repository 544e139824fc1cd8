//! Engine error types.
//!
//! `ParseError` comes from the `ksch-sexpr` crate; everything layered above
//! it lives here. `ConflictError` is deliberately its own type because it is
//! recoverable: the caller renames or removes one of the conflicting items
//! and retries the read.

use thiserror::Error;

use crate::library::LibraryError;

/// A unique index rebuild found two or more items sharing a key.
///
/// Raised lazily on the first read after the conflicting mutation, never at
/// `add` time. Indexes stay stale until the duplicates are resolved.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unique index '{index_name}' has {} items for key '{key}'", item_ids.len())]
pub struct ConflictError {
    /// Name of the violated index (`"uuid"`, `"reference"`, ...)
    pub index_name: String,
    /// The duplicated key value
    pub key: String,
    /// UUIDs of every item carrying the key
    pub item_ids: Vec<String>,
}

/// Top-level engine error.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ksch_sexpr::ParseError),

    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error(transparent)]
    Library(#[from] LibraryError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("batch mode is not reentrant")]
    BatchReentry,

    #[error("document root is not a kicad_sch list")]
    InvalidDocument,

    #[error("document has no backing file path")]
    NoPath,

    #[error("a wire needs at least two points")]
    InvalidWire,

    #[error("unknown component reference '{0}'")]
    UnknownReference(String),

    #[error("component '{reference}' has no pin '{pin}'")]
    UnknownPin { reference: String, pin: String },
}
