//! Error taxonomy shared by the lifecycle manager, chat coordinator, and
//! the enrichment job.
//!
//! Four families, each with a distinct recovery story:
//! - [`ValidationError`] — bad input, reported before any external call.
//! - [`TransportError`] — upload/network failure; surfaced, never retried.
//! - [`Error::Parse`] — a model response that is not the expected JSON;
//!   fatal to that single attempt.
//! - [`Error::StaleState`] — an action against a source whose status no
//!   longer permits it.

use thiserror::Error;

use crate::models::SourceStatus;

/// Rejected input. Always raised synchronously, before any upload or store
/// write is attempted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("file type '{0}' is not accepted")]
    UnsupportedFileType(String),
    #[error("file is {size} bytes; the ceiling for '{mime}' is {limit} bytes")]
    FileTooLarge { mime: String, size: u64, limit: u64 },
    #[error("{field} must be {min}-{max} characters, got {len}")]
    TextLength {
        field: &'static str,
        min: usize,
        max: usize,
        len: usize,
    },
    #[error("{field} must be at least {min} characters, got {len}")]
    TextTooShort {
        field: &'static str,
        min: usize,
        len: usize,
    },
    #[error("at least one ready source must be selected")]
    NoSourcesSelected,
}

/// Upload transport failure, mirroring the storage backend's error codes.
/// Surfaced to the caller distinctly; no automatic retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("permission denied by the storage backend")]
    Unauthorized,
    #[error("upload canceled")]
    Canceled,
    #[error("unknown storage failure")]
    Unknown,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("upload failed: {0}")]
    Transport(#[from] TransportError),

    /// The model response was not valid JSON or was missing expected
    /// fields. Fatal to the single enrichment attempt that produced it.
    #[error("model response could not be parsed: {0}")]
    Parse(String),

    /// An action was issued against a source that is no longer in a state
    /// permitting it (select/rename on a non-created source).
    #[error("source {id} is {status}; this operation requires a created source")]
    StaleState { id: String, status: SourceStatus },

    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    /// Failure inside the store backend itself.
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl Error {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            id: id.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
