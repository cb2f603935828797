//! Local store error type, converted into `kernel::ErrorKind` at the
//! skill-dispatch boundary (SPEC_FULL.md §7 ambient-stack note) — mirrors
//! how `server/gateway/src/rate_limit.rs`'s `RateLimitError` stays local to
//! that module and is converted at its call boundary rather than threaded
//! through every layer as a foreign type. Derived with `thiserror`, same
//! as `agents/src/error.rs`'s `Error` enum.

use kernel::ErrorKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<StoreError> for ErrorKind {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => ErrorKind::TaskNotFound(what),
            StoreError::Conflict(what) => ErrorKind::Fatal(format!("conflict: {what}")),
            StoreError::Database(e) => ErrorKind::Transient(format!("database: {e}")),
        }
    }
}
