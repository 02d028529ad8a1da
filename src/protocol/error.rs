//! Protocol-level parse errors.
//!
//! Distinguished from [`crate::storage::StorageError`]: these describe a
//! malformed request, not a failed operation on well-formed input. Each
//! variant maps to a `CLIENT_ERROR` reply; the connection stays open.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ProtocolError {
    #[error("unknown command")]
    UnknownCommand,

    #[error("bad command line format")]
    MalformedLine,

    #[error("bad data chunk")]
    BadDataChunk,

    #[error("invalid numeric field: {0}")]
    BadInteger(&'static str),
}
