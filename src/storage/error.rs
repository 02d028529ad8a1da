//! Storage error taxonomy.
//!
//! Success is `Result::Ok`, not a variant — only the failure modes a
//! shard operation can hit get a name here.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("key not found")]
    KeyNotFound,

    #[error("key already in use")]
    KeyAlreadyInUse,

    #[error("illegal parameter")]
    IllegalParameter,

    #[error("cas token mismatch")]
    CasMismatch,
}

pub type StorageResult<T> = Result<T, StorageError>;
