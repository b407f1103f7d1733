use crate::prelude::DbKey;
use galaxy_hashes::Hash;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("key {0} not found in store")]
    KeyNotFound(DbKey),

    #[error("key {0} already exists in store")]
    KeyAlreadyExists(String),

    /// Specialization of key already exists for the common `Hash` case.
    /// Added for avoiding the `String` allocation
    #[error("hash {0} already exists in store")]
    HashAlreadyExists(Hash),

    #[error("data inconsistency: {0}")]
    DataInconsistency(String),

    #[error("rocksdb error {0}")]
    DbError(#[from] rocksdb::Error),

    #[error("bincode error {0}")]
    DeserializationError(#[from] Box<bincode::ErrorKind>),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

pub trait StoreResultExt<T> {
    /// Maps `KeyNotFound` to `Ok(None)` and any value to `Ok(Some(value))`
    fn optional(self) -> StoreResult<Option<T>>;
}

impl<T> StoreResultExt<T> for StoreResult<T> {
    fn optional(self) -> StoreResult<Option<T>> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(StoreError::KeyNotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

pub trait StoreResultUnitExt {
    /// Treats a duplicate write as success
    fn idempotent(self) -> StoreResult<()>;
}

impl StoreResultUnitExt for StoreResult<()> {
    fn idempotent(self) -> StoreResult<()> {
        match self {
            Ok(()) | Err(StoreError::KeyAlreadyExists(_)) | Err(StoreError::HashAlreadyExists(_)) => Ok(()),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_and_idempotent() {
        let missing: StoreResult<u32> = Err(StoreError::KeyNotFound(DbKey::prefix_only(&[1])));
        assert!(missing.optional().unwrap().is_none());
        let found: StoreResult<u32> = Ok(3);
        assert_eq!(found.optional().unwrap(), Some(3));

        let dup: StoreResult<()> = Err(StoreError::HashAlreadyExists(Hash::from_u64_word(1)));
        assert!(dup.idempotent().is_ok());
        let inconsistent: StoreResult<()> = Err(StoreError::DataInconsistency("x".to_string()));
        assert!(inconsistent.idempotent().is_err());
    }
}
