use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("lock already held: {0}")]
    LockAlreadyHeld(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

impl From<StorageError> for buildforge_core::Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(id) => buildforge_core::Error::NotFound(id),
            StorageError::LockAlreadyHeld(key) => buildforge_core::Error::LockAlreadyHeld(key),
            StorageError::Backend(msg) => buildforge_core::Error::Internal(msg),
        }
    }
}
