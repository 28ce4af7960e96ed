use storage::StorageError;
use storage::models::SolveId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FirstBloodError>;

#[derive(Error, Debug)]
pub enum FirstBloodError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Solve {0} not found")]
    SolveNotFound(SolveId),
}

impl FirstBloodError {
    /// The unit of work lost a race and may be replayed from the start.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FirstBloodError::Storage(e) if e.is_serialization_failure())
    }
}
