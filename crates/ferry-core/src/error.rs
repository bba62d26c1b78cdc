use crate::kind::ContentKind;
use thiserror::Error;

/// Result type for record store operations.
pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Clone, Error)]
pub enum CoreError {
    #[error("invalid {kind} code: {reason}")]
    InvalidCode { kind: ContentKind, reason: String },
    #[error("quota {0} is outside 1..=100")]
    InvalidQuota(i64),
}

/// Errors raised by record store backends.
///
/// `Conflict` is an invariant signal (a code is already held) and is retried
/// by the caller that mints codes. The remaining variants are transient
/// infrastructure failures or corrupted rows.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("code already exists: {0}")]
    Conflict(String),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("storage operation failed: {0}")]
    Operation(String),
}

impl StorageError {
    /// Whether the failure is transient and the request may be retried later.
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Unavailable(_) | StorageError::Timeout(_))
    }
}

/// Errors surfaced by the depot service.
///
/// Consumption outcomes (`NotFound`, `Expired`) are not errors; they are
/// reported through [`ConsumeOutcome`](crate::depot::ConsumeOutcome).
#[derive(Debug, Clone, Error)]
pub enum DepotError {
    #[error("no free {kind} code found after {attempts} attempts")]
    CodeSpaceExhausted { kind: ContentKind, attempts: u32 },
    #[error("content cannot be empty")]
    EmptyContent,
    #[error("payload i/o failed: {0}")]
    PayloadIo(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<std::io::Error> for DepotError {
    fn from(value: std::io::Error) -> Self {
        DepotError::PayloadIo(value.to_string())
    }
}
