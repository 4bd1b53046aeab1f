use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid asset id: {0:?}")]
    InvalidAssetId(String),

    #[error("invalid restore point id: {0:?}")]
    InvalidRestorePointId(String),

    #[error("unknown restore point kind: {0}")]
    UnknownKind(i64),
}
