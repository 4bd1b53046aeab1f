use thiserror::Error;

use rp_archive::ArchiveError;
use rp_store::StoreError;
use rp_types::RestorePointId;

use crate::runtime::RuntimeError;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("there are no assets in this project")]
    EmptyProject,

    #[error("restore point {0} does not exist")]
    NotFound(RestorePointId),

    #[error("no thumbnail was rendered within {waited_ms} ms, even after forcing a render")]
    ThumbnailTimeout { waited_ms: u64 },

    #[error("store error: {0}")]
    Store(StoreError),

    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("document runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}

impl From<StoreError> for SdkError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { id, .. } => Self::NotFound(id),
            StoreError::EmptyProject => Self::EmptyProject,
            other => Self::Store(other),
        }
    }
}

impl SdkError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub type SdkResult<T> = Result<T, SdkError>;
