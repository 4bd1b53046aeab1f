use thiserror::Error;

use rp_types::TypeError;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive has no project.json entry")]
    MissingProject,

    #[error("invalid archive entry {name:?}: {source}")]
    InvalidEntry {
        name: String,
        #[source]
        source: TypeError,
    },

    #[error("duplicate archive entry: {0}")]
    DuplicateEntry(String),
}

pub type ArchiveResult<T> = Result<T, ArchiveError>;
