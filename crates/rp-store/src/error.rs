use rp_types::RestorePointId;

/// Errors from restore point store operations.
///
/// A platform without persistent storage is not an error; see
/// [`Handle::Unavailable`](crate::session::Handle::Unavailable).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The database reported a failure. The enclosing transaction was rolled
    /// back, so the operation had no partial effect.
    #[error("transaction failed: {0}")]
    Transaction(#[from] rusqlite::Error),

    /// The requested restore point has no row in the named table.
    #[error("restore point {id} has no {table} record")]
    NotFound {
        id: RestorePointId,
        table: &'static str,
    },

    /// Attempted to store a project that has no assets.
    #[error("there are no assets in this project")]
    EmptyProject,

    /// The on-disk schema was written by a newer build.
    #[error("database schema version {found} is newer than supported version {supported}")]
    SchemaTooNew { found: i64, supported: i64 },

    /// I/O error while preparing the database location.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The blocking database task panicked or was cancelled.
    #[error("database task failed: {0}")]
    TaskJoin(String),

    /// A previous database task panicked while holding the connection.
    #[error("database connection lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    pub fn not_found(id: RestorePointId, table: &'static str) -> Self {
        Self::NotFound { id, table }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
