//! Lazily opened, process-wide database session.
//!
//! The first caller of [`Session::open`] opens the SQLite database and runs
//! schema migrations; everyone racing it waits on the same initialization and
//! receives the same [`Handle`]. Once set, the handle never changes. A failed
//! open is not cached, so the next caller retries.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use rusqlite::{Connection, Transaction, TransactionBehavior};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::config::{StorageLocation, StoreConfig};
use crate::error::{StoreError, StoreResult};
use crate::schema;

/// An open restore point database.
///
/// Cheap to clone; all clones share one connection. Work is shipped to the
/// blocking pool one transaction at a time.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl Database {
    fn new(conn: Connection, path: Option<PathBuf>) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        }
    }

    /// Path of the backing file, or `None` for an in-memory database.
    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }

    /// Run `f` inside a read-write transaction spanning every table.
    ///
    /// The transaction commits only if `f` returns `Ok`. Any error, panic or
    /// early return drops it, which rolls everything back.
    pub async fn write<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Transaction<'_>) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|_| StoreError::LockPoisoned)?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let out = f(&tx)?;
            tx.commit()?;
            Ok(out)
        })
        .await
        .map_err(|e| StoreError::TaskJoin(e.to_string()))?
    }

    /// Run `f` against a consistent read snapshot. Nothing is committed.
    pub async fn read<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Transaction<'_>) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|_| StoreError::LockPoisoned)?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
            f(&tx)
        })
        .await
        .map_err(|e| StoreError::TaskJoin(e.to_string()))?
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").field("path", &self.path).finish()
    }
}

/// Result of opening the session.
#[derive(Debug)]
pub enum Handle {
    Ready(Database),
    /// No persistent storage backend. Mutations and listings become no-ops.
    Unavailable,
}

impl Handle {
    pub fn database(&self) -> Option<&Database> {
        match self {
            Self::Ready(db) => Some(db),
            Self::Unavailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

/// Owner of the lazily opened database handle.
pub struct Session {
    config: StoreConfig,
    handle: OnceCell<Handle>,
    opens: AtomicUsize,
}

static SHARED: OnceLock<Arc<Session>> = OnceLock::new();

impl Session {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            handle: OnceCell::new(),
            opens: AtomicUsize::new(0),
        }
    }

    /// The process-wide session, configured from [`StoreConfig::default`].
    pub fn shared() -> Arc<Session> {
        Arc::clone(SHARED.get_or_init(|| Arc::new(Session::new(StoreConfig::default()))))
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Open the database on first use and return the cached handle.
    pub async fn open(&self) -> StoreResult<&Handle> {
        self.handle
            .get_or_try_init(|| async {
                self.opens.fetch_add(1, Ordering::SeqCst);
                open_handle(self.config.clone()).await
            })
            .await
    }

    /// Number of times the backend was actually opened (at most one success).
    pub fn open_attempts(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Delete the database file left by the previous storage generation.
    ///
    /// Best effort: every failure, including the file not existing, is ignored.
    pub fn delete_legacy_database(&self) {
        let Some(path) = self.config.location.legacy_path() else {
            return;
        };
        match std::fs::remove_file(&path) {
            Ok(()) => info!(path = %path.display(), "removed legacy restore point database"),
            Err(e) => debug!(path = %path.display(), error = %e, "legacy database not removed"),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("location", &self.config.location)
            .field("opened", &self.handle.initialized())
            .finish()
    }
}

async fn open_handle(config: StoreConfig) -> StoreResult<Handle> {
    let path = match &config.location {
        StorageLocation::Unavailable => {
            info!("no persistent storage available; restore points disabled");
            return Ok(Handle::Unavailable);
        }
        StorageLocation::InMemory => None,
        StorageLocation::File(path) => Some(path.clone()),
    };

    let busy_timeout = config.busy_timeout;
    let db = tokio::task::spawn_blocking(move || -> StoreResult<Database> {
        let mut conn = match &path {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                let conn = Connection::open(path)?;
                conn.pragma_update(None, "journal_mode", "WAL")?;
                conn
            }
            None => Connection::open_in_memory()?,
        };
        conn.busy_timeout(busy_timeout)?;
        schema::migrate(&mut conn)?;
        Ok(Database::new(conn, path))
    })
    .await
    .map_err(|e| StoreError::TaskJoin(e.to_string()))??;

    info!(path = ?db.path(), "opened restore point database");
    Ok(Handle::Ready(db))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LEGACY_DATABASE_FILE;

    #[tokio::test]
    async fn unavailable_location_yields_unavailable_handle() {
        let session = Session::new(StoreConfig::unavailable());
        let handle = session.open().await.unwrap();
        assert!(!handle.is_available());
        assert!(handle.database().is_none());
    }

    #[tokio::test]
    async fn open_is_cached() {
        let session = Session::new(StoreConfig::in_memory());
        let first = session.open().await.unwrap() as *const Handle;
        let second = session.open().await.unwrap() as *const Handle;
        assert_eq!(first, second);
        assert_eq!(session.open_attempts(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_opens_converge_on_one_handle() {
        let session = Arc::new(Session::new(StoreConfig::in_memory()));
        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let session = Arc::clone(&session);
                tokio::spawn(async move {
                    session.open().await.unwrap() as *const Handle as usize
                })
            })
            .collect();

        let mut addrs = Vec::new();
        for task in tasks {
            addrs.push(task.await.unwrap());
        }
        assert!(addrs.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(session.open_attempts(), 1);
    }

    #[tokio::test]
    async fn file_database_is_created_with_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("rp.sqlite3");
        let session = Session::new(StoreConfig::at(&path));
        let handle = session.open().await.unwrap();
        assert_eq!(handle.database().unwrap().path(), Some(&path));
        assert!(path.exists());
    }

    #[tokio::test]
    async fn failed_open_is_retried() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the parent directory should be makes the open fail.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();
        let session = Session::new(StoreConfig::at(blocker.join("rp.sqlite3")));
        assert!(matches!(session.open().await, Err(StoreError::Io(_))));
        assert!(session.open().await.is_err());
        assert_eq!(session.open_attempts(), 2);
    }

    #[tokio::test]
    async fn write_rolls_back_on_error() {
        let session = Session::new(StoreConfig::in_memory());
        let db = session.open().await.unwrap().database().unwrap().clone();

        let result: StoreResult<()> = db
            .write(|tx| {
                tx.execute("INSERT INTO meta (record) VALUES ('{}')", [])?;
                Err(StoreError::EmptyProject)
            })
            .await;
        assert!(matches!(result, Err(StoreError::EmptyProject)));

        let count: i64 = db
            .read(|tx| Ok(tx.query_row("SELECT COUNT(*) FROM meta", [], |r| r.get(0))?))
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn legacy_database_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let legacy = dir.path().join(LEGACY_DATABASE_FILE);
        std::fs::write(&legacy, b"old").unwrap();

        let session = Session::new(StoreConfig::at(dir.path().join("rp.sqlite3")));
        session.delete_legacy_database();
        assert!(!legacy.exists());

        // Missing file is ignored.
        session.delete_legacy_database();
    }

    #[test]
    fn legacy_cleanup_ignores_unavailable() {
        Session::new(StoreConfig::unavailable()).delete_legacy_database();
    }
}
