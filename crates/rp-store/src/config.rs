use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name of the restore point database inside its directory.
pub const DATABASE_FILE: &str = "restore_points.sqlite3";

/// File name used by the previous storage generation. It lives next to
/// [`DATABASE_FILE`] and is deleted best-effort on startup.
pub const LEGACY_DATABASE_FILE: &str = "autosave.sqlite3";

/// Application directory created under the platform data directory.
pub const APP_DIR: &str = "restore-points";

/// Where the restore point database lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageLocation {
    /// A SQLite file at this path (parent directories are created).
    File(PathBuf),
    /// A private in-memory database, gone when the process exits.
    InMemory,
    /// No persistent storage on this platform; the feature degrades to no-ops.
    Unavailable,
}

impl StorageLocation {
    /// Location under the platform data directory, or `Unavailable` when the
    /// platform does not report one.
    pub fn platform_default() -> Self {
        match dirs_next::data_dir() {
            Some(dir) => Self::File(dir.join(APP_DIR).join(DATABASE_FILE)),
            None => Self::Unavailable,
        }
    }

    /// Path of the legacy database for this location, if it is file-backed.
    pub fn legacy_path(&self) -> Option<PathBuf> {
        match self {
            Self::File(path) => path.parent().map(|dir| dir.join(LEGACY_DATABASE_FILE)),
            Self::InMemory | Self::Unavailable => None,
        }
    }
}

/// Configuration for the restore point store.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub location: StorageLocation,
    /// How long SQLite waits on a locked database before failing.
    pub busy_timeout: Duration,
}

impl StoreConfig {
    pub fn at(path: impl AsRef<Path>) -> Self {
        Self {
            location: StorageLocation::File(path.as_ref().to_path_buf()),
            ..Self::default()
        }
    }

    pub fn in_memory() -> Self {
        Self {
            location: StorageLocation::InMemory,
            ..Self::default()
        }
    }

    pub fn unavailable() -> Self {
        Self {
            location: StorageLocation::Unavailable,
            ..Self::default()
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            location: StorageLocation::platform_default(),
            busy_timeout: Duration::from_secs(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_path_is_sibling() {
        let loc = StorageLocation::File(PathBuf::from("/data/restore-points/restore_points.sqlite3"));
        assert_eq!(
            loc.legacy_path(),
            Some(PathBuf::from("/data/restore-points/autosave.sqlite3"))
        );
        assert_eq!(StorageLocation::InMemory.legacy_path(), None);
        assert_eq!(StorageLocation::Unavailable.legacy_path(), None);
    }

    #[test]
    fn constructors() {
        assert_eq!(StoreConfig::in_memory().location, StorageLocation::InMemory);
        assert_eq!(StoreConfig::unavailable().location, StorageLocation::Unavailable);
        assert_eq!(
            StoreConfig::at("/tmp/x.sqlite3").location,
            StorageLocation::File(PathBuf::from("/tmp/x.sqlite3"))
        );
        assert_eq!(StoreConfig::default().busy_timeout, Duration::from_secs(10));
    }
}
