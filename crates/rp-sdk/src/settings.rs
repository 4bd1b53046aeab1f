//! Persisted restore point settings.
//!
//! Only the automatic snapshot interval is stored. Reading never fails: an
//! absent or unreadable file yields the default. Writing is best effort.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Interval used when nothing valid is stored: five minutes.
pub const DEFAULT_INTERVAL_MS: i64 = 5 * 60 * 1000;

/// Stored interval meaning automatic snapshots are turned off.
pub const DISABLED_INTERVAL_MS: i64 = -1;

pub const SETTINGS_FILE: &str = "settings.toml";

/// How often automatic snapshots are taken.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SnapshotInterval {
    Disabled,
    Every(Duration),
}

impl SnapshotInterval {
    /// Interpret a stored value. Anything below one millisecond disables
    /// automatic snapshots.
    pub fn from_millis(ms: i64) -> Self {
        if ms < 1 {
            Self::Disabled
        } else {
            Self::Every(Duration::from_millis(ms as u64))
        }
    }

    pub fn as_millis(&self) -> i64 {
        match self {
            Self::Disabled => DISABLED_INTERVAL_MS,
            Self::Every(period) => i64::try_from(period.as_millis()).unwrap_or(i64::MAX),
        }
    }

    pub fn period(&self) -> Option<Duration> {
        match self {
            Self::Disabled => None,
            Self::Every(period) => Some(*period),
        }
    }
}

impl Default for SnapshotInterval {
    fn default() -> Self {
        Self::from_millis(DEFAULT_INTERVAL_MS)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SettingsFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    interval_ms: Option<i64>,
    /// Keys written by other tools are carried through unchanged.
    #[serde(flatten)]
    other: toml::Table,
}

/// Location of the settings file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    path: Option<PathBuf>,
}

impl Settings {
    pub fn at(path: impl AsRef<Path>) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
        }
    }

    /// `<config dir>/restore-points/settings.toml`, or no file at all when
    /// the platform has no config directory.
    pub fn platform_default() -> Self {
        Self {
            path: dirs_next::config_dir().map(|dir| dir.join(rp_store::config::APP_DIR).join(SETTINGS_FILE)),
        }
    }

    /// Settings that are never persisted.
    pub fn ephemeral() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn load(&self) -> Option<SettingsFile> {
        let path = self.path.as_ref()?;
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "settings not read");
                return None;
            }
        };
        match toml::from_str(&content) {
            Ok(file) => Some(file),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring malformed settings");
                None
            }
        }
    }

    /// Stored interval, or the default when none is stored.
    pub fn read_interval(&self) -> SnapshotInterval {
        self.load()
            .and_then(|file| file.interval_ms)
            .map(SnapshotInterval::from_millis)
            .unwrap_or_default()
    }

    /// Persist `interval`. Failures are logged, not returned.
    pub fn set_interval(&self, interval: SnapshotInterval) {
        let Some(path) = &self.path else {
            return;
        };
        let mut file = self.load().unwrap_or_default();
        file.interval_ms = Some(interval.as_millis());

        let result = toml::to_string(&file)
            .map_err(|e| e.to_string())
            .and_then(|content| {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
                }
                std::fs::write(path, content).map_err(|e| e.to_string())
            });
        match result {
            Ok(()) => debug!(path = %path.display(), interval_ms = interval.as_millis(), "saved snapshot interval"),
            Err(error) => warn!(path = %path.display(), %error, "could not save snapshot interval"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_reads_default() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::at(dir.path().join("settings.toml"));
        assert_eq!(settings.read_interval(), SnapshotInterval::default());
        assert_eq!(settings.read_interval().as_millis(), 300_000);
    }

    #[test]
    fn interval_roundtrips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::at(dir.path().join("nested").join("settings.toml"));
        settings.set_interval(SnapshotInterval::from_millis(60_000));
        assert_eq!(settings.read_interval(), SnapshotInterval::Every(Duration::from_secs(60)));

        settings.set_interval(SnapshotInterval::Disabled);
        assert_eq!(settings.read_interval(), SnapshotInterval::Disabled);
        let raw = std::fs::read_to_string(settings.path().unwrap()).unwrap();
        assert!(raw.contains("interval_ms = -1"));
    }

    #[test]
    fn malformed_file_reads_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "interval_ms = \"soon\"").unwrap();
        assert_eq!(Settings::at(&path).read_interval(), SnapshotInterval::default());
    }

    #[test]
    fn unrelated_keys_survive_a_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "theme = \"dark\"\n").unwrap();
        Settings::at(&path).set_interval(SnapshotInterval::from_millis(1000));
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("theme = \"dark\""));
        assert!(raw.contains("interval_ms = 1000"));
    }

    #[test]
    fn unwritable_location_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();
        let settings = Settings::at(blocker.join("settings.toml"));
        settings.set_interval(SnapshotInterval::Disabled);
        assert_eq!(settings.read_interval(), SnapshotInterval::default());
    }

    #[test]
    fn ephemeral_settings_use_default() {
        let settings = Settings::ephemeral();
        settings.set_interval(SnapshotInterval::Disabled);
        assert_eq!(settings.read_interval(), SnapshotInterval::default());
    }

    #[test]
    fn non_positive_values_disable() {
        assert_eq!(SnapshotInterval::from_millis(-1), SnapshotInterval::Disabled);
        assert_eq!(SnapshotInterval::from_millis(0), SnapshotInterval::Disabled);
        assert_eq!(SnapshotInterval::Disabled.period(), None);
    }
}
