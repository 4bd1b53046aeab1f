use std::time::Duration;

/// Priority of the runtime's own in-memory asset resolver.
pub const BUILTIN_RESOLVER_PRIORITY: i32 = 100;

/// Priority of the remote asset fetcher, consulted last.
pub const REMOTE_RESOLVER_PRIORITY: i32 = -100;

/// Priority of the temporary resolver installed while loading a restore
/// point: after the in-memory cache, before any remote fetch.
pub const RESTORE_POINT_RESOLVER_PRIORITY: i32 = 50;

/// Tunables of the snapshot and load pipelines.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SdkConfig {
    /// How long to wait for a rendered frame before forcing one, and again
    /// after forcing it.
    pub thumbnail_wait: Duration,
    /// Priority of the restore point asset resolver during loads.
    pub resolver_priority: i32,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            thumbnail_wait: Duration::from_millis(100),
            resolver_priority: RESTORE_POINT_RESOLVER_PRIORITY,
        }
    }
}
