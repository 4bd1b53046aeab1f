//! Restore points for a live document.
//!
//! Ties the store (`rp-store`) and the archive codec (`rp-archive`) to a
//! running document through the [`DocumentRuntime`] boundary. This is the
//! main entry point for applications embedding restore points.
//!
//! - [`RestorePoints`]: snapshot, export, load, list and delete
//! - [`AutoSnapshot`]: timer that takes automatic snapshots
//! - [`Settings`]: the persisted snapshot interval
//! - [`MemoryDocument`]: in-process [`DocumentRuntime`]

pub mod auto;
pub mod config;
pub mod error;
pub mod memory;
pub mod restore_points;
pub mod runtime;
pub mod settings;
pub mod thumbnail;

pub use auto::{AutoSnapshot, TitleSource};
pub use config::SdkConfig;
pub use error::{SdkError, SdkResult};
pub use memory::{MemoryDocument, RenderMode};
pub use restore_points::{ExportedRestorePoint, RestorePoints};
pub use runtime::{
    Asset, AssetRequest, AssetResolver, AssetType, DocumentRuntime, ProjectFiles, ResolverId,
    RuntimeError, RuntimeResult,
};
pub use settings::{Settings, SnapshotInterval};

// Re-export key types
pub use rp_archive::ProjectArchive;
pub use rp_store::{GcReport, Listing, PruneReport, RestorePointStore, Session, StoreConfig};
pub use rp_types::{AssetId, Metadata, RestorePoint, RestorePointId, RestorePointKind, StageSize, Thumbnail};
