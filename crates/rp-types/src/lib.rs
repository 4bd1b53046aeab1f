//! Foundation types for the restore point store.
//!
//! Every other `rp-*` crate depends on `rp-types`. Nothing in here touches
//! storage; these are the values that flow between the database layer, the
//! archive codec and the document runtime boundary.
//!
//! # Key Types
//!
//! - [`RestorePointId`]: store-assigned, monotonically increasing identifier
//! - [`RestorePointKind`]: provenance of a snapshot (automatic or manual)
//! - [`AssetId`]: content-addressed asset name shared across snapshots
//! - [`Metadata`]: the per-snapshot record, with a never-failing codec
//! - [`Thumbnail`] / [`StageSize`]: captured preview image and its dimensions
//! - [`UnixSeconds`]: wall-clock creation time

pub mod asset;
pub mod error;
pub mod metadata;
pub mod restore_point;
pub mod temporal;
pub mod thumbnail;

pub use asset::AssetId;
pub use error::TypeError;
pub use metadata::Metadata;
pub use restore_point::{RestorePoint, RestorePointId, RestorePointKind};
pub use temporal::UnixSeconds;
pub use thumbnail::{StageSize, Thumbnail};

/// Archive/file-map entry name holding the serialized document.
pub const PROJECT_JSON: &str = "project.json";
