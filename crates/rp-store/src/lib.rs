//! Embedded restore point database.
//!
//! Restore points live in four SQLite tables correlated by a store-assigned
//! id: `meta` (one JSON metadata record per restore point), `projects` (the
//! serialized document), `thumbnails` (a preview image) and `assets` (binary
//! blobs keyed by content-addressed id and shared between restore points).
//!
//! # Layers
//!
//! - [`Session`] opens the database once, lazily, and migrates the schema
//! - [`tables`] holds row-level reads and writes against an open transaction
//! - [`retention`] decides which automatic restore points to evict
//! - [`gc`] removes blobs no surviving metadata record references
//! - [`RestorePointStore`] is the async API, one transaction per operation
//!
//! # Design Rules
//!
//! 1. A metadata record is written before anything keyed by its id.
//! 2. Asset blobs are written only when absent and never overwritten.
//! 3. Every path that deletes metadata runs the GC in the same transaction.
//! 4. Reading metadata never fails on row content; see [`rp_types::Metadata::parse`].
//! 5. A platform without storage degrades to no-ops instead of erroring.

pub mod config;
pub mod error;
pub mod gc;
pub mod retention;
pub mod schema;
pub mod session;
pub mod store;
pub mod tables;

pub use config::{StorageLocation, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use gc::GcReport;
pub use retention::{PruneReport, RetentionPlanner, RetentionPolicy};
pub use session::{Database, Handle, Session};
pub use store::{Listing, NewRestorePoint, RestorePointStore, StoredSnapshot};
