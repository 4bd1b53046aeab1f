//! Referential garbage collection.
//!
//! Shared asset blobs are not reference counted on disk. Instead, after any
//! metadata deletion, the live set is recomputed from the surviving metadata
//! records and everything outside it is removed. Recomputing from scratch means
//! an interrupted sequence cannot leave counts drifting; the next mutating call
//! simply cleans up whatever is orphaned.

use std::collections::HashSet;

use rusqlite::Connection;
use serde::Serialize;
use tracing::debug;

use crate::error::StoreResult;
use crate::schema::{PROJECT_TABLE, THUMBNAIL_TABLE};
use crate::tables;

/// Result of garbage collection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct GcReport {
    pub projects_removed: usize,
    pub assets_removed: usize,
    pub thumbnails_removed: usize,
    pub bytes_freed: u64,
}

impl GcReport {
    pub fn is_empty(&self) -> bool {
        self.projects_removed == 0 && self.assets_removed == 0 && self.thumbnails_removed == 0
    }
}

/// Ids and asset ids still referenced by surviving metadata.
#[derive(Debug, Default)]
struct LiveSet {
    restore_points: HashSet<i64>,
    assets: HashSet<String>,
}

fn live_set(conn: &Connection) -> StoreResult<LiveSet> {
    let mut live = LiveSet::default();
    for (id, metadata) in tables::metadata_newest_first(conn)? {
        live.restore_points.insert(id.as_row_id());
        live.assets
            .extend(metadata.assets.into_keys().map(String::from));
    }
    Ok(live)
}

/// Delete every project, thumbnail and asset row not referenced by a
/// surviving metadata record.
///
/// Must run inside the read-write transaction that performed the deletions.
pub fn collect_garbage(conn: &Connection) -> StoreResult<GcReport> {
    let live = live_set(conn)?;
    let mut report = GcReport::default();

    for (id, size) in tables::row_sizes(conn, PROJECT_TABLE)? {
        if !live.restore_points.contains(&id) && tables::delete_row(conn, PROJECT_TABLE, id)? {
            report.projects_removed += 1;
            report.bytes_freed += size;
        }
    }

    for (id, size) in tables::asset_sizes(conn)? {
        if !live.assets.contains(&id) && tables::delete_asset(conn, &id)? {
            report.assets_removed += 1;
            report.bytes_freed += size;
        }
    }

    for (id, size) in tables::row_sizes(conn, THUMBNAIL_TABLE)? {
        if !live.restore_points.contains(&id) && tables::delete_row(conn, THUMBNAIL_TABLE, id)? {
            report.thumbnails_removed += 1;
            report.bytes_freed += size;
        }
    }

    debug!(
        projects = report.projects_removed,
        assets = report.assets_removed,
        thumbnails = report.thumbnails_removed,
        bytes = report.bytes_freed,
        "referential gc complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{self, ASSET_TABLE};
    use rp_types::{AssetId, Metadata, Thumbnail};

    fn conn() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        schema::migrate(&mut conn).unwrap();
        conn
    }

    fn insert_point(conn: &Connection, assets: &[&str]) -> rp_types::RestorePointId {
        let mut metadata = Metadata::default();
        for name in assets {
            let id = AssetId::new(*name).unwrap();
            if !tables::asset_exists(conn, &id).unwrap() {
                tables::insert_asset(conn, &id, name.as_bytes()).unwrap();
            }
            metadata.assets.insert(id, name.len() as u64);
        }
        let id = tables::insert_metadata(conn, &metadata).unwrap();
        tables::insert_project(conn, id, b"{}").unwrap();
        tables::insert_thumbnail(conn, id, &Thumbnail::png(vec![1, 2, 3])).unwrap();
        id
    }

    #[test]
    fn nothing_to_collect() {
        let conn = conn();
        insert_point(&conn, &["a.png"]);
        assert!(collect_garbage(&conn).unwrap().is_empty());
    }

    #[test]
    fn exclusive_assets_go_shared_assets_stay() {
        let conn = conn();
        let first = insert_point(&conn, &["shared.png", "only-first.png"]);
        insert_point(&conn, &["shared.png", "only-second.wav"]);

        tables::delete_metadata(&conn, first).unwrap();
        let report = collect_garbage(&conn).unwrap();

        assert_eq!(report.projects_removed, 1);
        assert_eq!(report.thumbnails_removed, 1);
        assert_eq!(report.assets_removed, 1);
        assert_eq!(report.bytes_freed, 2 + 3 + "only-first.png".len() as u64);

        let shared = AssetId::new("shared.png").unwrap();
        assert!(tables::asset_exists(&conn, &shared).unwrap());
        assert!(!tables::asset_exists(&conn, &AssetId::new("only-first.png").unwrap()).unwrap());
        assert!(tables::read_project(&conn, first).unwrap().is_none());
        assert!(tables::read_thumbnail(&conn, first).unwrap().is_none());
    }

    #[test]
    fn orphans_without_any_metadata_are_removed() {
        let conn = conn();
        // Rows left behind by an interrupted write.
        tables::insert_project(&conn, rp_types::RestorePointId::new(77), b"{}").unwrap();
        tables::insert_asset(&conn, &AssetId::new("stray.png").unwrap(), b"x").unwrap();

        let report = collect_garbage(&conn).unwrap();
        assert_eq!(report.projects_removed, 1);
        assert_eq!(report.assets_removed, 1);
        assert_eq!(tables::count(&conn, PROJECT_TABLE).unwrap(), 0);
        assert_eq!(tables::count(&conn, ASSET_TABLE).unwrap(), 0);
    }

    #[test]
    fn metadata_referencing_missing_asset_is_tolerated() {
        let conn = conn();
        let mut metadata = Metadata::default();
        metadata.assets.insert(AssetId::new("gone.png").unwrap(), 10);
        let id = tables::insert_metadata(&conn, &metadata).unwrap();
        tables::insert_project(&conn, id, b"{}").unwrap();

        let report = collect_garbage(&conn).unwrap();
        assert!(report.is_empty());
        assert!(tables::read_project(&conn, id).unwrap().is_some());
    }
}
