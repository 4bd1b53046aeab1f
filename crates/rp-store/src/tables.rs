//! Row-level access to the four restore point tables.
//!
//! Every function takes a `&Connection`, so callers pass the transaction
//! they are running in (`Transaction` derefs to `Connection`). Nothing here
//! opens or commits a transaction on its own.

use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OptionalExtension};

use rp_types::{AssetId, Metadata, RestorePointId, Thumbnail};

use crate::error::StoreResult;

/// Decode a metadata row without ever failing on its content.
fn decode_record(value: ValueRef<'_>) -> Metadata {
    match value {
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Metadata::parse_str(&String::from_utf8_lossy(bytes))
        }
        ValueRef::Null | ValueRef::Integer(_) | ValueRef::Real(_) => Metadata::default(),
    }
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Insert a metadata record and return the id the database assigned.
pub fn insert_metadata(conn: &Connection, metadata: &Metadata) -> StoreResult<RestorePointId> {
    conn.execute(
        "INSERT INTO meta (record) VALUES (?1)",
        params![metadata.to_json_string()],
    )?;
    Ok(RestorePointId::from_row_id(conn.last_insert_rowid()))
}

pub fn read_metadata(conn: &Connection, id: RestorePointId) -> StoreResult<Option<Metadata>> {
    let record = conn
        .query_row(
            "SELECT record FROM meta WHERE id = ?1",
            params![id.as_row_id()],
            |row| Ok(decode_record(row.get_ref(0)?)),
        )
        .optional()?;
    Ok(record)
}

/// Every metadata record, newest first (descending id).
pub fn metadata_newest_first(conn: &Connection) -> StoreResult<Vec<(RestorePointId, Metadata)>> {
    let mut stmt = conn.prepare("SELECT id, record FROM meta ORDER BY id DESC")?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                RestorePointId::from_row_id(row.get(0)?),
                decode_record(row.get_ref(1)?),
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Delete a metadata record. Returns `true` if it existed.
///
/// Leaves the project, thumbnail and asset rows behind; run the referential
/// GC in the same transaction.
pub fn delete_metadata(conn: &Connection, id: RestorePointId) -> StoreResult<bool> {
    let changed = conn.execute("DELETE FROM meta WHERE id = ?1", params![id.as_row_id()])?;
    Ok(changed > 0)
}

// ---------------------------------------------------------------------------
// Projects
// ---------------------------------------------------------------------------

pub fn insert_project(conn: &Connection, id: RestorePointId, data: &[u8]) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO projects (id, data) VALUES (?1, ?2)",
        params![id.as_row_id(), data],
    )?;
    Ok(())
}

pub fn read_project(conn: &Connection, id: RestorePointId) -> StoreResult<Option<Vec<u8>>> {
    let data = conn
        .query_row(
            "SELECT data FROM projects WHERE id = ?1",
            params![id.as_row_id()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(data)
}

// ---------------------------------------------------------------------------
// Assets
// ---------------------------------------------------------------------------

pub fn asset_exists(conn: &Connection, id: &AssetId) -> StoreResult<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM assets WHERE id = ?1",
            params![id.as_str()],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Insert an asset blob. The caller must have checked [`asset_exists`]:
/// content-addressed rows are written once and never overwritten.
pub fn insert_asset(conn: &Connection, id: &AssetId, data: &[u8]) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO assets (id, data) VALUES (?1, ?2)",
        params![id.as_str(), data],
    )?;
    Ok(())
}

pub fn read_asset(conn: &Connection, id: &AssetId) -> StoreResult<Option<Vec<u8>>> {
    let data = conn
        .query_row(
            "SELECT data FROM assets WHERE id = ?1",
            params![id.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(data)
}

/// `(id, size)` of every stored asset.
pub fn asset_sizes(conn: &Connection) -> StoreResult<Vec<(String, u64)>> {
    let mut stmt = conn.prepare("SELECT id, length(data) FROM assets")?;
    let rows = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?.max(0) as u64))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn delete_asset(conn: &Connection, id: &str) -> StoreResult<bool> {
    let changed = conn.execute("DELETE FROM assets WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}

// ---------------------------------------------------------------------------
// Thumbnails
// ---------------------------------------------------------------------------

pub fn insert_thumbnail(conn: &Connection, id: RestorePointId, thumbnail: &Thumbnail) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO thumbnails (id, mime_type, data) VALUES (?1, ?2, ?3)",
        params![id.as_row_id(), thumbnail.mime_type, thumbnail.data],
    )?;
    Ok(())
}

pub fn read_thumbnail(conn: &Connection, id: RestorePointId) -> StoreResult<Option<Thumbnail>> {
    let thumbnail = conn
        .query_row(
            "SELECT mime_type, data FROM thumbnails WHERE id = ?1",
            params![id.as_row_id()],
            |row| Ok(Thumbnail::new(row.get::<_, String>(0)?, row.get(1)?)),
        )
        .optional()?;
    Ok(thumbnail)
}

// ---------------------------------------------------------------------------
// Id-keyed blob tables (projects, thumbnails)
// ---------------------------------------------------------------------------

/// `(id, size)` of every row in an id-keyed blob table.
pub fn row_sizes(conn: &Connection, table: &'static str) -> StoreResult<Vec<(i64, u64)>> {
    let mut stmt = conn.prepare(&format!("SELECT id, length(data) FROM {table}"))?;
    let rows = stmt
        .query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?.max(0) as u64))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn delete_row(conn: &Connection, table: &'static str, id: i64) -> StoreResult<bool> {
    let changed = conn.execute(&format!("DELETE FROM {table} WHERE id = ?1"), params![id])?;
    Ok(changed > 0)
}

/// Number of rows in a table.
pub fn count(conn: &Connection, table: &'static str) -> StoreResult<u64> {
    let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
    Ok(n.max(0) as u64)
}

/// Remove every row from every table.
pub fn clear_all(conn: &Connection) -> StoreResult<()> {
    for table in crate::schema::ALL_TABLES {
        conn.execute(&format!("DELETE FROM {table}"), [])?;
    }
    Ok(())
}
