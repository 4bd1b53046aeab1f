//! Table layout and in-place schema upgrades.
//!
//! The schema version lives in SQLite's `user_version` pragma. Each migration
//! step only adds structure, so upgrading never touches existing rows.

use rusqlite::{Connection, TransactionBehavior};
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};

pub const META_TABLE: &str = "meta";
pub const PROJECT_TABLE: &str = "projects";
pub const ASSET_TABLE: &str = "assets";
pub const THUMBNAIL_TABLE: &str = "thumbnails";

/// All four tables, in the order a full wipe clears them.
pub const ALL_TABLES: [&str; 4] = [META_TABLE, PROJECT_TABLE, ASSET_TABLE, THUMBNAIL_TABLE];

/// Version written by this build.
pub const SCHEMA_VERSION: i64 = 2;

/// `(version, ddl)` pairs; a database at version `v` applies every step above `v`.
///
/// `AUTOINCREMENT` on `meta` keeps ids from ever being reused, even after the
/// newest rows are deleted.
const MIGRATIONS: &[(i64, &str)] = &[
    (
        1,
        r#"
        CREATE TABLE IF NOT EXISTS meta (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            record TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS projects (
            id INTEGER PRIMARY KEY,
            data BLOB NOT NULL
        );
        CREATE TABLE IF NOT EXISTS assets (
            id TEXT PRIMARY KEY,
            data BLOB NOT NULL
        );
        "#,
    ),
    (
        2,
        r#"
        CREATE TABLE IF NOT EXISTS thumbnails (
            id INTEGER PRIMARY KEY,
            mime_type TEXT NOT NULL,
            data BLOB NOT NULL
        );
        "#,
    ),
];

/// Read the schema version recorded in the database.
pub fn current_version(conn: &Connection) -> StoreResult<i64> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

/// Bring the database up to [`SCHEMA_VERSION`]. Returns the version found.
pub fn migrate(conn: &mut Connection) -> StoreResult<i64> {
    let found = current_version(conn)?;
    if found > SCHEMA_VERSION {
        return Err(StoreError::SchemaTooNew {
            found,
            supported: SCHEMA_VERSION,
        });
    }
    if found == SCHEMA_VERSION {
        debug!(version = found, "restore point schema up to date");
        return Ok(found);
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    for (version, ddl) in MIGRATIONS.iter().filter(|(v, _)| *v > found) {
        tx.execute_batch(ddl)?;
        debug!(version, "applied restore point schema step");
    }
    tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    tx.commit()?;

    info!(from = found, to = SCHEMA_VERSION, "upgraded restore point schema");
    Ok(found)
}

#[cfg(test)]
pub(crate) fn apply_up_to(conn: &Connection, version: i64) -> StoreResult<()> {
    for (_, ddl) in MIGRATIONS.iter().filter(|(v, _)| *v <= version) {
        conn.execute_batch(ddl)?;
    }
    conn.pragma_update(None, "user_version", version)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::params;

    fn table_exists(conn: &Connection, name: &str) -> bool {
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![name],
            |row| row.get::<_, i64>(0),
        )
        .unwrap()
            == 1
    }

    #[test]
    fn fresh_database_gets_all_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert_eq!(migrate(&mut conn).unwrap(), 0);
        assert_eq!(current_version(&conn).unwrap(), SCHEMA_VERSION);
        for table in ALL_TABLES {
            assert!(table_exists(&conn, table), "missing {table}");
        }
    }

    #[test]
    fn migrate_is_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        assert_eq!(migrate(&mut conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn version_one_upgrades_without_losing_rows() {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_up_to(&conn, 1).unwrap();
        assert!(!table_exists(&conn, THUMBNAIL_TABLE));
        conn.execute("INSERT INTO meta (record) VALUES (?1)", params!["{\"title\":\"old\"}"])
            .unwrap();
        conn.execute("INSERT INTO assets (id, data) VALUES ('a.png', x'00')", [])
            .unwrap();

        assert_eq!(migrate(&mut conn).unwrap(), 1);

        assert!(table_exists(&conn, THUMBNAIL_TABLE));
        let record: String = conn
            .query_row("SELECT record FROM meta", [], |row| row.get(0))
            .unwrap();
        assert_eq!(record, "{\"title\":\"old\"}");
        let assets: i64 = conn
            .query_row("SELECT COUNT(*) FROM assets", [], |row| row.get(0))
            .unwrap();
        assert_eq!(assets, 1);
    }

    #[test]
    fn newer_schema_is_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", SCHEMA_VERSION + 1).unwrap();
        let err = migrate(&mut conn).unwrap_err();
        assert!(matches!(err, StoreError::SchemaTooNew { found: 3, supported: 2 }));
    }
}
