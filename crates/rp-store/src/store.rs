//! Async restore point store over the lazily opened session.
//!
//! Each public operation maps to exactly one database transaction. When the
//! session resolves to [`Handle::Unavailable`](crate::session::Handle::Unavailable) mutations succeed without doing
//! anything, listings are empty and reads of a specific restore point report
//! [`StoreError::NotFound`].

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use rp_types::{
    AssetId, Metadata, RestorePoint, RestorePointId, RestorePointKind, StageSize, Thumbnail,
    UnixSeconds,
};

use crate::error::{StoreError, StoreResult};
use crate::gc::{self, GcReport};
use crate::retention::{self, PruneReport, RetentionPolicy};
use crate::schema::{META_TABLE, PROJECT_TABLE, THUMBNAIL_TABLE};
use crate::session::{Database, Session};
use crate::tables;

/// Everything needed to write one restore point.
#[derive(Clone, Debug)]
pub struct NewRestorePoint {
    pub title: String,
    pub kind: RestorePointKind,
    pub created: UnixSeconds,
    pub project_json: Vec<u8>,
    pub assets: BTreeMap<AssetId, Vec<u8>>,
    pub thumbnail: Thumbnail,
    /// Stage dimensions at capture time, recorded as the thumbnail size.
    pub stage: StageSize,
}

impl NewRestorePoint {
    /// Metadata record describing this restore point.
    pub fn metadata(&self) -> Metadata {
        Metadata {
            title: self.title.clone(),
            created: self.created,
            kind: self.kind,
            project_size: self.project_json.len() as u64,
            thumbnail_size: self.thumbnail.size(),
            thumbnail_width: self.stage.width,
            thumbnail_height: self.stage.height,
            assets: self
                .assets
                .iter()
                .map(|(id, data)| (id.clone(), data.len() as u64))
                .collect(),
        }
    }
}

/// All restore points, newest first, with their combined storage footprint.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    /// Project and thumbnail bytes of every restore point, plus each distinct
    /// asset once.
    pub total_size: u64,
    pub restore_points: Vec<RestorePoint>,
}

impl Listing {
    fn from_records(records: Vec<(RestorePointId, Metadata)>) -> Self {
        let mut distinct_assets: HashMap<&AssetId, u64> = HashMap::new();
        let mut total_size = 0u64;
        for (_, metadata) in &records {
            total_size = total_size.saturating_add(metadata.own_size());
            for (id, size) in &metadata.assets {
                distinct_assets.insert(id, *size);
            }
        }
        total_size = distinct_assets
            .values()
            .fold(total_size, |acc, size| acc.saturating_add(*size));

        let restore_points = records
            .into_iter()
            .map(|(id, metadata)| RestorePoint { id, metadata })
            .collect();
        Self {
            total_size,
            restore_points,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.restore_points.is_empty()
    }
}

/// Everything persisted for one restore point, read in a single transaction.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredSnapshot {
    pub id: RestorePointId,
    pub metadata: Metadata,
    pub project_json: Vec<u8>,
    /// Assets listed in the metadata that are still present. Missing ones
    /// are skipped.
    pub assets: BTreeMap<AssetId, Vec<u8>>,
}

impl StoredSnapshot {
    /// Asset ids the metadata lists but the asset table no longer holds.
    pub fn missing_assets(&self) -> Vec<&AssetId> {
        self.metadata
            .assets
            .keys()
            .filter(|id| !self.assets.contains_key(*id))
            .collect()
    }
}

/// Handle to the restore point tables.
#[derive(Clone, Debug)]
pub struct RestorePointStore {
    session: Arc<Session>,
    policy: RetentionPolicy,
}

impl RestorePointStore {
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            policy: RetentionPolicy::default(),
        }
    }

    /// Store over the process-wide [`Session::shared`].
    pub fn shared() -> Self {
        Self::new(Session::shared())
    }

    pub fn with_policy(mut self, policy: RetentionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    /// Whether a persistent backend is available. Opens the session.
    pub async fn is_available(&self) -> StoreResult<bool> {
        Ok(self.session.open().await?.is_available())
    }

    async fn database(&self) -> StoreResult<Option<Database>> {
        Ok(self.session.open().await?.database().cloned())
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Persist a restore point in one transaction.
    ///
    /// Writes the metadata record first to obtain the id, then the project,
    /// then only the assets not already stored, then the thumbnail. Returns
    /// `None` when no backend is available.
    pub async fn create(&self, point: NewRestorePoint) -> StoreResult<Option<RestorePointId>> {
        if point.assets.is_empty() {
            return Err(StoreError::EmptyProject);
        }
        let Some(db) = self.database().await? else {
            debug!(title = %point.title, "store unavailable; restore point not written");
            return Ok(None);
        };

        let metadata = point.metadata();
        let title = point.title.clone();
        let (id, written, reused) = db
            .write(move |tx| {
                let id = tables::insert_metadata(tx, &metadata)?;
                tables::insert_project(tx, id, &point.project_json)?;

                let mut written = 0usize;
                let mut reused = 0usize;
                for (asset_id, data) in &point.assets {
                    if tables::asset_exists(tx, asset_id)? {
                        reused += 1;
                    } else {
                        tables::insert_asset(tx, asset_id, data)?;
                        written += 1;
                    }
                }

                tables::insert_thumbnail(tx, id, &point.thumbnail)?;
                Ok((id, written, reused))
            })
            .await?;

        info!(%id, %title, assets_written = written, assets_reused = reused, "created restore point");
        Ok(Some(id))
    }

    /// Apply the retention policy, then collect garbage, in one transaction.
    pub async fn prune(&self) -> StoreResult<PruneReport> {
        let Some(db) = self.database().await? else {
            return Ok(PruneReport::default());
        };
        let policy = self.policy;
        db.write(move |tx| retention::prune(tx, policy)).await
    }

    /// Delete one restore point and whatever only it referenced.
    ///
    /// Deleting an id that does not exist is not an error; the GC still runs.
    pub async fn delete(&self, id: RestorePointId) -> StoreResult<GcReport> {
        let Some(db) = self.database().await? else {
            return Ok(GcReport::default());
        };
        let (existed, report) = db
            .write(move |tx| {
                let existed = tables::delete_metadata(tx, id)?;
                Ok((existed, gc::collect_garbage(tx)?))
            })
            .await?;
        info!(%id, existed, bytes_freed = report.bytes_freed, "deleted restore point");
        Ok(report)
    }

    /// Remove every restore point and every blob.
    pub async fn delete_all(&self) -> StoreResult<()> {
        let Some(db) = self.database().await? else {
            return Ok(());
        };
        db.write(|tx| tables::clear_all(tx)).await?;
        info!("deleted all restore points");
        Ok(())
    }

    /// Standalone referential GC pass.
    pub async fn collect_garbage(&self) -> StoreResult<GcReport> {
        let Some(db) = self.database().await? else {
            return Ok(GcReport::default());
        };
        db.write(|tx| gc::collect_garbage(tx)).await
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Every restore point, newest first.
    pub async fn list(&self) -> StoreResult<Listing> {
        let Some(db) = self.database().await? else {
            return Ok(Listing::default());
        };
        let records = db.read(|tx| tables::metadata_newest_first(tx)).await?;
        Ok(Listing::from_records(records))
    }

    pub async fn metadata(&self, id: RestorePointId) -> StoreResult<Metadata> {
        let db = self.require(id, META_TABLE).await?;
        db.read(move |tx| {
            tables::read_metadata(tx, id)?.ok_or_else(|| StoreError::not_found(id, META_TABLE))
        })
        .await
    }

    pub async fn project(&self, id: RestorePointId) -> StoreResult<Vec<u8>> {
        let db = self.require(id, PROJECT_TABLE).await?;
        db.read(move |tx| {
            tables::read_project(tx, id)?.ok_or_else(|| StoreError::not_found(id, PROJECT_TABLE))
        })
        .await
    }

    pub async fn thumbnail(&self, id: RestorePointId) -> StoreResult<Thumbnail> {
        let db = self.require(id, THUMBNAIL_TABLE).await?;
        db.read(move |tx| {
            tables::read_thumbnail(tx, id)?
                .ok_or_else(|| StoreError::not_found(id, THUMBNAIL_TABLE))
        })
        .await
    }

    /// One asset blob, or `None` if it is not stored.
    pub async fn asset(&self, asset_id: &AssetId) -> StoreResult<Option<Vec<u8>>> {
        let Some(db) = self.database().await? else {
            return Ok(None);
        };
        let asset_id = asset_id.clone();
        db.read(move |tx| tables::read_asset(tx, &asset_id)).await
    }

    /// The stored subset of `ids`. Missing assets are skipped.
    pub async fn assets(&self, ids: Vec<AssetId>) -> StoreResult<BTreeMap<AssetId, Vec<u8>>> {
        let Some(db) = self.database().await? else {
            return Ok(BTreeMap::new());
        };
        db.read(move |tx| read_present_assets(tx, ids)).await
    }

    /// Metadata, project and present assets of one restore point.
    pub async fn read_snapshot(&self, id: RestorePointId) -> StoreResult<StoredSnapshot> {
        let db = self.require(id, META_TABLE).await?;
        db.read(move |tx| {
            let metadata = tables::read_metadata(tx, id)?
                .ok_or_else(|| StoreError::not_found(id, META_TABLE))?;
            let project_json = tables::read_project(tx, id)?
                .ok_or_else(|| StoreError::not_found(id, PROJECT_TABLE))?;
            let assets = read_present_assets(tx, metadata.assets.keys().cloned().collect())?;
            Ok(StoredSnapshot {
                id,
                metadata,
                project_json,
                assets,
            })
        })
        .await
    }

    /// The open database, or `NotFound` for `id` when no backend exists.
    async fn require(&self, id: RestorePointId, table: &'static str) -> StoreResult<Database> {
        self.database()
            .await?
            .ok_or_else(|| StoreError::not_found(id, table))
    }
}

fn read_present_assets(
    conn: &rusqlite::Connection,
    ids: Vec<AssetId>,
) -> StoreResult<BTreeMap<AssetId, Vec<u8>>> {
    let mut found = BTreeMap::new();
    for id in ids {
        if let Some(data) = tables::read_asset(conn, &id)? {
            found.insert(id, data);
        }
    }
    Ok(found)
}
