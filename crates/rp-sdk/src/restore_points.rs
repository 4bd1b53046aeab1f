//! The restore point API: snapshot, export, load, list and delete.

use std::sync::Arc;

use async_trait::async_trait;
use base64::prelude::{Engine as _, BASE64_STANDARD};
use tracing::{debug, info, warn};

use rp_archive::ArchiveWriter;
use rp_store::{GcReport, Listing, NewRestorePoint, PruneReport, RestorePointStore};
use rp_types::{RestorePointId, RestorePointKind, Thumbnail, UnixSeconds};

use crate::config::SdkConfig;
use crate::error::{SdkError, SdkResult};
use crate::runtime::{
    Asset, AssetRequest, AssetResolver, DocumentRuntime, ResolverId, RuntimeError, RuntimeResult,
};
use crate::thumbnail::capture_thumbnail;

/// An exported restore point, ready to be saved as a project file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportedRestorePoint {
    pub title: String,
    /// Deflate zip with `project.json` and one entry per asset.
    pub archive: Vec<u8>,
}

/// Serves a restore point's assets out of the asset table while it loads.
struct StoreAssetResolver {
    store: RestorePointStore,
}

#[async_trait]
impl AssetResolver for StoreAssetResolver {
    async fn load(&self, request: &AssetRequest) -> RuntimeResult<Asset> {
        let id = request.storage_id()?;
        let data = self
            .store
            .asset(&id)
            .await
            .map_err(|e| RuntimeError::AssetUnavailable {
                name: id.to_string(),
                reason: e.to_string(),
            })?
            .ok_or_else(|| RuntimeError::MissingAsset(id.to_string()))?;
        Ok(Asset {
            asset_type: request.asset_type,
            id,
            data,
        })
    }
}

/// Keeps a resolver registered for as long as it is alive.
struct ResolverGuard<'a> {
    runtime: &'a dyn DocumentRuntime,
    id: ResolverId,
}

impl<'a> ResolverGuard<'a> {
    fn install(runtime: &'a dyn DocumentRuntime, resolver: Arc<dyn AssetResolver>, priority: i32) -> Self {
        let id = runtime.register_asset_resolver(resolver, priority);
        Self { runtime, id }
    }
}

impl Drop for ResolverGuard<'_> {
    fn drop(&mut self) {
        if !self.runtime.unregister_asset_resolver(self.id) {
            debug!(resolver = self.id.0, "restore point resolver was already removed");
        }
    }
}

/// Restore point operations against one store.
#[derive(Clone, Debug)]
pub struct RestorePoints {
    store: RestorePointStore,
    config: SdkConfig,
}

impl RestorePoints {
    pub fn new(store: RestorePointStore) -> Self {
        Self::with_config(store, SdkConfig::default())
    }

    pub fn with_config(store: RestorePointStore, config: SdkConfig) -> Self {
        Self { store, config }
    }

    /// Restore points in the process-wide store.
    pub fn shared() -> Self {
        Self::new(RestorePointStore::shared())
    }

    pub fn store(&self) -> &RestorePointStore {
        &self.store
    }

    pub fn config(&self) -> &SdkConfig {
        &self.config
    }

    /// Snapshot the live document.
    ///
    /// Returns `None` when no storage backend is available. Retention runs
    /// after the snapshot commits; if it fails the error is returned but the
    /// snapshot stays.
    pub async fn create_snapshot(
        &self,
        runtime: &dyn DocumentRuntime,
        title: &str,
        kind: RestorePointKind,
    ) -> SdkResult<Option<RestorePointId>> {
        let files = runtime.serialize_to_files().await?;
        if files.asset_count() == 0 {
            return Err(SdkError::EmptyProject);
        }
        let (project_json, assets) = files.into_parts()?;

        if !self.store.is_available().await? {
            debug!(%title, "restore points unavailable; snapshot skipped");
            return Ok(None);
        }

        let stage = runtime.current_dimensions();
        let thumbnail = capture_thumbnail(runtime, self.config.thumbnail_wait).await?;

        let point = NewRestorePoint {
            title: title.to_string(),
            kind,
            created: UnixSeconds::now(),
            project_json,
            assets,
            thumbnail,
            stage,
        };
        let id = self.store.create(point).await?;

        let report = self.store.prune().await?;
        if !report.evicted.is_empty() {
            debug!(evicted = report.evicted.len(), "retention after snapshot");
        }
        Ok(id)
    }

    /// Package a restore point as a project archive.
    ///
    /// Assets the restore point lists but the store no longer holds are left
    /// out of the archive.
    pub async fn export_snapshot(&self, id: RestorePointId) -> SdkResult<ExportedRestorePoint> {
        let snapshot = self.store.read_snapshot(id).await?;
        let missing = snapshot.missing_assets();
        if !missing.is_empty() {
            warn!(%id, missing = missing.len(), "exporting restore point without missing assets");
        }

        let mut writer = ArchiveWriter::new();
        writer.add_project(&snapshot.project_json)?;
        for (asset_id, data) in &snapshot.assets {
            writer.add_asset(asset_id, data)?;
        }
        let archive = writer.finish()?;

        info!(%id, bytes = archive.len(), assets = snapshot.assets.len(), "exported restore point");
        Ok(ExportedRestorePoint {
            title: snapshot.metadata.title,
            archive,
        })
    }

    /// Replace the live document with a restore point.
    ///
    /// The live document is untouched if the restore point does not exist.
    /// While loading, the store's asset table is consulted at
    /// [`SdkConfig::resolver_priority`]; that resolver is removed again
    /// however the load ends.
    pub async fn load_snapshot(&self, id: RestorePointId, runtime: &dyn DocumentRuntime) -> SdkResult<()> {
        let metadata = self.store.metadata(id).await?;
        let project_json = self.store.project(id).await?;

        let resolver = Arc::new(StoreAssetResolver {
            store: self.store.clone(),
        });
        let _guard = ResolverGuard::install(runtime, resolver, self.config.resolver_priority);
        runtime.discard_and_load(project_json).await?;

        info!(%id, title = %metadata.title, "loaded restore point");
        Ok(())
    }

    /// Every restore point, newest first, with the total storage used.
    pub async fn list_all(&self) -> SdkResult<Listing> {
        Ok(self.store.list().await?)
    }

    pub async fn thumbnail(&self, id: RestorePointId) -> SdkResult<Thumbnail> {
        Ok(self.store.thumbnail(id).await?)
    }

    /// The thumbnail as a `data:` URL.
    pub async fn thumbnail_url(&self, id: RestorePointId) -> SdkResult<String> {
        let thumbnail = self.thumbnail(id).await?;
        Ok(format!(
            "data:{};base64,{}",
            thumbnail.mime_type,
            BASE64_STANDARD.encode(&thumbnail.data)
        ))
    }

    pub async fn delete_one(&self, id: RestorePointId) -> SdkResult<GcReport> {
        Ok(self.store.delete(id).await?)
    }

    pub async fn delete_all(&self) -> SdkResult<()> {
        Ok(self.store.delete_all().await?)
    }

    pub async fn prune(&self) -> SdkResult<PruneReport> {
        Ok(self.store.prune().await?)
    }

    pub async fn collect_garbage(&self) -> SdkResult<GcReport> {
        Ok(self.store.collect_garbage().await?)
    }
}
