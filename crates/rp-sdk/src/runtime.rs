//! Boundary between the restore point machinery and the live document.
//!
//! The document runtime owns the in-memory project, its renderer and its
//! asset loading chain. Restore points only ever talk to it through
//! [`DocumentRuntime`]; [`crate::MemoryDocument`] is the in-process
//! implementation used by the CLI and tests.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::oneshot;

use rp_types::{AssetId, StageSize, Thumbnail, TypeError, PROJECT_JSON};

#[derive(Debug, Error)]
pub enum RuntimeError {
    /// No resolver in the chain could supply the asset.
    #[error("asset {0} could not be loaded from any source")]
    MissingAsset(String),

    /// A resolver found the asset's source but failed to read it.
    #[error("loading asset {name}: {reason}")]
    AssetUnavailable { name: String, reason: String },

    #[error("invalid project: {0}")]
    InvalidProject(String),

    #[error("serialized project has no project.json entry")]
    MissingProjectJson,

    #[error("invalid asset name: {0}")]
    InvalidAssetName(#[from] TypeError),
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Broad category of an asset, decided by its file format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssetType {
    ImageVector,
    ImageBitmap,
    Sound,
    Font,
    Other,
}

impl AssetType {
    pub fn from_format(format: &str) -> Self {
        match format.to_ascii_lowercase().as_str() {
            "svg" => Self::ImageVector,
            "png" | "jpg" | "jpeg" | "gif" | "bmp" => Self::ImageBitmap,
            "wav" | "mp3" | "ogg" => Self::Sound,
            "ttf" | "otf" | "woff" | "woff2" => Self::Font,
            _ => Self::Other,
        }
    }
}

/// One asset the runtime needs while loading a project.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetRequest {
    pub asset_type: AssetType,
    /// Content hash part of the name, without the format.
    pub asset_id: String,
    pub data_format: String,
}

impl AssetRequest {
    pub fn new(asset_id: impl Into<String>, data_format: impl Into<String>) -> Self {
        let data_format = data_format.into();
        Self {
            asset_type: AssetType::from_format(&data_format),
            asset_id: asset_id.into(),
            data_format,
        }
    }

    /// Request for the asset stored under `id`.
    pub fn for_id(id: &AssetId) -> Self {
        Self::new(id.stem(), id.format().unwrap_or_default())
    }

    /// `<asset_id>.<data_format>`, the key assets are stored under.
    pub fn file_name(&self) -> String {
        if self.data_format.is_empty() {
            self.asset_id.clone()
        } else {
            format!("{}.{}", self.asset_id, self.data_format)
        }
    }

    pub fn storage_id(&self) -> RuntimeResult<AssetId> {
        Ok(AssetId::new(self.file_name())?)
    }
}

impl fmt::Display for AssetRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name())
    }
}

/// A loaded asset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Asset {
    pub asset_type: AssetType,
    pub id: AssetId,
    pub data: Vec<u8>,
}

/// One link in the runtime's asset loading chain.
#[async_trait]
pub trait AssetResolver: Send + Sync {
    async fn load(&self, request: &AssetRequest) -> RuntimeResult<Asset>;
}

/// Registration handle returned by [`DocumentRuntime::register_asset_resolver`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResolverId(pub u64);

/// The live document serialized to a flat file map.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProjectFiles {
    files: BTreeMap<String, Vec<u8>>,
}

impl ProjectFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, data: Vec<u8>) {
        self.files.insert(name.into(), data);
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.files.get(name).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Number of entries other than `project.json`.
    pub fn asset_count(&self) -> usize {
        self.files.keys().filter(|name| *name != PROJECT_JSON).count()
    }

    /// Split into the project JSON and the assets keyed by id.
    pub fn into_parts(mut self) -> RuntimeResult<(Vec<u8>, BTreeMap<AssetId, Vec<u8>>)> {
        let project = self
            .files
            .remove(PROJECT_JSON)
            .ok_or(RuntimeError::MissingProjectJson)?;
        let assets = self
            .files
            .into_iter()
            .map(|(name, data)| Ok((AssetId::new(name)?, data)))
            .collect::<RuntimeResult<BTreeMap<_, _>>>()?;
        Ok((project, assets))
    }
}

impl FromIterator<(String, Vec<u8>)> for ProjectFiles {
    fn from_iter<I: IntoIterator<Item = (String, Vec<u8>)>>(iter: I) -> Self {
        Self {
            files: iter.into_iter().collect(),
        }
    }
}

/// The live document runtime.
#[async_trait]
pub trait DocumentRuntime: Send + Sync {
    /// Serialize the current project to `project.json` plus one file per asset.
    async fn serialize_to_files(&self) -> RuntimeResult<ProjectFiles>;

    /// Current stage dimensions.
    fn current_dimensions(&self) -> StageSize;

    /// Ask for a snapshot of the next rendered frame. The sender is dropped
    /// unanswered if the runtime shuts down first.
    fn request_thumbnail(&self, reply: oneshot::Sender<Thumbnail>);

    /// Render a frame now, answering pending thumbnail requests.
    fn force_render(&self);

    /// Throw away the current project and load `project_json`, fetching its
    /// assets through the resolver chain.
    async fn discard_and_load(&self, project_json: Vec<u8>) -> RuntimeResult<()>;

    /// Add a resolver; higher priorities are consulted first.
    fn register_asset_resolver(&self, resolver: Arc<dyn AssetResolver>, priority: i32) -> ResolverId;

    /// Remove a resolver. Returns `false` if it was not registered.
    fn unregister_asset_resolver(&self, id: ResolverId) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_file_name_joins_format() {
        let request = AssetRequest::new("abc", "svg");
        assert_eq!(request.file_name(), "abc.svg");
        assert_eq!(request.asset_type, AssetType::ImageVector);
        assert_eq!(request.storage_id().unwrap().as_str(), "abc.svg");
    }

    #[test]
    fn request_for_id_splits_format() {
        let request = AssetRequest::for_id(&AssetId::new("83a9.wav").unwrap());
        assert_eq!(request.asset_id, "83a9");
        assert_eq!(request.data_format, "wav");
        assert_eq!(request.asset_type, AssetType::Sound);
    }

    #[test]
    fn into_parts_requires_project_json() {
        let files: ProjectFiles = [("a.png".to_string(), vec![1])].into_iter().collect();
        assert!(matches!(
            files.into_parts(),
            Err(RuntimeError::MissingProjectJson)
        ));
    }

    #[test]
    fn into_parts_separates_assets() {
        let files: ProjectFiles = [
            (PROJECT_JSON.to_string(), b"{}".to_vec()),
            ("a.png".to_string(), vec![1]),
        ]
        .into_iter()
        .collect();
        assert_eq!(files.asset_count(), 1);
        let (project, assets) = files.into_parts().unwrap();
        assert_eq!(project, b"{}");
        assert_eq!(assets.len(), 1);
    }
}
