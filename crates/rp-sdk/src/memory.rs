//! In-process document runtime.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;

use rp_types::{AssetId, StageSize, Thumbnail, PROJECT_JSON};

use crate::config::BUILTIN_RESOLVER_PRIORITY;
use crate::runtime::{
    Asset, AssetRequest, AssetResolver, DocumentRuntime, ProjectFiles, ResolverId, RuntimeError,
    RuntimeResult,
};

const PNG_SIGNATURE: &[u8; 8] = b"\x89PNG\r\n\x1a\n";

/// When [`MemoryDocument`] draws frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RenderMode {
    /// Frames are drawn continuously; thumbnail requests are answered at once.
    #[default]
    Running,
    /// No frame is drawn until [`DocumentRuntime::force_render`] is called.
    Idle,
    /// Nothing is ever drawn.
    Frozen,
}

/// Serves assets bundled with the runtime itself. Always registered at
/// [`BUILTIN_RESOLVER_PRIORITY`] and not affected by loading a project.
#[derive(Debug, Default)]
struct LibraryResolver {
    assets: Mutex<BTreeMap<AssetId, Vec<u8>>>,
}

#[async_trait]
impl AssetResolver for LibraryResolver {
    async fn load(&self, request: &AssetRequest) -> RuntimeResult<Asset> {
        let id = request.storage_id()?;
        let data = lock(&self.assets)
            .get(&id)
            .cloned()
            .ok_or_else(|| RuntimeError::MissingAsset(id.to_string()))?;
        Ok(Asset {
            asset_type: request.asset_type,
            id,
            data,
        })
    }
}

struct Registration {
    id: ResolverId,
    priority: i32,
    resolver: Arc<dyn AssetResolver>,
}

#[derive(Default)]
struct DocumentState {
    project_json: Vec<u8>,
    assets: BTreeMap<AssetId, Vec<u8>>,
    stage: StageSize,
    render_mode: RenderMode,
    pending: Vec<oneshot::Sender<Thumbnail>>,
    frames: u64,
}

/// A document held entirely in memory.
///
/// Loading a project walks its JSON for asset references (`md5ext`, or an
/// `assetId` + `dataFormat` pair) and fetches each one through the resolver
/// chain, highest priority first.
pub struct MemoryDocument {
    state: Mutex<DocumentState>,
    resolvers: Mutex<Vec<Registration>>,
    next_resolver: AtomicU64,
    library: Arc<LibraryResolver>,
}

impl MemoryDocument {
    pub fn new() -> Self {
        let library = Arc::new(LibraryResolver::default());
        let doc = Self {
            state: Mutex::new(DocumentState::default()),
            resolvers: Mutex::new(Vec::new()),
            next_resolver: AtomicU64::new(1),
            library: Arc::clone(&library),
        };
        doc.register_asset_resolver(library, BUILTIN_RESOLVER_PRIORITY);
        doc
    }

    /// A document already holding `project_json` and `assets`, as if loaded.
    pub fn with_project(project_json: Vec<u8>, assets: BTreeMap<AssetId, Vec<u8>>) -> Self {
        let doc = Self::new();
        {
            let mut state = lock(&doc.state);
            state.project_json = project_json;
            state.assets = assets;
        }
        doc
    }

    pub fn set_stage(&self, stage: StageSize) {
        lock(&self.state).stage = stage;
    }

    pub fn set_render_mode(&self, mode: RenderMode) {
        lock(&self.state).render_mode = mode;
    }

    /// Bundle an asset with the runtime; it stays available across loads.
    pub fn add_library_asset(&self, id: AssetId, data: Vec<u8>) {
        lock(&self.library.assets).insert(id, data);
    }

    pub fn project_json(&self) -> Vec<u8> {
        lock(&self.state).project_json.clone()
    }

    pub fn assets(&self) -> BTreeMap<AssetId, Vec<u8>> {
        lock(&self.state).assets.clone()
    }

    /// Priorities of the registered resolvers, highest first.
    pub fn resolver_priorities(&self) -> Vec<i32> {
        let mut priorities: Vec<i32> = lock(&self.resolvers).iter().map(|r| r.priority).collect();
        priorities.sort_unstable_by(|a, b| b.cmp(a));
        priorities
    }

    pub fn frames_rendered(&self) -> u64 {
        lock(&self.state).frames
    }

    pub fn pending_thumbnails(&self) -> usize {
        lock(&self.state).pending.len()
    }

    /// Resolvers ordered by descending priority, registration order on ties.
    fn resolver_chain(&self) -> Vec<Arc<dyn AssetResolver>> {
        let resolvers = lock(&self.resolvers);
        let mut chain: Vec<&Registration> = resolvers.iter().collect();
        chain.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.id.cmp(&b.id)));
        chain.into_iter().map(|r| Arc::clone(&r.resolver)).collect()
    }

    async fn resolve(chain: &[Arc<dyn AssetResolver>], id: &AssetId) -> RuntimeResult<Vec<u8>> {
        let request = AssetRequest::for_id(id);
        let mut failure = None;
        for resolver in chain {
            match resolver.load(&request).await {
                Ok(asset) => return Ok(asset.data),
                Err(RuntimeError::MissingAsset(_)) => {}
                Err(e) => {
                    failure.get_or_insert(e);
                }
            }
        }
        Err(failure.unwrap_or_else(|| RuntimeError::MissingAsset(id.to_string())))
    }

    fn render(state: &mut DocumentState) {
        state.frames += 1;
        let frame = frame_image(&state.project_json, state.stage);
        for reply in state.pending.drain(..) {
            let _ = reply.send(frame.clone());
        }
    }
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("MemoryDocument")
            .field("project_bytes", &state.project_json.len())
            .field("assets", &state.assets.len())
            .field("render_mode", &state.render_mode)
            .finish()
    }
}

#[async_trait]
impl DocumentRuntime for MemoryDocument {
    async fn serialize_to_files(&self) -> RuntimeResult<ProjectFiles> {
        let state = lock(&self.state);
        let mut files = ProjectFiles::new();
        files.insert(PROJECT_JSON, state.project_json.clone());
        for (id, data) in &state.assets {
            files.insert(id.as_str(), data.clone());
        }
        Ok(files)
    }

    fn current_dimensions(&self) -> StageSize {
        lock(&self.state).stage
    }

    fn request_thumbnail(&self, reply: oneshot::Sender<Thumbnail>) {
        let mut state = lock(&self.state);
        state.pending.push(reply);
        if state.render_mode == RenderMode::Running {
            Self::render(&mut state);
        }
    }

    fn force_render(&self) {
        let mut state = lock(&self.state);
        if state.render_mode != RenderMode::Frozen {
            Self::render(&mut state);
        }
    }

    async fn discard_and_load(&self, project_json: Vec<u8>) -> RuntimeResult<()> {
        {
            let mut state = lock(&self.state);
            state.project_json.clear();
            state.assets.clear();
        }

        let parsed: Value = serde_json::from_slice(&project_json)
            .map_err(|e| RuntimeError::InvalidProject(e.to_string()))?;
        let mut names = BTreeSet::new();
        collect_asset_names(&parsed, &mut names);

        let chain = self.resolver_chain();
        let mut assets = BTreeMap::new();
        for name in names {
            let id = AssetId::new(name)?;
            let data = Self::resolve(&chain, &id).await?;
            assets.insert(id, data);
        }

        debug!(assets = assets.len(), resolvers = chain.len(), "loaded project");
        let mut state = lock(&self.state);
        state.project_json = project_json;
        state.assets = assets;
        Ok(())
    }

    fn register_asset_resolver(&self, resolver: Arc<dyn AssetResolver>, priority: i32) -> ResolverId {
        let id = ResolverId(self.next_resolver.fetch_add(1, Ordering::SeqCst));
        lock(&self.resolvers).push(Registration {
            id,
            priority,
            resolver,
        });
        id
    }

    fn unregister_asset_resolver(&self, id: ResolverId) -> bool {
        let mut resolvers = lock(&self.resolvers);
        let before = resolvers.len();
        resolvers.retain(|r| r.id != id);
        resolvers.len() != before
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Walk a project for asset file names.
fn collect_asset_names(value: &Value, names: &mut BTreeSet<String>) {
    match value {
        Value::Object(obj) => {
            if let Some(Value::String(md5ext)) = obj.get("md5ext") {
                names.insert(md5ext.clone());
            } else if let (Some(Value::String(id)), Some(Value::String(format))) =
                (obj.get("assetId"), obj.get("dataFormat"))
            {
                names.insert(format!("{id}.{format}"));
            }
            for child in obj.values() {
                collect_asset_names(child, names);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_asset_names(item, names);
            }
        }
        _ => {}
    }
}

/// Deterministic stand-in for a rendered frame: a PNG signature followed by
/// the stage size and a digest of the project.
fn frame_image(project_json: &[u8], stage: StageSize) -> Thumbnail {
    let mut data = PNG_SIGNATURE.to_vec();
    data.extend_from_slice(&stage.width.to_be_bytes());
    data.extend_from_slice(&stage.height.to_be_bytes());
    data.extend_from_slice(&blake3::hash(project_json).as_bytes()[..16]);
    Thumbnail::png(data)
}
