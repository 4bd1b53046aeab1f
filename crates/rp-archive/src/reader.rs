use std::collections::BTreeMap;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use tracing::debug;
use zip::ZipArchive;

use rp_types::{AssetId, PROJECT_JSON};

use crate::entry::EntryName;
use crate::error::{ArchiveError, ArchiveResult};
use crate::writer::ArchiveWriter;

/// Decoded contents of a restore point archive.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProjectArchive {
    pub project_json: Vec<u8>,
    pub assets: BTreeMap<AssetId, Vec<u8>>,
}

impl ProjectArchive {
    pub fn new(project_json: Vec<u8>) -> Self {
        Self {
            project_json,
            assets: BTreeMap::new(),
        }
    }

    pub fn with_asset(mut self, id: AssetId, data: Vec<u8>) -> Self {
        self.assets.insert(id, data);
        self
    }

    /// Read an archive from any seekable reader.
    ///
    /// Directory entries are skipped. Every file must be `project.json` or a
    /// valid asset id.
    pub fn from_reader<R: Read + Seek>(reader: R) -> ArchiveResult<Self> {
        let mut archive = ZipArchive::new(reader)?;
        let mut project_json = None;
        let mut assets = BTreeMap::new();

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            let name = EntryName::parse(entry.name())?;
            let mut data = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut data)?;

            match name {
                EntryName::Project => {
                    if project_json.replace(data).is_some() {
                        return Err(ArchiveError::DuplicateEntry(PROJECT_JSON.to_string()));
                    }
                }
                EntryName::Asset(id) => {
                    if assets.contains_key(&id) {
                        return Err(ArchiveError::DuplicateEntry(id.to_string()));
                    }
                    assets.insert(id, data);
                }
            }
        }

        let project_json = project_json.ok_or(ArchiveError::MissingProject)?;
        debug!(assets = assets.len(), "read restore point archive");
        Ok(Self {
            project_json,
            assets,
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> ArchiveResult<Self> {
        Self::from_reader(Cursor::new(bytes))
    }

    pub fn open(path: &Path) -> ArchiveResult<Self> {
        Self::from_reader(std::fs::File::open(path)?)
    }

    /// Encode as a deflate zip: `project.json` first, then assets by id.
    pub fn to_bytes(&self) -> ArchiveResult<Vec<u8>> {
        let mut writer = ArchiveWriter::new();
        writer.add_project(&self.project_json)?;
        for (id, data) in &self.assets {
            writer.add_asset(id, data)?;
        }
        writer.finish()
    }

    /// Total uncompressed size of every entry.
    pub fn size(&self) -> u64 {
        self.assets
            .values()
            .map(|data| data.len() as u64)
            .sum::<u64>()
            + self.project_json.len() as u64
    }
}
