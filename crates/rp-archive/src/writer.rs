use std::collections::BTreeSet;
use std::io::{Cursor, Write};
use std::path::Path;

use tracing::debug;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use rp_types::AssetId;

use crate::entry::EntryName;
use crate::error::{ArchiveError, ArchiveResult};

/// Builds a restore point archive in memory.
///
/// Every entry is deflate-compressed. Entry names must be unique; writing
/// the same name twice is an error rather than producing an archive with
/// shadowed entries.
pub struct ArchiveWriter {
    zip: ZipWriter<Cursor<Vec<u8>>>,
    options: FileOptions,
    written: BTreeSet<EntryName>,
}

impl ArchiveWriter {
    pub fn new() -> Self {
        Self {
            zip: ZipWriter::new(Cursor::new(Vec::new())),
            options: FileOptions::default().compression_method(CompressionMethod::Deflated),
            written: BTreeSet::new(),
        }
    }

    /// Add the serialized document as `project.json`.
    pub fn add_project(&mut self, project_json: &[u8]) -> ArchiveResult<()> {
        self.add_entry(EntryName::Project, project_json)
    }

    /// Add one asset, named by its id.
    pub fn add_asset(&mut self, id: &AssetId, data: &[u8]) -> ArchiveResult<()> {
        self.add_entry(EntryName::Asset(id.clone()), data)
    }

    fn add_entry(&mut self, name: EntryName, data: &[u8]) -> ArchiveResult<()> {
        if self.written.contains(&name) {
            return Err(ArchiveError::DuplicateEntry(name.to_string()));
        }
        self.zip.start_file(name.as_str(), self.options)?;
        self.zip.write_all(data)?;
        self.written.insert(name);
        Ok(())
    }

    /// Number of entries written so far.
    pub fn len(&self) -> usize {
        self.written.len()
    }

    pub fn is_empty(&self) -> bool {
        self.written.is_empty()
    }

    /// Finish the central directory and return the archive bytes.
    pub fn finish(mut self) -> ArchiveResult<Vec<u8>> {
        if !self.written.contains(&EntryName::Project) {
            return Err(ArchiveError::MissingProject);
        }
        let entries = self.written.len();
        let bytes = self.zip.finish()?.into_inner();
        debug!(entries, bytes = bytes.len(), "finished restore point archive");
        Ok(bytes)
    }

    /// Finish and write the archive to `path`.
    pub fn finish_to_path(self, path: &Path) -> ArchiveResult<usize> {
        let bytes = self.finish()?;
        std::fs::write(path, &bytes)?;
        Ok(bytes.len())
    }
}

impl Default for ArchiveWriter {
    fn default() -> Self {
        Self::new()
    }
}
