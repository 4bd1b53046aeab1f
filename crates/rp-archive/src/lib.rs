//! Portable restore point archives.
//!
//! An exported restore point is a deflate-compressed zip holding the
//! serialized document as `project.json` plus one flat entry per asset,
//! named by its content-addressed id (`<hash>.<ext>`). The same layout is
//! read back by [`ProjectArchive::from_bytes`].
//!
//! - [`ArchiveWriter`]: streams entries into an in-memory zip
//! - [`ProjectArchive`]: decoded archive contents, and the reverse codec
//! - [`EntryName`]: classification of an entry by its name

pub mod entry;
pub mod error;
pub mod reader;
pub mod writer;

pub use entry::EntryName;
pub use error::{ArchiveError, ArchiveResult};
pub use reader::ProjectArchive;
pub use writer::ArchiveWriter;

#[cfg(test)]
mod tests {
    use super::*;
    use rp_types::AssetId;

    fn sample() -> ProjectArchive {
        ProjectArchive::new(br#"{"targets":[{"name":"Stage"}]}"#.to_vec())
            .with_asset(AssetId::derive(b"meow", "wav"), b"meow".to_vec())
            .with_asset(AssetId::derive(b"<svg/>", "svg"), b"<svg/>".to_vec())
    }

    #[test]
    fn archive_roundtrip_is_byte_identical() {
        let original = sample();
        let bytes = original.to_bytes().unwrap();
        assert_eq!(ProjectArchive::from_bytes(&bytes).unwrap(), original);
    }

    #[test]
    fn entries_are_deflated() {
        let bytes = sample().to_bytes().unwrap();
        let mut zip = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        for i in 0..zip.len() {
            let entry = zip.by_index(i).unwrap();
            assert_eq!(entry.compression(), zip::CompressionMethod::Deflated);
        }
        assert_eq!(zip.by_index(0).unwrap().name(), "project.json");
    }

    #[test]
    fn disk_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Game.sb3");

        let mut writer = ArchiveWriter::new();
        writer.add_project(b"{}").unwrap();
        writer
            .add_asset(&AssetId::new("a.png").unwrap(), b"png")
            .unwrap();
        let written = writer.finish_to_path(&path).unwrap();
        assert_eq!(written as u64, std::fs::metadata(&path).unwrap().len());

        let archive = ProjectArchive::open(&path).unwrap();
        assert_eq!(archive.assets.len(), 1);
    }
}
