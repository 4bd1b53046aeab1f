use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::PROJECT_JSON;

/// Content-addressed identifier for a binary asset.
///
/// An `AssetId` has the shape `<content-hash>.<format>` (for example
/// `"9f2c...e1.png"`). Identical content always produces the same id, which is
/// what lets two restore points share one stored asset blob. The same string
/// doubles as the entry name inside an exported archive, so ids that could
/// escape an archive or shadow `project.json` are rejected.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AssetId(String);

impl AssetId {
    /// Validate and wrap an asset id.
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        if id.is_empty()
            || id == PROJECT_JSON
            || id.contains('/')
            || id.contains('\\')
            || id.starts_with('.')
        {
            return Err(TypeError::InvalidAssetId(id));
        }
        Ok(Self(id))
    }

    /// Derive the id for `data` stored in the given format (file extension).
    pub fn derive(data: &[u8], format: &str) -> Self {
        let hash = hex::encode(&blake3::hash(data).as_bytes()[..16]);
        Self(format!("{hash}.{format}"))
    }

    /// Build the id a document runtime asks for as `(asset id, data format)`.
    pub fn from_parts(asset_id: &str, format: &str) -> Result<Self, TypeError> {
        Self::new(format!("{asset_id}.{format}"))
    }

    /// The content-hash part (everything before the last `.`).
    pub fn stem(&self) -> &str {
        self.0.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(&self.0)
    }

    /// The data format (extension), if any.
    pub fn format(&self) -> Option<&str> {
        self.0.rsplit_once('.').map(|(_, ext)| ext)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssetId({})", self.0)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AssetId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for AssetId {
    type Error = TypeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AssetId> for String {
    fn from(id: AssetId) -> Self {
        id.0
    }
}

impl AsRef<str> for AssetId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_is_deterministic() {
        let a = AssetId::derive(b"pixels", "png");
        let b = AssetId::derive(b"pixels", "png");
        assert_eq!(a, b);
        assert!(a.as_str().ends_with(".png"));
    }

    #[test]
    fn different_content_produces_different_ids() {
        assert_ne!(
            AssetId::derive(b"one", "png"),
            AssetId::derive(b"two", "png")
        );
    }

    #[test]
    fn stem_and_format() {
        let id = AssetId::new("abc123.svg").unwrap();
        assert_eq!(id.stem(), "abc123");
        assert_eq!(id.format(), Some("svg"));

        let bare = AssetId::new("noext").unwrap();
        assert_eq!(bare.stem(), "noext");
        assert_eq!(bare.format(), None);
    }

    #[test]
    fn from_parts_joins_with_dot() {
        let id = AssetId::from_parts("abc123", "wav").unwrap();
        assert_eq!(id.as_str(), "abc123.wav");
    }

    #[test]
    fn rejects_unsafe_names() {
        assert!(AssetId::new("").is_err());
        assert!(AssetId::new(PROJECT_JSON).is_err());
        assert!(AssetId::new("../etc/passwd").is_err());
        assert!(AssetId::new("dir\\file.png").is_err());
        assert!(AssetId::new(".hidden").is_err());
    }

    #[test]
    fn serde_rejects_invalid() {
        let ok: AssetId = serde_json::from_str("\"a.png\"").unwrap();
        assert_eq!(ok.as_str(), "a.png");
        assert!(serde_json::from_str::<AssetId>("\"a/b.png\"").is_err());
    }
}
