use std::fmt;

use rp_types::{AssetId, PROJECT_JSON};

use crate::error::{ArchiveError, ArchiveResult};

/// What a file inside a restore point archive holds, decided by its name.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum EntryName {
    /// `project.json`, the serialized document.
    Project,
    /// An asset blob named by its id.
    Asset(AssetId),
}

impl EntryName {
    pub fn parse(name: &str) -> ArchiveResult<Self> {
        if name == PROJECT_JSON {
            return Ok(Self::Project);
        }
        AssetId::new(name)
            .map(Self::Asset)
            .map_err(|source| ArchiveError::InvalidEntry {
                name: name.to_string(),
                source,
            })
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Project => PROJECT_JSON,
            Self::Asset(id) => id.as_str(),
        }
    }
}

impl fmt::Display for EntryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
