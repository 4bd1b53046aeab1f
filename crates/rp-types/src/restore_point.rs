use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;
use crate::metadata::Metadata;

/// Identifier of a restore point, assigned by the store when the metadata
/// record is inserted.
///
/// Ids increase monotonically and are never reused, so a higher id is always
/// a newer restore point. The same id keys the project and thumbnail tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RestorePointId(u64);

impl RestorePointId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    /// SQLite row ids are signed; store-assigned ids are always positive.
    pub fn from_row_id(row_id: i64) -> Self {
        Self(row_id.max(0) as u64)
    }

    pub fn as_row_id(self) -> i64 {
        i64::try_from(self.0).unwrap_or(i64::MAX)
    }
}

impl fmt::Display for RestorePointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RestorePointId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .trim_start_matches('#')
            .parse::<u64>()
            .map(Self)
            .map_err(|_| TypeError::InvalidRestorePointId(s.to_string()))
    }
}

/// Provenance of a restore point.
///
/// Only automatic restore points are subject to retention; manual ones are
/// kept until explicitly deleted. Persisted as the integer codes `0` and `1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RestorePointKind {
    /// Taken by the periodic timer.
    Automatic,
    /// Requested by the user.
    Manual,
}

impl RestorePointKind {
    pub const fn code(self) -> u8 {
        match self {
            Self::Automatic => 0,
            Self::Manual => 1,
        }
    }

    pub fn from_code(code: i64) -> Result<Self, TypeError> {
        match code {
            0 => Ok(Self::Automatic),
            1 => Ok(Self::Manual),
            other => Err(TypeError::UnknownKind(other)),
        }
    }

    pub fn is_automatic(self) -> bool {
        matches!(self, Self::Automatic)
    }
}

impl fmt::Display for RestorePointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Automatic => write!(f, "automatic"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

impl Serialize for RestorePointKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for RestorePointKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = i64::deserialize(deserializer)?;
        Self::from_code(code).map_err(serde::de::Error::custom)
    }
}

/// A listed restore point: its id plus the parsed metadata record.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RestorePoint {
    pub id: RestorePointId,
    #[serde(flatten)]
    pub metadata: Metadata,
}
