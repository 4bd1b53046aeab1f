use serde::{Deserialize, Serialize};

/// Default stage dimensions, used when a metadata record does not say.
pub const DEFAULT_STAGE_WIDTH: u32 = 480;
pub const DEFAULT_STAGE_HEIGHT: u32 = 360;

/// Width and height of the document's render surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSize {
    pub width: u32,
    pub height: u32,
}

impl StageSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for StageSize {
    fn default() -> Self {
        Self::new(DEFAULT_STAGE_WIDTH, DEFAULT_STAGE_HEIGHT)
    }
}

/// A captured preview image of the document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thumbnail {
    /// MIME type of `data`, e.g. `image/png`.
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl Thumbnail {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    pub fn png(data: Vec<u8>) -> Self {
        Self::new("image/png", data)
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}
