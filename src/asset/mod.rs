//! Asset kinds, glob matching and the path registry.

mod glob;
mod kind;
mod registry;

pub use glob::{Glob, GlobError, normalize_path, to_slash};
pub use kind::AssetKind;
pub use registry::{PathRegistry, PathSpec};

use std::path::PathBuf;

/// One file flowing through a stage.
///
/// `path` is relative to the stage's base directory and is what transforms
/// rename; `source` stays the absolute path of the file that was read, so
/// errors and relative lookups refer to the real location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub path: PathBuf,
    pub source: PathBuf,
    pub contents: Vec<u8>,
}

impl Asset {
    pub fn new(path: impl Into<PathBuf>, source: impl Into<PathBuf>, contents: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            source: source.into(),
            contents,
        }
    }

    /// Contents as text, for text-based transforms.
    pub fn text(&self) -> Result<&str, crate::error::TransformError> {
        std::str::from_utf8(&self.contents).map_err(|_| crate::error::TransformError::NotUtf8)
    }

    pub fn with_text(self, text: String) -> Self {
        Self {
            contents: text.into_bytes(),
            ..self
        }
    }

    /// Lower-case extension of the current path.
    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
    }
}
