//! Per-run scratch directory.
//!
//! Layout (not a stable format):
//!
//! ```text
//! hushcut-XXXXXX/
//!   chunk_000.mp4            segmenter output
//!   processed_chunk_000.mp4  edited chunk
//!   assembled.mp4            final output before publish
//!   adjusted_timestamps.txt  remapped events before publish
//! ```

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::MediaResult;

const DEFAULT_EXTENSION: &str = "mp4";

/// Scratch directory owned by one run. Removed on drop unless kept.
#[derive(Debug)]
pub struct ScratchDir {
    dir: TempDir,
    extension: String,
}

impl ScratchDir {
    /// Create a scratch directory under `parent`, or the system temp dir.
    ///
    /// Chunk files reuse the extension of `source` so stream copy keeps the
    /// original container.
    pub fn create(parent: Option<&Path>, source: &Path) -> MediaResult<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("hushcut-");
        let dir = match parent {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };

        let extension = source
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());

        debug!("Created scratch directory {}", dir.path().display());
        Ok(Self { dir, extension })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Segment pattern handed to the segmenter.
    pub fn chunk_pattern(&self) -> PathBuf {
        self.path().join(format!("chunk_%03d.{}", self.extension))
    }

    pub fn processed_chunk_path(&self, index: usize) -> PathBuf {
        self.path()
            .join(format!("processed_chunk_{:03}.{}", index, self.extension))
    }

    pub fn assembled_path(&self) -> PathBuf {
        self.path().join(format!("assembled.{}", self.extension))
    }

    pub fn adjusted_timestamps_path(&self) -> PathBuf {
        self.path().join("adjusted_timestamps.txt")
    }

    /// Remove the directory, or leave it on disk and return its path.
    pub fn finish(self, keep: bool) -> Option<PathBuf> {
        if keep {
            #[allow(deprecated)]
            let path = self.dir.into_path();
            debug!("Keeping scratch directory {}", path.display());
            return Some(path);
        }

        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            warn!("Failed to remove scratch directory {}: {}", path.display(), e);
        }
        None
    }
}
