//! Output directory for highlighted copies

use crate::error::{Error, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Filename prefix of every highlighted copy
pub const OUTPUT_PREFIX: &str = "highlighted_";

/// Process-wide sequence, so two stores on the same directory never collide
static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Writes highlighted documents into one directory under unique names
#[derive(Debug, Clone)]
pub struct OutputStore {
    dir: PathBuf,
}

impl OutputStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `highlighted_<millis>_<sequence>_<random>.pdf`
    pub fn next_file_name(&self) -> String {
        let millis = chrono::Utc::now().timestamp_millis();
        let sequence = SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let random = uuid::Uuid::new_v4().simple().to_string();
        format!("{}{}_{}_{}.pdf", OUTPUT_PREFIX, millis, sequence, &random[..8])
    }

    /// Write `data` to a new file and return its absolute path.
    ///
    /// Creates the directory if needed. A file that fails mid-write is
    /// removed so no partial output survives an error.
    pub fn write(&self, data: &[u8]) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir).map_err(|source| Error::OutputWrite {
            path: self.dir.display().to_string(),
            source,
        })?;

        let dir = self.dir.canonicalize().map_err(|source| Error::OutputWrite {
            path: self.dir.display().to_string(),
            source,
        })?;
        let path = dir.join(self.next_file_name());

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|source| Error::OutputWrite {
                path: path.display().to_string(),
                source,
            })?;

        if let Err(source) = file.write_all(data).and_then(|_| file.sync_all()) {
            drop(file);
            if let Err(e) = std::fs::remove_file(&path) {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove partial output");
            }
            return Err(Error::OutputWrite {
                path: path.display().to_string(),
                source,
            });
        }

        tracing::debug!(path = %path.display(), bytes = data.len(), "wrote highlighted copy");
        Ok(path)
    }
}
