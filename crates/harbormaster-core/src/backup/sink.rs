//! Where backup files end up.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Minimal file system surface used by backups. Paths are relative to the sink.
///
/// Calls may block. `BackupService` runs them on the blocking pool.
pub trait FileSink: Send + Sync {
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Create or truncate `path` and write `data` to it.
    fn write(&self, path: &Path, data: &[u8]) -> io::Result<()>;
}

/// Writes backups below a directory on the local disk.
#[derive(Debug, Clone)]
pub struct FsSink {
    root: PathBuf,
}

impl FsSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl FileSink for FsSink {
    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(self.root.join(path))
    }

    fn write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        fs::write(self.root.join(path), data)
    }
}
