//! Ephemeral on-disk buffers for streamed log output.
//!
//! A [`CacheFile`] is written by a log source on a background task and read
//! by the pager at the same time. Only the session decides when it is
//! closed and removed; the file is also deleted on drop so a crashing
//! session does not leave files behind.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempPath;

use crate::error::CacheError;

/// Name prefix for every cache file, so live caches are easy to spot in the
/// temp directory.
pub const CACHE_PREFIX: &str = "dlog_";

/// Allocates fresh cache files.
pub trait CacheFactory: Send {
    /// Create a new, empty, uniquely named cache file.
    fn create(&self) -> Result<CacheFile, CacheError>;
}

/// Creates cache files in a directory (the system temp dir by default).
#[derive(Debug, Clone)]
pub struct TempCache {
    dir: PathBuf,
    prefix: String,
}

impl TempCache {
    /// Cache files in `dir` with the standard prefix.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            prefix: CACHE_PREFIX.to_string(),
        }
    }

    /// Override the file name prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Directory new caches are created in.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Default for TempCache {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

impl CacheFactory for TempCache {
    fn create(&self) -> Result<CacheFile, CacheError> {
        let (file, path) = tempfile::Builder::new()
            .prefix(&self.prefix)
            .tempfile_in(&self.dir)
            .map_err(|source| CacheError::Create {
                dir: self.dir.clone(),
                source,
            })?
            .into_parts();

        tracing::debug!("Created cache file {}", path.display());
        Ok(CacheFile::new(file, path))
    }
}

/// A cache buffer: one temp file plus the session's handle on it.
#[derive(Debug)]
pub struct CacheFile {
    file: Option<File>,
    path: Option<TempPath>,
    display: PathBuf,
}

impl CacheFile {
    fn new(file: File, path: TempPath) -> Self {
        let display = path.to_path_buf();
        Self {
            file: Some(file),
            path: Some(path),
            display,
        }
    }

    /// Path of the file on disk. Used to open it for reading and to delete it.
    pub fn path(&self) -> &Path {
        &self.display
    }

    /// Whether the session's handle is still open.
    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// An independent write handle for a log source.
    ///
    /// The returned handle is positioned at the end of the file and keeps
    /// working after [`close`](Self::close); removing the file is what ends
    /// the cache's life.
    pub fn writer(&self) -> Result<File, CacheError> {
        let file = self.file.as_ref().ok_or_else(|| CacheError::Closed {
            path: self.display.clone(),
        })?;
        file.try_clone().map_err(|source| CacheError::Writer {
            path: self.display.clone(),
            source,
        })
    }

    /// Release the session's handle. Calling it twice is harmless.
    pub fn close(&mut self) {
        self.file.take();
    }

    /// Delete the file from disk.
    pub fn remove(mut self) -> io::Result<()> {
        self.file.take();
        match self.path.take() {
            Some(path) => path.close(),
            None => Ok(()),
        }
    }
}

impl Drop for CacheFile {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            tracing::warn!(
                "Cache file {} dropped without remove(), deleting",
                self.display.display()
            );
            if let Err(e) = path.close() {
                tracing::error!("Failed to delete cache file {}: {}", self.display.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_create_uses_prefix_and_dir() {
        let dir = tempfile::tempdir().unwrap();
        let caches = TempCache::new(dir.path());

        let cache = caches.create().unwrap();
        let name = cache.path().file_name().unwrap().to_string_lossy().to_string();

        assert!(name.starts_with(CACHE_PREFIX), "unexpected name {name}");
        assert_eq!(cache.path().parent(), Some(dir.path()));
        assert!(cache.path().exists());
        cache.remove().unwrap();
    }

    #[test]
    fn test_names_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let caches = TempCache::new(dir.path());

        let a = caches.create().unwrap();
        let b = caches.create().unwrap();
        assert_ne!(a.path(), b.path());
        a.remove().unwrap();
        b.remove().unwrap();
    }

    #[test]
    fn test_writer_survives_close() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = TempCache::new(dir.path()).create().unwrap();

        let mut writer = cache.writer().unwrap();
        cache.close();
        assert!(!cache.is_open());
        writer.write_all(b"hello\n").unwrap();

        assert_eq!(std::fs::read_to_string(cache.path()).unwrap(), "hello\n");
        assert!(matches!(cache.writer(), Err(CacheError::Closed { .. })));
        cache.remove().unwrap();
    }

    #[test]
    fn test_remove_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TempCache::new(dir.path()).create().unwrap();
        let path = cache.path().to_path_buf();

        cache.remove().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_remove_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TempCache::new(dir.path()).create().unwrap();
        std::fs::remove_file(cache.path()).unwrap();

        assert!(cache.remove().is_err());
    }

    #[test]
    fn test_drop_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let cache = TempCache::new(dir.path()).create().unwrap();
            cache.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_create_fails_in_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let caches = TempCache::new(dir.path().join("missing"));

        assert!(matches!(caches.create(), Err(CacheError::Create { .. })));
    }
}
