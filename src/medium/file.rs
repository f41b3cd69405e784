//! File Medium
//!
//! One file per key inside a fixed cache directory. The file modification
//! time is the expiration clock.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::cache::validate_key;
use crate::error::{CacheError, Result};
use crate::medium::{Medium, StoredEntry};

/// Probe file used to check writability. The dash keeps it outside the key alphabet.
const WRITE_PROBE: &str = ".write-probe";

// == File Medium ==
/// Stores each item in `<dir>/<key>`.
///
/// Staleness is judged by file age against the pool's default lifetime, so
/// an item saved to never expire is still bounded by that lifetime here.
#[derive(Debug, Clone)]
pub struct FileMedium {
    dir: PathBuf,
}

impl FileMedium {
    // == Constructor ==
    /// Opens `dir` as a cache directory.
    ///
    /// # Errors
    /// `StorageUnavailable` when the directory is missing, is not a
    /// directory, or cannot be written to.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();

        let metadata = fs::metadata(&dir).map_err(|_| {
            CacheError::StorageUnavailable(format!(
                "cache directory {} does not exist",
                dir.display()
            ))
        })?;
        if !metadata.is_dir() {
            return Err(CacheError::StorageUnavailable(format!(
                "cache directory {} is not a directory",
                dir.display()
            )));
        }

        let probe = dir.join(WRITE_PROBE);
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&probe)
            .and_then(|_| fs::remove_file(&probe))
            .map_err(|err| {
                CacheError::StorageUnavailable(format!(
                    "cache directory {} is not writable: {}",
                    dir.display(),
                    err
                ))
            })?;

        info!("File medium ready at {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `.` and `..` pass key validation but cannot name a cache file, so
    /// they have no path: nothing is ever stored under them.
    fn path_for(&self, key: &str) -> Option<PathBuf> {
        match key {
            "." | ".." => None,
            _ => Some(self.dir.join(key)),
        }
    }
}

fn io_error(action: &str, path: &Path, err: io::Error) -> CacheError {
    CacheError::Storage(format!("{} {} failed: {}", action, path.display(), err))
}

impl Medium for FileMedium {
    fn name(&self) -> &'static str {
        "file"
    }

    fn read(&mut self, key: &str) -> Result<Option<StoredEntry>> {
        let Some(path) = self.path_for(key) else {
            return Ok(None);
        };
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(io_error("reading", &path, err)),
        };
        let modified = fs::metadata(&path)
            .and_then(|metadata| metadata.modified())
            .map_err(|err| io_error("stat of", &path, err))?;

        Ok(Some(StoredEntry::new(bytes, Some(DateTime::<Utc>::from(modified)))))
    }

    fn write(&mut self, key: &str, bytes: &[u8], _ttl: Option<Duration>) -> Result<()> {
        let path = self
            .path_for(key)
            .ok_or_else(|| CacheError::Storage(format!("key {} cannot name a file", key)))?;
        fs::write(&path, bytes).map_err(|err| io_error("writing", &path, err))?;
        debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        let Some(path) = self.path_for(key) else {
            return Ok(());
        };
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_error("removing", &path, err)),
        }
    }

    fn exists(&mut self, key: &str) -> Result<bool> {
        let Some(path) = self.path_for(key) else {
            return Ok(false);
        };
        match fs::metadata(&path) {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(io_error("stat of", &path, err)),
        }
    }

    /// Removes every regular file whose name is a valid key.
    fn clear(&mut self) -> Result<()> {
        let entries = fs::read_dir(&self.dir).map_err(|err| io_error("listing", &self.dir, err))?;
        for entry in entries {
            let entry = entry.map_err(|err| io_error("listing", &self.dir, err))?;
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            let is_key = entry
                .file_name()
                .to_str()
                .is_some_and(|name| validate_key(name).is_ok());
            if is_file && is_key {
                let path = entry.path();
                fs::remove_file(&path).map_err(|err| io_error("removing", &path, err))?;
            }
        }
        Ok(())
    }
}
