/// Filesystem key-value backend.
///
/// Stores each key as `<dir>/<key>.json` with:
/// - Atomic writes (write to .tmp, fsync, rename)
/// - Refusal to overwrite non-empty content with empty content
/// - Optional total byte quota across all keys
/// - SHA-256 fingerprints of the last write per key, so unchanged values skip the disk

use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use sha2::{Digest, Sha256};

use super::{validate_key, KeyValueBackend, StorageError};

const FILE_EXTENSION: &str = "json";

pub struct FileBackend {
    dir: PathBuf,
    quota_bytes: Option<u64>,
    /// key -> SHA-256 of the last content written by this process
    written: Mutex<HashMap<String, String>>,
    /// Serializes writes so quota accounting and rename stay consistent
    write_lock: Mutex<()>,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            quota_bytes: None,
            written: Mutex::new(HashMap::new()),
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_quota(mut self, quota_bytes: Option<u64>) -> Self {
        self.quota_bytes = quota_bytes;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", key, FILE_EXTENSION))
    }

    fn content_hash(content: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Bytes used by every stored key except `exclude`.
    fn used_bytes(&self, exclude: &Path) -> Result<u64, std::io::Error> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(e) => e,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };
        let mut total = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if path == exclude || path.extension().and_then(|e| e.to_str()) != Some(FILE_EXTENSION) {
                continue;
            }
            if let Ok(meta) = entry.metadata() {
                total += meta.len();
            }
        }
        Ok(total)
    }

    /// Atomic write with fsync: write to .tmp, fsync, rename, fsync directory.
    /// Refuses to write empty content over a non-empty file.
    fn atomic_write(path: &Path, content: &str) -> Result<(), std::io::Error> {
        if content.trim().is_empty() {
            if let Ok(existing) = fs::read_to_string(path) {
                if !existing.trim().is_empty() {
                    return Err(std::io::Error::new(
                        ErrorKind::InvalidInput,
                        "Refusing to overwrite non-empty value with empty content",
                    ));
                }
            }
        }

        let tmp_path = path.with_extension("nura.tmp");
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)?;

        if let Some(dir) = path.parent() {
            if let Ok(d) = fs::File::open(dir) {
                let _ = d.sync_all();
            }
        }
        Ok(())
    }
}

impl KeyValueBackend for FileBackend {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        validate_key(key)?;
        match fs::read_to_string(self.path_for(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let path = self.path_for(key);
        let hash = Self::content_hash(value);

        let unchanged = self
            .written
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .map_or(false, |h| *h == hash);
        if unchanged && path.exists() {
            log::trace!("[nura.storage.file] Skipping unchanged write for {}", key);
            return Ok(());
        }

        if let Some(limit) = self.quota_bytes {
            let size = self.used_bytes(&path)? + value.len() as u64;
            if size > limit {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                    size,
                    limit,
                });
            }
        }

        fs::create_dir_all(&self.dir)?;
        Self::atomic_write(&path, value)?;
        self.written
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), hash);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.written
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
