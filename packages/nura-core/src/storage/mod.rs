pub mod file;
pub mod memory;

/// Abstract durable key-value store backing the board state.
/// Implementations: FileBackend (one JSON file per key), MemoryBackend (tests, ephemeral sessions).
pub trait KeyValueBackend: Send + Sync {
    /// Read the raw string stored under `key`. `Ok(None)` when the key was never written.
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace the value stored under `key`.
    fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage backend unavailable: {0}")]
    Unavailable(String),

    #[error("Quota exceeded writing {key}: {size} bytes (limit {limit})")]
    QuotaExceeded { key: String, size: u64, limit: u64 },

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Keys end up as file names, so only a conservative character set is accepted.
pub(crate) fn validate_key(key: &str) -> Result<(), StorageError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        && !key.starts_with('.');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("nura-task-boards").is_ok());
        assert!(validate_key("active-board-id").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("../etc/passwd").is_err());
        assert!(validate_key(".hidden").is_err());
        assert!(validate_key("a/b").is_err());
    }
}
