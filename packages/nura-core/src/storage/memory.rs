/// In-memory key-value backend.
///
/// Holds values for the lifetime of the process only. Fault switches let
/// callers reproduce a disabled store or a full quota.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use super::{KeyValueBackend, StorageError};

#[derive(Default)]
pub struct MemoryBackend {
    values: RwLock<HashMap<String, String>>,
    unavailable: AtomicBool,
    quota_bytes: RwLock<Option<u64>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a raw value, bypassing fault switches.
    pub fn insert_raw(&self, key: &str, value: &str) {
        self.values
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.to_string());
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.values
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn set_quota(&self, quota_bytes: Option<u64>) {
        *self.quota_bytes.write().unwrap_or_else(|e| e.into_inner()) = quota_bytes;
    }

    fn check_available(&self) -> Result<(), StorageError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("memory backend disabled".to_string()));
        }
        Ok(())
    }
}

impl KeyValueBackend for MemoryBackend {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.check_available()?;
        Ok(self.raw(key))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check_available()?;
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        if let Some(limit) = *self.quota_bytes.read().unwrap_or_else(|e| e.into_inner()) {
            let others: u64 = values
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(_, v)| v.len() as u64)
                .sum();
            let size = others + value.len() as u64;
            if size > limit {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                    size,
                    limit,
                });
            }
        }
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.check_available()?;
        self.values
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let backend = MemoryBackend::new();
        assert!(backend.read("k").unwrap().is_none());
        backend.write("k", "v").unwrap();
        assert_eq!(backend.read("k").unwrap().as_deref(), Some("v"));
        backend.remove("k").unwrap();
        assert!(backend.read("k").unwrap().is_none());
    }

    #[test]
    fn test_unavailable() {
        let backend = MemoryBackend::new();
        backend.insert_raw("k", "v");
        backend.set_unavailable(true);
        assert!(matches!(backend.read("k"), Err(StorageError::Unavailable(_))));
        assert!(backend.write("k", "w").is_err());
        backend.set_unavailable(false);
        assert_eq!(backend.read("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn test_quota() {
        let backend = MemoryBackend::new();
        backend.set_quota(Some(4));
        backend.write("a", "12").unwrap();
        assert!(matches!(
            backend.write("b", "123"),
            Err(StorageError::QuotaExceeded { size: 5, limit: 4, .. })
        ));
        assert!(backend.raw("b").is_none());
    }
}
