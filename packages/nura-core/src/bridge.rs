/// Persistent key-value bridge.
///
/// Typed, synchronous load/save of JSON values on top of a [`KeyValueBackend`].
/// Neither direction ever fails from the caller's point of view: faults are
/// logged and the in-memory value stays authoritative for the session.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::storage::KeyValueBackend;

#[derive(Clone)]
pub struct KvBridge {
    backend: Arc<dyn KeyValueBackend>,
}

impl KvBridge {
    pub fn new(backend: Arc<dyn KeyValueBackend>) -> Self {
        Self { backend }
    }

    /// Load the value under `key`, or `default` when it is missing or unreadable.
    pub fn load<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.load_or_else(key, || default)
    }

    /// Like [`load`](Self::load), but the default is only produced when needed.
    pub fn load_or_else<T, F>(&self, key: &str, default: F) -> T
    where
        T: DeserializeOwned,
        F: FnOnce() -> T,
    {
        let raw = match self.backend.read(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                log::debug!("[nura.bridge] No stored value for {}, using default", key);
                return default();
            }
            Err(e) => {
                log::error!("[nura.bridge] Failed to read {}: {}", key, e);
                return default();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                log::error!(
                    "[nura.bridge] Corrupt value for {} ({} bytes), using default: {}",
                    key,
                    raw.len(),
                    e
                );
                default()
            }
        }
    }

    /// Serialize `value` and store it under `key`. Failures are logged, not returned.
    pub fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                log::error!("[nura.bridge] Failed to serialize {}: {}", key, e);
                return;
            }
        };
        if let Err(e) = self.backend.write(key, &json) {
            log::error!("[nura.bridge] Failed to save {}: {}", key, e);
        }
    }
}
