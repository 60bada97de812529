use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use dapp_gate_core::ports::KeyValueStore;
use dapp_gate_core::PortError;

/// Process-local store. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<HashMap<String, Value>>>,
    writes: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `set` calls served so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn keys(&self) -> Result<Vec<String>, PortError> {
        let g = self
            .inner
            .lock()
            .map_err(|e| PortError::Transport(format!("store lock poisoned: {e}")))?;
        let mut keys: Vec<String> = g.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, PortError> {
        let g = self
            .inner
            .lock()
            .map_err(|e| PortError::Transport(format!("store lock poisoned: {e}")))?;
        Ok(g.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), PortError> {
        let mut g = self
            .inner
            .lock()
            .map_err(|e| PortError::Transport(format!("store lock poisoned: {e}")))?;
        g.insert(key.to_owned(), value);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), PortError> {
        let mut g = self
            .inner
            .lock()
            .map_err(|e| PortError::Transport(format!("store lock poisoned: {e}")))?;
        g.remove(key);
        Ok(())
    }
}

/// One JSON object per store, kept in `<dir>/<name>.json`. Writes go to a temporary file that is
/// renamed into place.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles on the file.
    lock: tokio::sync::Mutex<()>,
}

impl JsonFileStore {
    pub fn open(dir: &Path, name: &str) -> Self {
        Self {
            path: dir.join(format!("{name}.json")),
            lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<String, Value>, PortError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                PortError::Validation(format!("{} is not a json object: {e}", self.path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(PortError::Transport(format!(
                "read {} failed: {e}",
                self.path.display()
            ))),
        }
    }

    async fn store(&self, entries: &BTreeMap<String, Value>) -> Result<(), PortError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PortError::Transport(format!("create {} failed: {e}", parent.display())))?;
        }
        let bytes = serde_json::to_vec_pretty(entries)
            .map_err(|e| PortError::Validation(format!("serialize store failed: {e}")))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| PortError::Transport(format!("write {} failed: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| PortError::Transport(format!("rename {} failed: {e}", tmp.display())))?;
        debug!(path = %self.path.display(), entries = entries.len(), "store flushed");
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, PortError> {
        let _g = self.lock.lock().await;
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), PortError> {
        let _g = self.lock.lock().await;
        let mut entries = self.load().await?;
        entries.insert(key.to_owned(), value);
        self.store(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<(), PortError> {
        let _g = self.lock.lock().await;
        let mut entries = self.load().await?;
        if entries.remove(key).is_some() {
            self.store(&entries).await?;
        }
        Ok(())
    }
}
