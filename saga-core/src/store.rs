//! Small persistent client store.
//!
//! A flat string-to-string map written to one JSON file. Holds the active
//! slot and the pending-bootstrap record used to recover from a restart
//! while the first narrative chunk is being generated.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;

pub const ACTIVE_SLOT_KEY: &str = "activeSlot";
pub const PENDING_BOOTSTRAP_KEY: &str = "pendingBootstrapSession";

/// How long a pending bootstrap record stays usable.
pub fn bootstrap_expiry() -> Duration {
    Duration::hours(1)
}

/// Errors from client store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A bootstrap that has completed but not yet been handed off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingBootstrap {
    pub slot: u32,
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl PendingBootstrap {
    pub fn new(slot: u32, session_id: impl Into<String>) -> Self {
        Self {
            slot,
            session_id: session_id.into(),
            created_at: Utc::now(),
        }
    }

    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at > bootstrap_expiry()
    }
}

/// Shared handle to the client store. Cloning shares the same map.
#[derive(Debug, Clone)]
pub struct ClientStore {
    path: Option<PathBuf>,
    entries: Arc<Mutex<BTreeMap<String, String>>>,
}

impl ClientStore {
    /// Open the store at `path`, starting empty if the file does not exist.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(path = %path.display(), keys = entries.len(), "opened client store");
        Ok(Self {
            path: Some(path),
            entries: Arc::new(Mutex::new(entries)),
        })
    }

    /// A store that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().await.get(key).cloned()
    }

    pub async fn set(&self, key: &str, value: impl Into<String>) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), value.into());
        self.flush(&entries).await
    }

    pub async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        if entries.remove(key).is_some() {
            self.flush(&entries).await?;
        }
        Ok(())
    }

    pub async fn active_slot(&self) -> Option<u32> {
        self.get(ACTIVE_SLOT_KEY).await?.parse().ok()
    }

    pub async fn set_active_slot(&self, slot: u32) -> Result<(), StoreError> {
        self.set(ACTIVE_SLOT_KEY, slot.to_string()).await
    }

    /// The pending bootstrap record, if present and readable.
    pub async fn pending_bootstrap(&self) -> Option<PendingBootstrap> {
        let raw = self.get(PENDING_BOOTSTRAP_KEY).await?;
        match serde_json::from_str(&raw) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unreadable pending bootstrap record");
                None
            }
        }
    }

    pub async fn set_pending_bootstrap(&self, record: &PendingBootstrap) -> Result<(), StoreError> {
        let raw = serde_json::to_string(record)?;
        self.set(PENDING_BOOTSTRAP_KEY, raw).await
    }

    pub async fn clear_pending_bootstrap(&self) -> Result<(), StoreError> {
        self.remove(PENDING_BOOTSTRAP_KEY).await
    }

    async fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(entries)?;
        fs::write(path, content).await?;
        Ok(())
    }
}
