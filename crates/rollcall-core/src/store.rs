//! Local blob storage: named slots, each holding at most one encrypted blob.
//!
//! Backends are capability-tagged and composable: [`TieredStore`] tries an
//! ordered list in sequence, so the preferred large-quota tier and the
//! small-quota legacy tier are configuration, not hardcoded call sites.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use crate::error::StoreError;

/// Slot holding the current encrypted database.
pub const PRIMARY_SLOT: &str = "attendance.blob";
/// Older small-capacity slot, read once for migration and then removed.
pub const LEGACY_SLOT: &str = "attendance.legacy";

#[async_trait]
pub trait BlobStore: Send + Sync {
    fn backend_name(&self) -> &str;

    /// Whether this backend can currently serve requests at all.
    fn is_available(&self) -> bool {
        true
    }

    async fn get(&self, slot: &str) -> Result<Option<Vec<u8>>, StoreError>;
    async fn put(&self, slot: &str, bytes: &[u8]) -> Result<(), StoreError>;
    async fn delete(&self, slot: &str) -> Result<(), StoreError>;
}

// ── File-backed store ───────────────────────────────────────────────────────

/// One file per slot under a root directory. Writes go through a temp file
/// and rename, so a failed save leaves the previous blob intact.
pub struct FileStore {
    root: PathBuf,
    quota: Option<u64>,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            quota: None,
        }
    }

    pub fn with_quota<P: AsRef<Path>>(root: P, quota_bytes: u64) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            quota: Some(quota_bytes),
        }
    }

    /// Store rooted at the platform data directory.
    pub fn open_default() -> anyhow::Result<Self> {
        Ok(Self::new(crate::paths::data_dir()?))
    }
}

#[async_trait]
impl BlobStore for FileStore {
    fn backend_name(&self) -> &str {
        "file"
    }

    async fn get(&self, slot: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match tokio::fs::read(self.root.join(slot)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, slot: &str, bytes: &[u8]) -> Result<(), StoreError> {
        if let Some(quota) = self.quota {
            if bytes.len() as u64 > quota {
                return Err(StoreError::Capacity { slot: slot.into() });
            }
        }
        tokio::fs::create_dir_all(&self.root).await?;
        let tmp = self.root.join(format!("{slot}.tmp"));
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, self.root.join(slot)).await?;
        Ok(())
    }

    async fn delete(&self, slot: &str) -> Result<(), StoreError> {
        match tokio::fs::remove_file(self.root.join(slot)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ── In-memory store ─────────────────────────────────────────────────────────

/// In-memory backend with an optional per-write quota and an availability
/// toggle. Stands in for the small-quota legacy tier, and for any backend
/// in tests.
pub struct MemoryStore {
    name: String,
    slots: RwLock<HashMap<String, Vec<u8>>>,
    quota: RwLock<Option<usize>>,
    available: AtomicBool,
}

impl MemoryStore {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            slots: RwLock::new(HashMap::new()),
            quota: RwLock::new(None),
            available: AtomicBool::new(true),
        }
    }

    pub fn with_quota(name: &str, quota_bytes: usize) -> Self {
        let store = Self::new(name);
        *store.quota.write() = Some(quota_bytes);
        store
    }

    pub fn set_quota(&self, quota_bytes: Option<usize>) {
        *self.quota.write() = quota_bytes;
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    fn backend_name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn get(&self, slot: &str) -> Result<Option<Vec<u8>>, StoreError> {
        if !self.is_available() {
            return Err(self.unavailable());
        }
        Ok(self.slots.read().get(slot).cloned())
    }

    async fn put(&self, slot: &str, bytes: &[u8]) -> Result<(), StoreError> {
        if !self.is_available() {
            return Err(self.unavailable());
        }
        if let Some(quota) = *self.quota.read() {
            if bytes.len() > quota {
                return Err(StoreError::Capacity { slot: slot.into() });
            }
        }
        self.slots.write().insert(slot.to_owned(), bytes.to_vec());
        Ok(())
    }

    async fn delete(&self, slot: &str) -> Result<(), StoreError> {
        if !self.is_available() {
            return Err(self.unavailable());
        }
        self.slots.write().remove(slot);
        Ok(())
    }
}

impl MemoryStore {
    fn unavailable(&self) -> StoreError {
        StoreError::Unavailable {
            backend: self.name.clone(),
            reason: "backend disabled".into(),
        }
    }
}

// ── Tiered store ────────────────────────────────────────────────────────────

/// Ordered list of backends tried in sequence.
///
/// `put` lands on the first tier that will take it; an unavailable tier is
/// skipped, but a capacity refusal from the tier that accepted the attempt
/// is surfaced to the caller rather than silently retried elsewhere.
pub struct TieredStore {
    tiers: Vec<Arc<dyn BlobStore>>,
}

impl TieredStore {
    pub fn new(tiers: Vec<Arc<dyn BlobStore>>) -> Self {
        Self { tiers }
    }
}

#[async_trait]
impl BlobStore for TieredStore {
    fn backend_name(&self) -> &str {
        "tiered"
    }

    async fn get(&self, slot: &str) -> Result<Option<Vec<u8>>, StoreError> {
        for tier in &self.tiers {
            if !tier.is_available() {
                debug!(backend = tier.backend_name(), "skipping unavailable tier");
                continue;
            }
            match tier.get(slot).await {
                Ok(Some(bytes)) => return Ok(Some(bytes)),
                Ok(None) => continue,
                Err(StoreError::Unavailable { backend, reason }) => {
                    debug!(%backend, %reason, "tier dropped out during read");
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    async fn put(&self, slot: &str, bytes: &[u8]) -> Result<(), StoreError> {
        for tier in &self.tiers {
            if !tier.is_available() {
                debug!(backend = tier.backend_name(), "skipping unavailable tier");
                continue;
            }
            match tier.put(slot, bytes).await {
                Ok(()) => {
                    debug!(backend = tier.backend_name(), slot, "blob written");
                    return Ok(());
                }
                Err(StoreError::Unavailable { backend, reason }) => {
                    debug!(%backend, %reason, "tier dropped out during write");
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
        Err(StoreError::Unavailable {
            backend: "tiered".into(),
            reason: "no storage backend available".into(),
        })
    }

    async fn delete(&self, slot: &str) -> Result<(), StoreError> {
        for tier in &self.tiers {
            if !tier.is_available() {
                continue;
            }
            match tier.delete(slot).await {
                Ok(()) => {}
                Err(StoreError::Unavailable { backend, reason }) => {
                    debug!(%backend, %reason, "tier dropped out during delete");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}
