//! Load/save orchestrator for one attendance session.
//!
//! States: `Locked -> Unlocking -> Unlocked`, with `LockedWithError` when
//! the stored blob does not decrypt. The session is the single writer: all
//! mutation (and therefore all scan-based id assignment) happens behind
//! `&mut self`.

use std::sync::Arc;

use rollcall_core::error::{CodecError, ModelError, StoreError};
use rollcall_core::store::{BlobStore, LEGACY_SLOT, PRIMARY_SLOT};
use rollcall_core::{codec, Database, EncryptedBlob, ImportSummary, LogEntry, NewStudent, Student};
use thiserror::Error;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::client::SyncClient;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Locked,
    Unlocking,
    Unlocked,
    /// The stored blob did not decrypt; retry with the correct passphrase.
    LockedWithError(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("session is locked — unlock with the passphrase first")]
    Locked,
}

pub struct Session {
    store: Arc<dyn BlobStore>,
    sync: SyncClient,
    state: SessionState,
    passphrase: Option<Zeroizing<String>>,
    db: Option<Database>,
}

impl Session {
    pub fn new(store: Arc<dyn BlobStore>, sync: SyncClient) -> Self {
        Self {
            store,
            sync,
            state: SessionState::Locked,
            passphrase: None,
            db: None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn sync(&self) -> &SyncClient {
        &self.sync
    }

    pub fn database(&self) -> Option<&Database> {
        self.db.as_ref()
    }

    /// Unlock against the local store. An absent primary slot falls back to
    /// the legacy slot (migrating it forward, best-effort); if no blob
    /// exists anywhere, an empty database is persisted immediately under
    /// the supplied passphrase, which becomes the session key.
    pub async fn unlock(&mut self, passphrase: &str) -> Result<&Database, SessionError> {
        self.state = SessionState::Unlocking;
        match self.unlock_inner(passphrase).await {
            Ok(db) => {
                self.db = Some(db);
                self.passphrase = Some(Zeroizing::new(passphrase.to_owned()));
                self.state = SessionState::Unlocked;
                info!("session unlocked");
                Ok(self.database().ok_or(SessionError::Locked)?)
            }
            Err(e) => {
                self.state = match &e {
                    // wrong passphrase or corrupted blob — terminal for this attempt
                    SessionError::Codec(codec_err) => {
                        SessionState::LockedWithError(codec_err.to_string())
                    }
                    _ => SessionState::Locked,
                };
                Err(e)
            }
        }
    }

    async fn unlock_inner(&self, passphrase: &str) -> Result<Database, SessionError> {
        let bytes = match self.store.get(PRIMARY_SLOT).await? {
            Some(bytes) => Some(bytes),
            None => self.migrate_legacy().await?,
        };
        match bytes {
            Some(bytes) => {
                let blob = EncryptedBlob::from_json_bytes(&bytes).map_err(CodecError::from)?;
                Ok(codec::decode(&blob, passphrase)?)
            }
            None => {
                // first run: establish the passphrase by persisting an
                // empty database right away
                let db = Database::default();
                self.write_local_blob(&db, passphrase).await?;
                info!("initialized empty database");
                Ok(db)
            }
        }
    }

    /// One-directional, best-effort move of the legacy slot into the
    /// primary slot. Its failure never blocks unlocking.
    async fn migrate_legacy(&self) -> Result<Option<Vec<u8>>, SessionError> {
        let Some(bytes) = self.store.get(LEGACY_SLOT).await? else {
            return Ok(None);
        };
        info!("migrating legacy slot");
        if let Err(e) = self.store.put(PRIMARY_SLOT, &bytes).await {
            warn!(error = %e, "legacy slot migration failed");
        } else if let Err(e) = self.store.delete(LEGACY_SLOT).await {
            warn!(error = %e, "legacy slot cleanup failed");
        }
        Ok(Some(bytes))
    }

    /// Persist the current database. The local write completes (or fails)
    /// before this returns; the paired remote mirror upload is spawned
    /// fire-and-forget and its outcome only ever reaches the log.
    pub async fn save(&mut self) -> Result<(), SessionError> {
        let (db, passphrase) = match (&self.db, &self.passphrase) {
            (Some(db), Some(passphrase)) => (db, passphrase),
            _ => return Err(SessionError::Locked),
        };
        let blob = self.write_local_blob(db, passphrase).await?;
        if self.sync.identity().is_some() {
            let sync = self.sync.clone();
            tokio::spawn(async move {
                if sync.upload_blob(&blob).await {
                    debug!("remote mirror updated");
                } else {
                    warn!("remote mirror not updated");
                }
            });
        }
        Ok(())
    }

    async fn write_local_blob(
        &self,
        db: &Database,
        passphrase: &str,
    ) -> Result<EncryptedBlob, SessionError> {
        let blob = codec::encode(db, passphrase)?;
        let bytes = blob.to_json_bytes().map_err(CodecError::from)?;
        self.store.put(PRIMARY_SLOT, &bytes).await?;
        Ok(blob)
    }

    /// Hydrate from the remote mirror at session start. A blob that was
    /// actually fetched and decoded replaces the session state and is
    /// persisted locally; anything short of that keeps local data.
    pub async fn load_from_remote(&mut self) -> Result<bool, SessionError> {
        let passphrase = match &self.passphrase {
            Some(passphrase) => passphrase.clone(),
            None => return Err(SessionError::Locked),
        };
        let Some(blob) = self.sync.fetch_blob().await else {
            return Ok(false);
        };
        let remote_db = match codec::decode(&blob, &passphrase) {
            Ok(db) => db,
            Err(e) => {
                warn!(error = %e, "remote blob did not decode; keeping local data");
                return Ok(false);
            }
        };
        let replacing = self.db.as_ref().map(|db| !db.is_empty()).unwrap_or(false);
        if replacing {
            info!("remote mirror replaces local data");
        } else {
            info!("hydrated from remote mirror");
        }
        self.db = Some(remote_db);
        self.save().await?;
        Ok(true)
    }

    // ── Single-writer mutators ─────────────────────────────────────────────
    // Each mutation saves before returning, so the slot always holds the
    // latest state the caller has seen.

    pub async fn enroll(&mut self, candidate: NewStudent) -> Result<Student, SessionError> {
        let db = self.db.as_mut().ok_or(SessionError::Locked)?;
        let student = db.enroll(candidate).clone();
        self.save().await?;
        Ok(student)
    }

    pub async fn check_in(&mut self, student_id: &str) -> Result<LogEntry, SessionError> {
        let db = self.db.as_mut().ok_or(SessionError::Locked)?;
        let entry = db.check_in(student_id)?.clone();
        self.save().await?;
        Ok(entry)
    }

    pub async fn check_out(
        &mut self,
        student_id: &str,
        collected_by: &str,
    ) -> Result<LogEntry, SessionError> {
        let db = self.db.as_mut().ok_or(SessionError::Locked)?;
        let entry = db.check_out(student_id, collected_by)?.clone();
        self.save().await?;
        Ok(entry)
    }

    pub async fn import_students(
        &mut self,
        candidates: Vec<NewStudent>,
    ) -> Result<ImportSummary, SessionError> {
        let db = self.db.as_mut().ok_or(SessionError::Locked)?;
        let summary = db.import(candidates);
        self.save().await?;
        Ok(summary)
    }
}
