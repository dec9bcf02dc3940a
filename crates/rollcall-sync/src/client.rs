//! Best-effort sync client.
//!
//! Missing configuration, a signed-out session, a network failure, and
//! "no remote data yet" all look the same to callers: `None` from
//! [`SyncClient::fetch_blob`], `false` from [`SyncClient::upload_blob`].
//! Failures are logged, never propagated. Every remote call runs under a
//! bounded timeout so a dead network cannot stall reporting.

use std::sync::Arc;
use std::time::Duration;

use rollcall_core::EncryptedBlob;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::auth::{AuthError, AuthProvider, Credentials, Identity};
use crate::remote::{MirrorDocument, RemoteConfig, RemoteStore, RestRemoteStore, DEFAULT_TIMEOUT_SECS};

#[derive(Clone)]
pub struct SyncClient {
    remote: Option<Arc<dyn RemoteStore>>,
    auth: Option<Arc<dyn AuthProvider>>,
    identity_tx: Arc<watch::Sender<Option<Identity>>>,
    timeout: Duration,
}

impl SyncClient {
    pub fn new(config: RemoteConfig, auth: Arc<dyn AuthProvider>) -> Self {
        let timeout = config.timeout();
        let remote: Arc<dyn RemoteStore> = Arc::new(RestRemoteStore::new(&config));
        Self::with_parts(Some(remote), Some(auth), timeout)
    }

    /// Client with injected backends. Tests pass in-memory doubles here.
    pub fn with_parts(
        remote: Option<Arc<dyn RemoteStore>>,
        auth: Option<Arc<dyn AuthProvider>>,
        timeout: Duration,
    ) -> Self {
        let (identity_tx, _) = watch::channel(None);
        Self {
            remote,
            auth,
            identity_tx: Arc::new(identity_tx),
            timeout,
        }
    }

    /// Client for deployments with no remote configuration at all.
    pub fn disabled() -> Self {
        Self::with_parts(None, None, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn is_configured(&self) -> bool {
        self.remote.is_some()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.identity_tx.borrow().clone()
    }

    /// Identity-change subscription. Dropping the receiver unsubscribes.
    pub fn subscribe_identity(&self) -> watch::Receiver<Option<Identity>> {
        self.identity_tx.subscribe()
    }

    pub async fn sign_in(&self, credentials: &Credentials) -> Result<Identity, AuthError> {
        let auth = self.auth.as_ref().ok_or(AuthError::NotConfigured)?;
        let identity = tokio::time::timeout(self.timeout, auth.sign_in(credentials))
            .await
            .map_err(|_| AuthError::Network("sign-in timed out".into()))??;
        self.identity_tx.send_replace(Some(identity.clone()));
        info!(user_id = %identity.user_id, "signed in");
        Ok(identity)
    }

    pub async fn sign_out(&self) {
        if let Some(auth) = &self.auth {
            auth.sign_out().await;
        }
        self.identity_tx.send_replace(None);
        info!("signed out");
    }

    /// Fetch the remote blob, if there is one. `None` covers every failure
    /// and absence condition identically.
    pub async fn fetch_blob(&self) -> Option<EncryptedBlob> {
        let remote = self.remote.as_ref()?;
        let identity = self.identity()?;
        let doc = match tokio::time::timeout(self.timeout, remote.fetch(&identity)).await {
            Err(_) => {
                warn!("remote fetch timed out");
                return None;
            }
            Ok(Err(e)) => {
                warn!(error = %e, "remote fetch failed");
                return None;
            }
            Ok(Ok(None)) => return None,
            Ok(Ok(Some(doc))) => doc,
        };
        match serde_json::from_str(&doc.blob) {
            Ok(blob) => Some(blob),
            Err(e) => {
                warn!(error = %e, "remote blob is malformed");
                None
            }
        }
    }

    /// Mirror the blob to the remote slot. `false` covers every failure
    /// condition; nothing is ever raised to the caller.
    pub async fn upload_blob(&self, blob: &EncryptedBlob) -> bool {
        let Some(remote) = self.remote.as_ref() else {
            return false;
        };
        let Some(identity) = self.identity() else {
            return false;
        };
        let text = match serde_json::to_string(blob) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "blob did not serialize for upload");
                return false;
            }
        };
        let doc = MirrorDocument {
            blob: text,
            updated_at: None,
        };
        match tokio::time::timeout(self.timeout, remote.upload(&identity, &doc)).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(error = %e, "remote upload failed");
                false
            }
            Err(_) => {
                warn!("remote upload timed out");
                false
            }
        }
    }
}
