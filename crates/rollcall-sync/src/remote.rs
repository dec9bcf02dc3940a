//! Remote mirror storage: one document per identity at a stable path,
//! `{ blob, updatedAt }` where `blob` is the serialized `{salt, iv, cipher}`
//! envelope. Absence (no document yet, 404) is not an error.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::Identity;

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub api_base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl RemoteConfig {
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Config from `ROLLCALL_API_URL` / `ROLLCALL_REMOTE_TIMEOUT_SECS`.
    /// `None` when no remote is configured at all.
    pub fn from_env() -> Option<Self> {
        let api_base_url = std::env::var("ROLLCALL_API_URL").ok()?;
        let timeout_secs = std::env::var("ROLLCALL_REMOTE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Some(Self {
            api_base_url,
            timeout_secs,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// The per-identity mirror document. `updatedAt` is server-generated; it is
/// left empty on upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorDocument {
    pub blob: String,
    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote request failed: {0}")]
    Network(String),

    #[error("remote returned status {0}")]
    UnexpectedStatus(u16),
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn fetch(&self, identity: &Identity) -> Result<Option<MirrorDocument>, RemoteError>;
    async fn upload(&self, identity: &Identity, doc: &MirrorDocument) -> Result<(), RemoteError>;
}

// ── REST store ──────────────────────────────────────────────────────────────

pub struct RestRemoteStore {
    client: reqwest::Client,
    base_url: String,
}

impl RestRemoteStore {
    pub fn new(config: &RemoteConfig) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("rollcall-sync/0.1")
            .build()
            .expect("reqwest client");
        Self {
            client,
            base_url: config.api_base_url.clone(),
        }
    }

    fn mirror_url(&self, identity: &Identity) -> String {
        format!("{}/api/mirrors/{}", self.base_url, identity.user_id)
    }
}

#[async_trait]
impl RemoteStore for RestRemoteStore {
    async fn fetch(&self, identity: &Identity) -> Result<Option<MirrorDocument>, RemoteError> {
        let mut req = self.client.get(self.mirror_url(identity));
        if let Some(token) = &identity.token {
            req = req.bearer_auth(token);
        }
        let res = req
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;
        if res.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !res.status().is_success() {
            return Err(RemoteError::UnexpectedStatus(res.status().as_u16()));
        }
        let doc = res
            .json()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;
        Ok(Some(doc))
    }

    async fn upload(&self, identity: &Identity, doc: &MirrorDocument) -> Result<(), RemoteError> {
        let mut req = self.client.put(self.mirror_url(identity)).json(doc);
        if let Some(token) = &identity.token {
            req = req.bearer_auth(token);
        }
        let res = req
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;
        if res.status().is_success() {
            return Ok(());
        }
        Err(RemoteError::UnexpectedStatus(res.status().as_u16()))
    }
}
