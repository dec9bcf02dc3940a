//! Authentication seam. The provider itself is a collaborator — this crate
//! only defines the trait the sync client depends on, plus a REST-backed
//! implementation of it.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::remote::RemoteConfig;

#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Authenticated principal under which the remote blob is namespaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("auth request failed: {0}")]
    Network(String),

    #[error("no auth endpoint configured")]
    NotConfigured,
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in(&self, credentials: &Credentials) -> Result<Identity, AuthError>;
    async fn sign_out(&self);
}

// ── REST provider ───────────────────────────────────────────────────────────

pub struct RestAuthProvider {
    client: reqwest::Client,
    base_url: String,
}

impl RestAuthProvider {
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
}

#[derive(Deserialize)]
struct SignInResponse {
    user_id: String,
    token: String,
}

#[async_trait]
impl AuthProvider for RestAuthProvider {
    async fn sign_in(&self, credentials: &Credentials) -> Result<Identity, AuthError> {
        let url = format!("{}/api/auth/sign-in", self.base_url);
        let res = self
            .client
            .post(url)
            .json(&serde_json::json!({
                "email": credentials.email,
                "password": credentials.password,
            }))
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;
        if res.status() == StatusCode::UNAUTHORIZED || res.status() == StatusCode::FORBIDDEN {
            return Err(AuthError::InvalidCredentials);
        }
        if !res.status().is_success() {
            return Err(AuthError::Network(format!(
                "sign-in failed with status {}",
                res.status()
            )));
        }
        let body: SignInResponse = res
            .json()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;
        Ok(Identity {
            user_id: body.user_id,
            email: credentials.email.clone(),
            token: Some(body.token),
        })
    }

    async fn sign_out(&self) {}
}
