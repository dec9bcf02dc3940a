//! Rollcall sync: the optional remote mirror and the session orchestrator.
//!
//! The mirror is strictly best-effort — every remote operation degrades to
//! an `Option`/`bool`, is bounded by a timeout, and never blocks or fails a
//! local read or write. The orchestrator in [`session`] owns the unlock /
//! save / hydrate discipline over the local store.

pub mod auth;
pub mod client;
pub mod remote;
pub mod session;

pub use auth::{AuthError, AuthProvider, Credentials, Identity, RestAuthProvider};
pub use client::SyncClient;
pub use remote::{MirrorDocument, RemoteConfig, RemoteError, RemoteStore, RestRemoteStore};
pub use session::{Session, SessionError, SessionState};
