//! Rollcall core: the encrypted attendance database and its local storage.
//!
//! The whole application state — students plus the append-only
//! check-in/check-out log — is one JSON document. It only ever crosses a
//! persistence boundary as an [`EncryptedBlob`] sealed under a
//! passphrase-derived key, and it is read and written atomically: the store
//! holds exactly one blob per slot, never partial updates.

pub mod blob;
pub mod codec;
pub mod crypto;
pub mod error;
pub mod model;
pub mod paths;
pub mod store;

pub use blob::EncryptedBlob;
pub use error::{CodecError, CryptoError, ModelError, StoreError};
pub use model::{Database, ImportSummary, LogEntry, LogKind, NewStudent, Student};
pub use store::{BlobStore, FileStore, MemoryStore, TieredStore, LEGACY_SLOT, PRIMARY_SLOT};
