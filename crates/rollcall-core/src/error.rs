use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("decryption failed: wrong passphrase or corrupted data")]
    Decryption,

    #[error("encryption failed")]
    Encrypt,
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(
        "storage quota exceeded writing '{slot}': the database is too large for \
         this device's storage — large embedded student photos are the usual \
         cause; remove or shrink photos and save again"
    )]
    Capacity { slot: String },

    #[error("storage backend '{backend}' unavailable: {reason}")]
    Unavailable { backend: String, reason: String },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("no student with id {0}")]
    UnknownStudent(String),
}
