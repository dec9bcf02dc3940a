//! Document codec: JSON inside the cipher.
//!
//! `decode(encode(db, p), p) == db` for every reachable database state.

use zeroize::Zeroizing;

use crate::blob::EncryptedBlob;
use crate::error::{CodecError, CryptoError};
use crate::model::Database;

pub fn encode(db: &Database, passphrase: &str) -> Result<EncryptedBlob, CodecError> {
    let plaintext = Zeroizing::new(serde_json::to_vec(db)?);
    Ok(EncryptedBlob::seal(&plaintext, passphrase)?)
}

pub fn decode(blob: &EncryptedBlob, passphrase: &str) -> Result<Database, CodecError> {
    let plaintext = blob.open(passphrase)?;
    // A parse failure after a valid GCM tag means the slot held something
    // that was never a database; report it as corruption, not as JSON trivia.
    serde_json::from_slice(&plaintext).map_err(|_| CodecError::Crypto(CryptoError::Decryption))
}
