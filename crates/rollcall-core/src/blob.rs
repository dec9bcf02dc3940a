//! The encrypted blob envelope: `{ salt, iv, cipher }`, each base64 text.
//!
//! This is the only shape in which the database crosses a persistence or
//! network boundary, and the exact JSON layout held in a storage slot.

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::crypto::{decrypt, derive_key, encrypt, generate_iv, generate_salt, IV_LEN};
use crate::error::CryptoError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedBlob {
    pub salt: String,
    pub iv: String,
    pub cipher: String,
}

impl EncryptedBlob {
    /// Seal `plaintext` under `passphrase` with a fresh salt and IV.
    /// Two seals of identical input never produce the same blob.
    pub fn seal(plaintext: &[u8], passphrase: &str) -> Result<Self, CryptoError> {
        let salt = generate_salt();
        let iv = generate_iv();
        let key = derive_key(passphrase, &salt);
        let cipher = encrypt(&key, &iv, plaintext)?;
        Ok(Self {
            salt: general_purpose::STANDARD.encode(salt),
            iv: general_purpose::STANDARD.encode(iv),
            cipher: general_purpose::STANDARD.encode(cipher),
        })
    }

    /// Open the blob. Fails with [`CryptoError::Decryption`] on a wrong
    /// passphrase, tampered ciphertext, or a malformed envelope.
    pub fn open(&self, passphrase: &str) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let salt = general_purpose::STANDARD
            .decode(&self.salt)
            .map_err(|_| CryptoError::Decryption)?;
        let iv: [u8; IV_LEN] = general_purpose::STANDARD
            .decode(&self.iv)
            .map_err(|_| CryptoError::Decryption)?
            .try_into()
            .map_err(|_| CryptoError::Decryption)?;
        let cipher = general_purpose::STANDARD
            .decode(&self.cipher)
            .map_err(|_| CryptoError::Decryption)?;
        let key = derive_key(passphrase, &salt);
        decrypt(&key, &iv, &cipher)
    }

    /// JSON bytes in the slot layout.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_open_roundtrip() {
        let blob = EncryptedBlob::seal(b"hello", "abc123").unwrap();
        let pt = blob.open("abc123").unwrap();
        assert_eq!(&*pt, b"hello");
    }

    #[test]
    fn every_seal_gets_fresh_salt_and_iv() {
        let a = EncryptedBlob::seal(b"same input", "same pass").unwrap();
        let b = EncryptedBlob::seal(b"same input", "same pass").unwrap();
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.cipher, b.cipher);
    }

    #[test]
    fn wrong_passphrase_fails() {
        let blob = EncryptedBlob::seal(b"hello", "p1").unwrap();
        assert!(matches!(blob.open("p2"), Err(CryptoError::Decryption)));
    }

    #[test]
    fn tampered_cipher_field_fails() {
        let mut blob = EncryptedBlob::seal(b"hello", "pw").unwrap();
        let mut raw = general_purpose::STANDARD.decode(&blob.cipher).unwrap();
        raw[0] ^= 0x01;
        blob.cipher = general_purpose::STANDARD.encode(raw);
        assert!(matches!(blob.open("pw"), Err(CryptoError::Decryption)));
    }

    #[test]
    fn malformed_envelope_fails_cleanly() {
        let mut blob = EncryptedBlob::seal(b"hello", "pw").unwrap();
        blob.iv = "not base64!!".into();
        assert!(matches!(blob.open("pw"), Err(CryptoError::Decryption)));
    }

    #[test]
    fn slot_layout_roundtrips_as_json() {
        let blob = EncryptedBlob::seal(b"hello", "pw").unwrap();
        let bytes = blob.to_json_bytes().unwrap();
        let back = EncryptedBlob::from_json_bytes(&bytes).unwrap();
        assert_eq!(blob, back);
    }
}
