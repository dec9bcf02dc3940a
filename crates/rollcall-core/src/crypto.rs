//! Passphrase-derived symmetric encryption.
//!
//! Key derivation: PBKDF2-HMAC-SHA256, 210,000 rounds — deterministic per
//! (passphrase, salt) pair and deliberately slow against offline guessing.
//! Cipher: AES-256-GCM with a 12-byte IV; the GCM tag rejects wrong-key and
//! tampered ciphertext, so no corrupted plaintext ever escapes.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::CryptoError;

pub const KDF_ROUNDS: u32 = 210_000;
pub const KEY_LEN: usize = 32;
pub const SALT_LEN: usize = 16;
pub const IV_LEN: usize = 12;

/// Derive the 32-byte document key. Zeroized on drop.
pub fn derive_key(passphrase: &str, salt: &[u8]) -> Zeroizing<[u8; KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2::pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, KDF_ROUNDS, &mut *key);
    key
}

/// Fresh random salt. Generated anew for every seal — never reused.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    salt
}

/// Fresh random IV. Generated anew for every seal — never reused.
pub fn generate_iv() -> [u8; IV_LEN] {
    let mut iv = [0u8; IV_LEN];
    rand::rngs::OsRng.fill_bytes(&mut iv);
    iv
}

pub fn encrypt(
    key: &[u8; KEY_LEN],
    iv: &[u8; IV_LEN],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::Encrypt)?;
    cipher
        .encrypt(Nonce::from_slice(iv), plaintext)
        .map_err(|_| CryptoError::Encrypt)
}

pub fn decrypt(
    key: &[u8; KEY_LEN],
    iv: &[u8; IV_LEN],
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::Decryption)?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(iv), ciphertext)
        .map_err(|_| CryptoError::Decryption)?;
    Ok(Zeroizing::new(plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_key_is_deterministic() {
        let salt = [7u8; SALT_LEN];
        let a = derive_key("abc123", &salt);
        let b = derive_key("abc123", &salt);
        assert_eq!(*a, *b);
        let c = derive_key("abc124", &salt);
        assert_ne!(*a, *c);
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let key = derive_key("pw", &generate_salt());
        let iv = generate_iv();
        let ct = encrypt(&key, &iv, b"attendance").unwrap();
        let pt = decrypt(&key, &iv, &ct).unwrap();
        assert_eq!(&*pt, b"attendance");
    }

    #[test]
    fn wrong_key_is_rejected() {
        let salt = generate_salt();
        let iv = generate_iv();
        let ct = encrypt(&derive_key("pw1", &salt), &iv, b"secret").unwrap();
        let err = decrypt(&derive_key("pw2", &salt), &iv, &ct).unwrap_err();
        assert!(matches!(err, CryptoError::Decryption));
    }

    #[test]
    fn tampered_ciphertext_is_rejected() {
        let key = derive_key("pw", &generate_salt());
        let iv = generate_iv();
        let mut ct = encrypt(&key, &iv, b"secret").unwrap();
        ct[0] ^= 0x01;
        assert!(matches!(
            decrypt(&key, &iv, &ct),
            Err(CryptoError::Decryption)
        ));
    }
}
