//! Authenticated encryption.
//!
//! Wraps AES-256-GCM with a fresh random nonce per call. The wire format is
//! `nonce (12B) || ciphertext || tag (16B, appended by the AEAD crate)` —
//! callers never see the tag split out separately.
//!
//! Nonce reuse under the same key is catastrophic for GCM (full key and
//! plaintext recovery), so every call draws a fresh nonce from the OS RNG;
//! this crate never accepts a caller-supplied nonce.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;

use crate::error::CryptoError;
use crate::kdf::DerivedKey;

/// AES-GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;
/// AES-GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// Encrypt `plaintext` under `key`, returning `nonce || ciphertext || tag`.
pub fn encrypt(plaintext: &[u8], key: &DerivedKey) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|_| CryptoError::Malformed)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CryptoError::DecryptionFailed)?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt an envelope produced by [`encrypt`]. Fails if the envelope is
/// too short to contain a nonce and tag, or if the GCM tag does not verify.
pub fn decrypt(envelope: &[u8], key: &DerivedKey) -> Result<Vec<u8>, CryptoError> {
    if envelope.len() < NONCE_LEN + TAG_LEN {
        return Err(CryptoError::Malformed);
    }
    let (nonce_bytes, ciphertext) = envelope.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|_| CryptoError::Malformed)?;
    let nonce = Nonce::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kdf::{derive_key, Purpose};

    #[test]
    fn round_trip() {
        let key = derive_key(b"correct horse", "room-id", Purpose::Encrypt).unwrap();
        let msg = b"shared contact card bytes";
        let envelope = encrypt(msg, &key).unwrap();
        let plain = decrypt(&envelope, &key).unwrap();
        assert_eq!(plain, msg);
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let key = derive_key(b"correct horse", "room-id", Purpose::Encrypt).unwrap();
        let mut envelope = encrypt(b"hello", &key).unwrap();
        let last = envelope.len() - 1;
        envelope[last] ^= 0xFF;
        assert!(decrypt(&envelope, &key).is_err());
    }

    #[test]
    fn wrong_key_fails() {
        let key_a = derive_key(b"correct horse", "room-id", Purpose::Encrypt).unwrap();
        let key_b = derive_key(b"battery staple", "room-id", Purpose::Encrypt).unwrap();
        let envelope = encrypt(b"hello", &key_a).unwrap();
        assert!(decrypt(&envelope, &key_b).is_err());
    }

    #[test]
    fn nonces_are_not_reused() {
        let key = derive_key(b"pw", "room-id", Purpose::Encrypt).unwrap();
        let a = encrypt(b"same message", &key).unwrap();
        let b = encrypt(b"same message", &key).unwrap();
        assert_ne!(&a[..NONCE_LEN], &b[..NONCE_LEN]);
    }

    #[test]
    fn truncated_envelope_rejected() {
        let key = derive_key(b"pw", "room-id", Purpose::Encrypt).unwrap();
        assert!(decrypt(&[0u8; 4], &key).is_err());
    }
}
