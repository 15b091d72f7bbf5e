//! Local password verifier.
//!
//! This is deliberately a separate code path from [`crate::kdf::derive_key`].
//! `derive_key` produces secrets used as live HMAC/AES keys; this module
//! produces a salted hash stored locally so the application can prompt
//! "wrong password" without retaining the password itself. The two must
//! never be interchanged — in particular, the stored verifier below is
//! never sent over any wire.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::CryptoError;
use crate::kdf::PBKDF2_ITERATIONS;

const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

/// Hash `password` with a fresh random salt, returning `base64(salt):base64(hash)`.
pub fn hash_password(password: &[u8]) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let hash = pbkdf2_hash(password, &salt);
    format!("{}:{}", BASE64.encode(salt), BASE64.encode(hash))
}

/// Verify `password` against a value produced by [`hash_password`].
/// Constant-time comparison; malformed `stored` values verify as `false`.
pub fn verify_password(password: &[u8], stored: &str) -> bool {
    match parse_stored(stored) {
        Ok((salt, expected_hash)) => {
            let actual_hash = pbkdf2_hash(password, &salt);
            actual_hash.ct_eq(&expected_hash).into()
        }
        Err(_) => false,
    }
}

fn parse_stored(stored: &str) -> Result<([u8; SALT_LEN], [u8; HASH_LEN]), CryptoError> {
    let (salt_b64, hash_b64) = stored.split_once(':').ok_or(CryptoError::Malformed)?;
    let salt: [u8; SALT_LEN] = BASE64
        .decode(salt_b64)
        .map_err(|_| CryptoError::Malformed)?
        .try_into()
        .map_err(|_| CryptoError::Malformed)?;
    let hash: [u8; HASH_LEN] = BASE64
        .decode(hash_b64)
        .map_err(|_| CryptoError::Malformed)?
        .try_into()
        .map_err(|_| CryptoError::Malformed)?;
    Ok((salt, hash))
}

fn pbkdf2_hash(password: &[u8], salt: &[u8]) -> [u8; HASH_LEN] {
    let mut out = [0u8; HASH_LEN];
    pbkdf2_hmac::<Sha256>(password, salt, PBKDF2_ITERATIONS, &mut out);
    out
}
