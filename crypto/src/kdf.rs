//! Password-based key derivation.
//!
//! A single password plus a room identifier yields two domain-separated
//! 256-bit keys: one for HMAC challenge-response (`Purpose::Auth`), one for
//! AES-256-GCM (`Purpose::Encrypt`). Domain separation is done by appending
//! the purpose tag to the salt, not by using a different iteration count or
//! algorithm — the two keys must be computationally unrelated even though
//! they're derived from the same secret.

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// PBKDF2-HMAC-SHA256 iteration count. Fixed per the protocol contract —
/// every peer must derive the same key from the same password, so this is
/// not user-configurable.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Derived key length in bytes (256 bits).
pub const KEY_LENGTH: usize = 32;

/// The two domain-separated uses a derived key is put to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    /// HMAC-SHA256 key for the challenge-response handshake.
    Auth,
    /// AES-256-GCM key for CRDT/transport payload encryption.
    Encrypt,
}

impl Purpose {
    fn tag(self) -> &'static str {
        match self {
            Purpose::Auth => "auth",
            Purpose::Encrypt => "encrypt",
        }
    }
}

/// A 256-bit key derived from a password. Zeroized on drop.
#[derive(Clone)]
pub struct DerivedKey(pub(crate) Zeroizing<[u8; KEY_LENGTH]>);

impl DerivedKey {
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }
}

/// Derive a purpose-scoped key from `password` and `salt` (the room's
/// canonical hex id, in practice — see `RoomId::as_hyphenated`).
///
/// The salt fed to PBKDF2 is `"<salt>:<purpose>"` as literal bytes, so
/// `derive_key(pw, room_id, Auth)` and `derive_key(pw, room_id, Encrypt)`
/// are unrelated even though they share a password and a room.
pub fn derive_key(password: &[u8], salt: &str, purpose: Purpose) -> Result<DerivedKey, CryptoError> {
    if password.is_empty() {
        return Err(CryptoError::Malformed);
    }
    let scoped_salt = format!("{salt}:{}", purpose.tag());
    let mut out = [0u8; KEY_LENGTH];
    pbkdf2_hmac::<Sha256>(password, scoped_salt.as_bytes(), PBKDF2_ITERATIONS, &mut out);
    Ok(DerivedKey(Zeroizing::new(out)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_and_encrypt_keys_differ() {
        let auth = derive_key(b"correct horse", "room-id", Purpose::Auth).unwrap();
        let enc = derive_key(b"correct horse", "room-id", Purpose::Encrypt).unwrap();
        assert_ne!(auth.as_bytes(), enc.as_bytes());
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = derive_key(b"pw", "room", Purpose::Auth).unwrap();
        let b = derive_key(b"pw", "room", Purpose::Auth).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn different_rooms_yield_different_keys() {
        let a = derive_key(b"pw", "room-a", Purpose::Auth).unwrap();
        let b = derive_key(b"pw", "room-b", Purpose::Auth).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn empty_password_rejected() {
        assert!(derive_key(b"", "room", Purpose::Auth).is_err());
    }
}
