//! Challenge-response over an `AuthKey`.
//!
//! Proves possession of a room's password without ever sending the password
//! (or a value derived 1:1 from it) over the wire. Each side generates a
//! random 32-byte challenge, the peer signs it with HMAC-SHA256 under the
//! shared `AuthKey`, and the verifier checks the signature in constant time.

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::kdf::DerivedKey;

type HmacSha256 = Hmac<Sha256>;

/// Challenge length in bytes.
pub const CHALLENGE_LEN: usize = 32;
/// HMAC-SHA256 output length in bytes.
pub const RESPONSE_LEN: usize = 32;

/// Generate a fresh 32-byte random challenge.
pub fn new_challenge() -> [u8; CHALLENGE_LEN] {
    let mut challenge = [0u8; CHALLENGE_LEN];
    rand::thread_rng().fill_bytes(&mut challenge);
    challenge
}

/// Sign `challenge` with `auth_key`, producing the HMAC-SHA256 response.
pub fn sign(challenge: &[u8], auth_key: &DerivedKey) -> [u8; RESPONSE_LEN] {
    let mut mac = HmacSha256::new_from_slice(auth_key.as_bytes())
        .expect("HMAC-SHA256 accepts any key length");
    mac.update(challenge);
    let tag = mac.finalize().into_bytes();
    let mut out = [0u8; RESPONSE_LEN];
    out.copy_from_slice(&tag);
    out
}

/// Verify that `response` is the correct HMAC-SHA256 of `challenge` under
/// `auth_key`. Constant-time; never reveals *why* verification failed.
pub fn verify(challenge: &[u8], response: &[u8], auth_key: &DerivedKey) -> bool {
    if response.len() != RESPONSE_LEN {
        return false;
    }
    let expected = sign(challenge, auth_key);
    expected.ct_eq(response).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kdf::{derive_key, Purpose};

    #[test]
    fn sign_then_verify_succeeds() {
        let key = derive_key(b"correct horse", "room", Purpose::Auth).unwrap();
        let challenge = new_challenge();
        let response = sign(&challenge, &key);
        assert!(verify(&challenge, &response, &key));
    }

    #[test]
    fn verify_fails_under_wrong_key() {
        let key_a = derive_key(b"correct horse", "room", Purpose::Auth).unwrap();
        let key_b = derive_key(b"battery staple", "room", Purpose::Auth).unwrap();
        let challenge = new_challenge();
        let response = sign(&challenge, &key_a);
        assert!(!verify(&challenge, &response, &key_b));
    }

    #[test]
    fn verify_fails_on_wrong_challenge() {
        let key = derive_key(b"pw", "room", Purpose::Auth).unwrap();
        let c1 = new_challenge();
        let c2 = new_challenge();
        let response = sign(&c1, &key);
        assert!(!verify(&c2, &response, &key));
    }

    #[test]
    fn challenges_are_unique() {
        let a = new_challenge();
        let b = new_challenge();
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_response_length_rejected() {
        let key = derive_key(b"pw", "room", Purpose::Auth).unwrap();
        let challenge = new_challenge();
        assert!(!verify(&challenge, &[0u8; 10], &key));
    }
}
