// crypto/src/lib.rs
// Pure cryptographic primitives for room sync — password-based key
// derivation, authenticated encryption, challenge-response, and the local
// password verifier. No I/O, no async runtime, no knowledge of rooms or
// transports beyond the salt string callers pass in.

mod aead;
mod challenge;
mod error;
mod kdf;
mod password;
mod sharecode;

pub use aead::{decrypt, encrypt, NONCE_LEN, TAG_LEN};
pub use challenge::{new_challenge, sign, verify, CHALLENGE_LEN, RESPONSE_LEN};
pub use error::CryptoError;
pub use kdf::{derive_key, DerivedKey, Purpose, KEY_LENGTH, PBKDF2_ITERATIONS};
pub use password::{hash_password, verify_password};
pub use sharecode::{generate as generate_share_code, normalize as normalize_share_code, ALPHABET};

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn full_handshake_round_trip() {
        let room_id = "550e8400-e29b-41d4-a716-446655440000";
        let auth_a = derive_key(b"correct horse", room_id, Purpose::Auth).unwrap();
        let auth_b = derive_key(b"correct horse", room_id, Purpose::Auth).unwrap();

        let challenge = new_challenge();
        let response = sign(&challenge, &auth_a);
        assert!(verify(&challenge, &response, &auth_b));

        let enc_a = derive_key(b"correct horse", room_id, Purpose::Encrypt).unwrap();
        let enc_b = derive_key(b"correct horse", room_id, Purpose::Encrypt).unwrap();
        let envelope = encrypt(b"crdt snapshot bytes", &enc_a).unwrap();
        let plain = decrypt(&envelope, &enc_b).unwrap();
        assert_eq!(plain, b"crdt snapshot bytes");
    }

    #[test]
    fn wrong_password_fails_challenge_not_decryption() {
        let room_id = "550e8400-e29b-41d4-a716-446655440000";
        let auth_a = derive_key(b"correct horse", room_id, Purpose::Auth).unwrap();
        let auth_b = derive_key(b"battery staple", room_id, Purpose::Auth).unwrap();

        let challenge = new_challenge();
        let response = sign(&challenge, &auth_a);
        assert!(!verify(&challenge, &response, &auth_b));
    }
}
