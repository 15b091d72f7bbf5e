use thiserror::Error;

/// Every fallible crypto operation in this crate returns one of these.
///
/// Per the cryptographic contract, callers must not be able to distinguish
/// *why* a verification or decryption failed — a bad tag, a malformed
/// envelope, and a wrong key all look the same from the outside. The
/// variants below exist for internal logging only; match on them loosely
/// (or not at all) and surface a single "incorrect password" /
/// "decryption failed" message to users.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("malformed input")]
    Malformed,

    #[error("authenticated decryption failed")]
    DecryptionFailed,

    #[error("key derivation failed")]
    DerivationFailed,
}
