//! Identifiers shared by every component: `RoomId`, `PeerId`, `ShareCode`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A room's identity. Rendered as the canonical 36-char lowercase UUID form
/// everywhere it crosses a wire (HTTP bodies, the `salt` fed to key
/// derivation, store keys).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(Uuid);

impl RoomId {
    /// Generate a fresh random room id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// The canonical lowercase hyphenated form, used as the PBKDF2 salt.
    pub fn as_hyphenated(&self) -> String {
        self.0.hyphenated().to_string()
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_hyphenated())
    }
}

impl FromStr for RoomId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A peer's identity within one session. Freshly chosen per session; not
/// authenticated on its own — only meaningful once its holder has passed
/// the challenge-response handshake (see `room-session`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(Uuid);

impl PeerId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for PeerId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A validated, canonically-cased share code (`XXXX-XXXX`).
///
/// Construction always goes through [`ShareCode::generate`] or
/// [`ShareCode::parse`] — there is no way to build one from an
/// unnormalized string, so a `ShareCode` in hand is always well-formed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShareCode(String);

impl ShareCode {
    /// Generate a fresh random share code.
    pub fn generate() -> Self {
        Self(room_crypto::generate_share_code())
    }

    /// Parse and normalize a user-typed or wire-received code.
    pub fn parse(input: &str) -> Option<Self> {
        room_crypto::normalize_share_code(input).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShareCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
