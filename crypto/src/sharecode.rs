//! Human-typeable share codes.
//!
//! An 8-character code over a 32-symbol alphabet that excludes the
//! characters most often confused when read aloud or handwritten
//! (`I`, `O`, `0`, `1`), rendered as `XXXX-XXXX`. About 40 bits of entropy —
//! enough to resist guessing within the server's 300-second TTL and
//! rate-limit window, not meant to stand alone as a long-term secret.

use rand::RngCore;

/// 32-symbol alphabet: uppercase letters and digits minus I, O, 0, 1.
pub const ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Number of symbols in the code (excluding the separator).
const CODE_LEN: usize = 8;

/// Generate a fresh share code, e.g. `"ABCD-1234"`.
pub fn generate() -> String {
    let mut raw = [0u8; CODE_LEN];
    rand::thread_rng().fill_bytes(&mut raw);

    let mut code = String::with_capacity(CODE_LEN + 1);
    for (i, byte) in raw.iter().enumerate() {
        if i == 4 {
            code.push('-');
        }
        code.push(ALPHABET[(*byte as usize) % ALPHABET.len()] as char);
    }
    code
}

/// Normalize a user-typed code (case-insensitive, tolerant of a missing or
/// misplaced separator) to the canonical `XXXX-XXXX` form for lookup.
/// Returns `None` if the normalized form doesn't have 8 alphabet symbols.
pub fn normalize(input: &str) -> Option<String> {
    let symbols: String = input
        .chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if symbols.len() != CODE_LEN || !symbols.bytes().all(|b| ALPHABET.contains(&b)) {
        return None;
    }

    let mut out = String::with_capacity(CODE_LEN + 1);
    out.push_str(&symbols[..4]);
    out.push('-');
    out.push_str(&symbols[4..]);
    Some(out)
}
