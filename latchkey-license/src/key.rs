//! License key generation and format validation.
//!
//! Keys are formatted as `XXXX-XXXX-XXXX-XXXX`: four dash-separated groups
//! of four uppercase alphanumeric characters. Two generation strategies are
//! provided, both drawing from a cryptographically random source. Neither
//! guarantees uniqueness; that is the store's unique constraint on `key`,
//! and callers must regenerate on collision.

use rand::rngs::OsRng;
use rand::Rng;
use std::collections::HashSet;
use uuid::Uuid;

/// Alphabet for randomly generated key groups.
const KEY_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Dash-separated groups per key.
const KEY_GROUPS: usize = 4;

/// Characters per group.
const GROUP_LEN: usize = 4;

/// Generates a license key from cryptographically random characters.
#[must_use]
pub fn generate() -> String {
    let mut rng = OsRng;
    let mut groups = Vec::with_capacity(KEY_GROUPS);
    for _ in 0..KEY_GROUPS {
        let group: String = (0..GROUP_LEN)
            .map(|_| KEY_ALPHABET[rng.gen_range(0..KEY_ALPHABET.len())] as char)
            .collect();
        groups.push(group);
    }
    groups.join("-")
}

/// Generates a license key from a random UUID, uppercased and regrouped.
///
/// Uses the first 16 hex digits of a v4 UUID, so the effective alphabet is
/// `[A-F0-9]`, still within the key format.
#[must_use]
pub fn generate_from_uuid() -> String {
    let hex = Uuid::new_v4().simple().to_string().to_uppercase();
    format!(
        "{}-{}-{}-{}",
        &hex[0..4],
        &hex[4..8],
        &hex[8..12],
        &hex[12..16]
    )
}

/// Returns true if `key` matches `XXXX-XXXX-XXXX-XXXX`.
#[must_use]
pub fn is_valid_format(key: &str) -> bool {
    let parts: Vec<&str> = key.split('-').collect();
    parts.len() == KEY_GROUPS
        && parts.iter().all(|group| {
            group.len() == GROUP_LEN
                && group
                    .bytes()
                    .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
        })
}

/// Generates `count` distinct keys.
#[must_use]
pub fn generate_batch(count: usize) -> Vec<String> {
    let mut keys = HashSet::with_capacity(count);
    while keys.len() < count {
        keys.insert(generate());
    }
    keys.into_iter().collect()
}
