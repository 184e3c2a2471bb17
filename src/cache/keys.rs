//! Deterministic, versioned cache-key derivation.
//!
//! Free-text identifiers are normalized (trim + lowercase) and hashed so
//! equivalent queries collapse to one key; symmetric pair identifiers are
//! sorted before formatting so `comparison(a, b) == comparison(b, a)`.

use std::fmt::Write as _;

use sha2::{Digest, Sha256};

/// Bumping this invalidates every existing key at once.
pub const KEY_VERSION: u32 = 1;

/// Hex chars of the SHA-256 digest kept for hashed identifiers.
const DIGEST_LEN: usize = 16;

/// Key for an actor's profile: `v1:actor:profile:{id}`.
pub fn actor_profile(id: u64) -> String {
    format!("v{KEY_VERSION}:actor:profile:{id}")
}

/// Key for an actor's filmography: `v1:actor:movies:{id}`.
pub fn actor_movies(id: u64) -> String {
    format!("v{KEY_VERSION}:actor:movies:{id}")
}

/// Key for an actor's display name: `v1:actor:name:{id}`.
pub fn actor_name(id: u64) -> String {
    format!("v{KEY_VERSION}:actor:name:{id}")
}

/// Key for movie details: `v1:movie:details:{id}`.
pub fn movie_details(id: u64) -> String {
    format!("v{KEY_VERSION}:movie:details:{id}")
}

/// Key for a search query: `v1:search:{digest}`.
///
/// The query is trimmed and lowercased before hashing, so queries differing
/// only by case or surrounding whitespace share one entry.
pub fn search(query: &str) -> String {
    let normalized = query.trim().to_lowercase();
    format!("v{KEY_VERSION}:search:{}", digest(&normalized))
}

/// Key for a symmetric actor pair: `v1:comparison:{min}:{max}`.
pub fn comparison(a: u64, b: u64) -> String {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    format!("v{KEY_VERSION}:comparison:{lo}:{hi}")
}

/// Key used by the cache health probe.
pub fn health_probe() -> String {
    format!("v{KEY_VERSION}:health:probe")
}

/// Glob-style pattern covering every key in a domain, optionally narrowed to
/// one identifier: `v1:actor:*` or `v1:actor:123:*`. For stores that support
/// pattern deletion.
pub fn invalidation_pattern(domain: &str, id: Option<u64>) -> String {
    match id {
        Some(id) => format!("v{KEY_VERSION}:{domain}:{id}:*"),
        None => format!("v{KEY_VERSION}:{domain}:*"),
    }
}

fn digest(input: &str) -> String {
    let hash = Sha256::digest(input.as_bytes());
    let mut hex = String::with_capacity(DIGEST_LEN);
    for byte in hash.iter().take(DIGEST_LEN / 2) {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}
