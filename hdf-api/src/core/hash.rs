//! Service name hashing
//!
//! Registry and observer records are indexed by a 31-bit string hash. The hash
//! is only an index: two names can collide, so every lookup must confirm the
//! full name before treating a record as a match.

const HASH_SEED: u32 = 131;
const HASH_MASK: u32 = 0x7FFF_FFFF;

/// Compute the index key of a service name
pub fn string_hash_key(name: &str) -> u32 {
    let hash = name
        .bytes()
        .fold(0u32, |acc, byte| acc.wrapping_mul(HASH_SEED).wrapping_add(byte as u32));
    hash & HASH_MASK
}
