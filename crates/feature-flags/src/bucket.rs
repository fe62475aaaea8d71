//! Stable per-user rollout buckets.

use sha2::{Digest, Sha256};

/// Number of rollout buckets; a bucket is always in `0..BUCKET_COUNT`.
pub const BUCKET_COUNT: u64 = 100;

/// Map a user id to its rollout bucket.
///
/// The bucket is the first 8 bytes of `SHA-256(user_id)` read as a
/// big-endian integer, reduced modulo [`BUCKET_COUNT`]. It depends on the id
/// alone, so a user lands in the same bucket for every flag, session and
/// process.
pub fn rollout_bucket(user_id: &str) -> u64 {
    let digest = Sha256::digest(user_id.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix) % BUCKET_COUNT
}
