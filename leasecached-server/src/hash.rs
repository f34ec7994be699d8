//! Non-cryptographic 64-bit key hashing. The lease cache and value store
//! each carve a different slice out of the same hash: the high 32 bits
//! pick a lease slot within a bucket, the low bits pick the bucket (or
//! value-store segment).
use std::hash::Hasher;
use twox_hash::XxHash64;

pub fn hash_key(key: &[u8]) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(key);
    hasher.finish()
}

/// Split a 64-bit hash into a lease tag (high 32 bits) and a bucket
/// index (low bits of the hash, masked to `mask`).
pub fn compute_hash_key_and_index(hash: u64, mask: u32) -> (u32, u32) {
    ((hash >> 32) as u32, hash as u32 & mask)
}
