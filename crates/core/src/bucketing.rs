//! Deterministic rollout bucketing.
//!
//! Maps `(flag_name, subject_key)` to a bucket in `0..100`. The function is
//! pure, so every process assigns a subject to the same bucket without a
//! shared seed or a remote call. A subject enabled at P% therefore stays
//! enabled at any higher percentage.
//!
//! The flag name is part of the hashed input so that rollouts of different
//! flags are not correlated.

use flaggate_domain::constants::{BUCKET_COUNT, BUCKET_KEY_SEPARATOR};

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Bucket in `0..100` for `subject_key` under `flag_name`.
///
/// An empty `subject_key` still yields a stable bucket, shared by every
/// anonymous subject of the flag.
#[allow(clippy::cast_possible_truncation)]
pub fn bucket(flag_name: &str, subject_key: &str) -> u8 {
    let input = flag_name.bytes().chain(BUCKET_KEY_SEPARATOR.bytes()).chain(subject_key.bytes());
    let hash = fmix32(fnv1a_32(input));

    // always < BUCKET_COUNT
    (hash % BUCKET_COUNT) as u8
}

/// FNV-1a over a byte stream.
fn fnv1a_32(bytes: impl Iterator<Item = u8>) -> u32 {
    bytes.fold(FNV_OFFSET_BASIS, |hash, byte| (hash ^ u32::from(byte)).wrapping_mul(FNV_PRIME))
}

/// Avalanche finalizer: a one-bit input change flips about half the output
/// bits, so neighbouring subject keys land in unrelated buckets.
const fn fmix32(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}
