// rust/engine/src/estimate/seed.rs
#![forbid(unsafe_code)]

/// Salt separating the class-index stream from the shard stream.
pub const CLASS_SALT: u64 = 0xA5A5_A5A5_5A5A_5A5A;
pub const SHARD_SALT: u64 = 0xD1B5_4A32_D192_ED03;

/// SplitMix64 finalizer; a bijection on u64 with good avalanche.
#[inline]
pub fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// RNG seed for one sampling shard of one class.
///
/// Depends only on (base seed, class index, shard index), never on the number
/// of worker threads, so a run is reproducible from its seed alone.
pub fn derive_seed(base_seed: u64, class_index: u64, shard: u64) -> u64 {
    let class_stream = splitmix64(base_seed ^ class_index.wrapping_mul(CLASS_SALT));
    splitmix64(class_stream ^ shard.wrapping_mul(SHARD_SALT).wrapping_add(1))
}
