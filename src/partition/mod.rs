use crate::core::{DbError, HashTokenRange, Result};

/// Number of distinct tokens in the signed 32-bit hash domain.
pub const HASH_TOKEN_COUNT: u64 = 1 << 32;

/// Splits the hash token domain into `shard_count` contiguous ranges.
///
/// Every range except the last spans `HASH_TOKEN_COUNT / shard_count` tokens.
/// The last range always ends at `i32::MAX` and absorbs the remainder, so it
/// can be up to `shard_count - 1` tokens larger than the others.
pub fn partition_hash_space(shard_count: i32) -> Result<Vec<HashTokenRange>> {
    if shard_count <= 0 {
        return Err(DbError::InvalidArgument(
            "shard_count must be positive".to_string(),
        ));
    }

    let increment = hash_token_increment(shard_count as u32);
    let mut ranges = Vec::with_capacity(shard_count as usize);
    for shard_index in 0..shard_count as u64 {
        ranges.push(range_for_index(shard_index, increment, shard_count as u64));
    }
    Ok(ranges)
}

pub fn hash_token_increment(shard_count: u32) -> u64 {
    HASH_TOKEN_COUNT / shard_count.max(1) as u64
}

fn range_for_index(shard_index: u64, increment: u64, shard_count: u64) -> HashTokenRange {
    // i64 arithmetic: min + increment can exceed i32::MAX before the clamp
    let min = i32::MIN as i64 + (shard_index * increment) as i64;
    let max = if shard_index == shard_count - 1 {
        i32::MAX as i64
    } else {
        min + increment as i64 - 1
    };
    HashTokenRange {
        min: min as i32,
        max: max as i32,
    }
}
