use crate::error::{CoordError, Result};
use crate::model::ShardId;

/// Pure function: `guild_id -> shard_id`, per Discord's
/// `(guild_id >> 22) mod total_shards` sharding formula.
pub struct ShardCalculator;

impl ShardCalculator {
    /// Parses `guild_id` as an unsigned 64-bit decimal snowflake and
    /// computes `(value >> 22) mod total`. `total <= 0` is
    /// `InvalidArgument`. Parse failures fall back to a stable hash of the
    /// string, for non-guild callers; callers SHOULD pass guild snowflakes.
    pub fn shard_id(guild_id: &str, total: i64) -> Result<ShardId> {
        if total <= 0 {
            return Err(CoordError::InvalidArgument(format!(
                "total_shards must be positive, got {total}"
            )));
        }
        let total = total as u64;

        let value = guild_id
            .parse::<u64>()
            .unwrap_or_else(|_| Self::stable_hash(guild_id));

        Ok(((value >> 22) % total) as ShardId)
    }

    /// FNV-1a over the raw bytes. Used only when `guild_id` does not parse
    /// as a u64 snowflake.
    fn stable_hash(input: &str) -> u64 {
        const FNV_OFFSET: u64 = 0xcbf29ce484222325;
        const FNV_PRIME: u64 = 0x100000001b3;
        let mut hash = FNV_OFFSET;
        for byte in input.as_bytes() {
            hash ^= *byte as u64;
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shard_hash_matches_discord_formula() {
        // S5: total_shards=16, guild 81384788765712384 -> shard 3.
        let shard = ShardCalculator::shard_id("81384788765712384", 16).unwrap();
        assert_eq!(shard, 3);
    }

    #[test]
    fn single_shard_always_zero() {
        assert_eq!(ShardCalculator::shard_id("81384788765712384", 1).unwrap(), 0);
        assert_eq!(ShardCalculator::shard_id("1", 1).unwrap(), 0);
    }

    #[test]
    fn zero_or_negative_total_is_invalid_argument() {
        assert!(matches!(
            ShardCalculator::shard_id("1", 0),
            Err(CoordError::InvalidArgument(_))
        ));
        assert!(matches!(
            ShardCalculator::shard_id("1", -1),
            Err(CoordError::InvalidArgument(_))
        ));
    }

    #[test]
    fn non_numeric_ids_fall_back_to_stable_hash_deterministically() {
        let a = ShardCalculator::shard_id("not-a-snowflake", 8).unwrap();
        let b = ShardCalculator::shard_id("not-a-snowflake", 8).unwrap();
        assert_eq!(a, b);
        assert!(a < 8);
    }
}
