//! Sharder implementation.
use sha1::{Digest, Sha1};

/// Maps an input to one of `total_shards` buckets.
pub(crate) trait Sharder {
    fn get_shard(&self, input: impl AsRef<[u8]>, total_shards: u64) -> u64;
}

/// The default (and only) sharder: first 7 hex digits of the SHA-1 hash, modulo `total_shards`.
pub(crate) struct Sha1Sharder;

impl Sharder for Sha1Sharder {
    fn get_shard(&self, input: impl AsRef<[u8]>, total_shards: u64) -> u64 {
        let hash = Sha1::digest(input);
        // 7 hex digits == 28 bits: the first 3.5 bytes of the hash.
        let value = u32::from_be_bytes([hash[0], hash[1], hash[2], hash[3]]) >> 4;
        u64::from(value) % total_shards
    }
}

/// Percentage bucket in the `0..100` range for the given flag key and user attribute value.
pub(crate) fn percentage_bucket(key: &str, attribute_value: &str) -> u64 {
    Sha1Sharder.get_shard(format!("{key}{attribute_value}"), 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_are_stable_across_sdks() {
        let vectors = [
            ("k", "12345", 85),
            ("stringPercentageFlag", "12345", 51),
            ("test", "a@example.com", 26),
            ("bool30TrueAdvancedRules", "1", 99),
            ("flag", "user-1", 10),
            ("flag", "user-2", 20),
            ("flag", "user-3", 37),
            ("k", "1", 33),
            ("k", "2", 20),
            ("k", "3", 0),
            ("k", "4", 46),
            ("k", "5", 55),
            ("k", "6", 89),
        ];
        for (key, attribute, bucket) in vectors {
            assert_eq!(
                percentage_bucket(key, attribute),
                bucket,
                "{key}/{attribute}"
            );
        }
    }

    #[test]
    fn shard_is_in_range() {
        for i in 0..100 {
            assert!(Sha1Sharder.get_shard(format!("user-{i}"), 7) < 7);
        }
    }
}
