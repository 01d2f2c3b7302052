// src/core/cluster/slot.rs

//! Implements the cluster hash slot algorithm.

use bytes::Bytes;
use crc::{CRC_16_XMODEM, Crc};

/// The total number of hash slots in the cluster.
pub const NUM_SLOTS: usize = 16384;

/// The CRC16 algorithm used for calculating hash slots.
const CRC16_ALGO: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// Calculates the hash slot for a given key.
///
/// It first checks for a "hash tag"
/// (a substring enclosed in `{...}`) within the key. If a hash tag is found,
/// only the content within the tag is used for the CRC16 calculation. This
/// allows users to force multiple keys into the same hash slot. If no hash
/// tag is found, the entire key is used.
///
/// The final slot is determined by `CRC16(key) % NUM_SLOTS`.
pub fn get_slot(key: &Bytes) -> u16 {
    // Check for a hash tag, e.g., "user:{123}:name".
    if let Some(start) = key.iter().position(|&b| b == b'{')
        && let Some(end_offset) = key[start + 1..].iter().position(|&b| b == b'}')
    {
        let end = start + 1 + end_offset;
        // Ensure the tag is not empty, e.g., "user:{}".
        if end > start + 1 {
            return CRC16_ALGO.checksum(&key[start + 1..end]) % (NUM_SLOTS as u16);
        }
    }
    // If no valid hash tag is found, hash the entire key.
    CRC16_ALGO.checksum(key) % (NUM_SLOTS as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vectors() {
        assert_eq!(get_slot(&Bytes::from_static(b"foo")), 12182);
        assert_eq!(get_slot(&Bytes::from_static(b"bar")), 5061);
    }

    #[test]
    fn hash_tag_routes_to_same_slot() {
        let a = get_slot(&Bytes::from_static(b"user:{42}:name"));
        let b = get_slot(&Bytes::from_static(b"user:{42}:email"));
        assert_eq!(a, b);
    }

    #[test]
    fn empty_hash_tag_falls_back_to_whole_key() {
        let with_empty_tag = get_slot(&Bytes::from_static(b"user:{}:name"));
        let plain = get_slot(&Bytes::from_static(b"user:{}:name"));
        assert_eq!(with_empty_tag, plain);
    }
}
