//! Routing key derivation
//!
//! A routing key is `XXH32(name, ROUTING_SEED)`: xxHash, 32-bit variant, over
//! the raw UTF-8 bytes of the stream name (e.g. `device/metric`) with the
//! stream magic as seed. Producers stamp the same value into every frame, so
//! the algorithm and the seed are a deployment contract, not an internal
//! detail. Distinct names may collide; that is accepted.

use std::hash::Hasher;

use twox_hash::XxHash32;

use super::constants::ROUTING_SEED;

/// 32-bit routing key carried in every ingest frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoutingKey(pub u32);

impl RoutingKey {
    /// Derive the key for a stream name
    pub fn from_name(name: impl AsRef<[u8]>) -> Self {
        Self(hash32(name.as_ref(), ROUTING_SEED))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl From<u32> for RoutingKey {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:08X}", self.0)
    }
}

/// Seeded xxHash32
pub fn hash32(bytes: &[u8], seed: u32) -> u32 {
    let mut hasher = XxHash32::with_seed(seed);
    hasher.write(bytes);
    hasher.finish() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_vector() {
        // XXH32 of the empty input with seed 0
        assert_eq!(hash32(b"", 0), 0x02CC_5D05);
    }

    #[test]
    fn test_deterministic() {
        let a = RoutingKey::from_name("device/metric");
        let b = RoutingKey::from_name(String::from("device/metric"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_seed_is_part_of_contract() {
        assert_eq!(RoutingKey::from_name("x").value(), hash32(b"x", ROUTING_SEED));
        assert_ne!(hash32(b"x", ROUTING_SEED), hash32(b"x", 0));
    }

    #[test]
    fn test_empty_name_is_valid() {
        let key = RoutingKey::from_name("");
        assert_eq!(key.value(), hash32(b"", ROUTING_SEED));
    }

    #[test]
    fn test_distinct_names() {
        assert_ne!(
            RoutingKey::from_name("device/temperature"),
            RoutingKey::from_name("device/pressure")
        );
    }

    #[test]
    fn test_display_is_fixed_width_hex() {
        assert_eq!(RoutingKey(0xAABBCCDD).to_string(), "AABBCCDD");
        assert_eq!(RoutingKey(0x1F).to_string(), "0000001F");
    }
}
