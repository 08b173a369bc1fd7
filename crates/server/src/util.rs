//! Small shared utilities: id generation and world RNG.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::time::{SystemTime, UNIX_EPOCH};

/// Generate a client id: millisecond timestamp plus a random suffix.
pub fn generate_client_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let suffix: u16 = rand::rng().random();
    format!("{millis}-{suffix:04x}")
}

/// One PRNG per world, seeded from the clock at startup. No security
/// property is required of it.
pub fn world_rng() -> SmallRng {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0x5EED);
    SmallRng::seed_from_u64(nanos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_ids_are_unique_enough() {
        let a = generate_client_id();
        let b = generate_client_id();
        assert!(!a.is_empty());
        // Same millisecond is likely; the random suffix still separates them.
        assert_ne!(a, b);
    }
}
