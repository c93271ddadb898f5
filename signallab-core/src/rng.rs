//! Deterministic seed derivation.
//!
//! A master seed is expanded into per-`(scope, label)` sub-seeds via BLAKE3, so
//! bootstrap resampling produces identical output regardless of which worker
//! thread runs it or in which order layers are evaluated.

use rand::rngs::StdRng;
use rand::SeedableRng;

/// Derives independent, reproducible RNG streams from one master seed.
#[derive(Debug, Clone)]
pub struct SeedHierarchy {
    master_seed: u64,
}

impl SeedHierarchy {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Sub-seed for `(scope, label)`. Independent of derivation order.
    pub fn sub_seed(&self, scope: &str, label: &str) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(scope.as_bytes());
        // separator keeps ("ab", "c") and ("a", "bc") apart
        hasher.update(&[0xff]);
        hasher.update(label.as_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }

    /// Seeded `StdRng` for `(scope, label)`.
    pub fn rng_for(&self, scope: &str, label: &str) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(scope, label))
    }
}
