//! The attenuated randomness source.
//!
//! Replaces the default PRNG with a [`StdRng`] seeded from the operating
//! system's entropy source, so snap-visible randomness is never derived
//! from a predictable thread-local state.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A CSPRNG-seeded random source scoped to one snap.
#[derive(Debug)]
pub struct SnapRng {
    rng: Mutex<StdRng>,
}

impl SnapRng {
    /// Create a new source seeded from `OsRng`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// A uniformly distributed value in `[0, 1)`.
    pub fn next_f64(&self) -> f64 {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.gen_range(0.0..1.0)
    }
}

impl Default for SnapRng {
    fn default() -> Self {
        Self::new()
    }
}
