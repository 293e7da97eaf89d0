//! Random choice of buckets
//!
//! Placing chunks is the only randomized step of the index, and it must use a
//! cryptographically secure source. The choice is a capability passed to the
//! distribution so that tests can replace it.

use rand::{rngs::OsRng, Rng};

/// Chooses one candidate uniformly at random
pub trait SecureChooser {
    /// Returns a position in `0..candidates`, with `candidates > 0`
    fn choose_one(&mut self, candidates: usize) -> usize;
}

/// Draws from the operating system's secure random source
#[derive(Default)]
pub struct OsChooser {
    rng: OsRng,
}

impl OsChooser {
    pub fn new() -> Self {
        Self { rng: OsRng }
    }
}

impl SecureChooser for OsChooser {
    fn choose_one(&mut self, candidates: usize) -> usize {
        assert!(candidates > 0, "Cannot choose among zero candidates");
        self.rng.gen_range(0..candidates)
    }
}
