use rand::{rngs::StdRng, Rng, SeedableRng};

use encrypted_index::utils::random::SecureChooser;

/// Reproducible (but still uniform) bucket choice for tests
pub struct SeededChooser {
    rng: StdRng,
}

impl SeededChooser {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl SecureChooser for SeededChooser {
    fn choose_one(&mut self, candidates: usize) -> usize {
        self.rng.gen_range(0..candidates)
    }
}
