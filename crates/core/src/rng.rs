//! Seedable randomness shared by job generation and id assignment.

use parking_lot::Mutex;
use rand::{distributions::Alphanumeric, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Length of generated job and plane ids.
pub const ID_LENGTH: usize = 20;

/// Thread-safe wrapper around a ChaCha generator.
///
/// Seeded instances replay the exact same ids and job boards, which is what
/// tests rely on to assert concrete outcomes.
#[derive(Debug)]
pub struct GameRng(Mutex<ChaCha8Rng>);

impl GameRng {
    /// Deterministic generator.
    pub fn from_seed_u64(seed: u64) -> Self {
        Self(Mutex::new(ChaCha8Rng::seed_from_u64(seed)))
    }

    /// Generator seeded from the operating system.
    pub fn from_entropy() -> Self {
        Self(Mutex::new(ChaCha8Rng::from_entropy()))
    }

    /// Seeded when `seed` is given, otherwise from entropy.
    pub fn from_optional_seed(seed: Option<u64>) -> Self {
        seed.map(Self::from_seed_u64)
            .unwrap_or_else(Self::from_entropy)
    }

    /// Run `f` with exclusive access to the generator.
    pub fn with<T>(&self, f: impl FnOnce(&mut ChaCha8Rng) -> T) -> T {
        f(&mut self.0.lock())
    }

    /// Fresh alphanumeric identifier.
    pub fn random_id(&self) -> String {
        self.with(|rng| random_id(rng))
    }
}

/// Alphanumeric identifier of [`ID_LENGTH`] characters.
pub fn random_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(ID_LENGTH)
        .map(char::from)
        .collect()
}
