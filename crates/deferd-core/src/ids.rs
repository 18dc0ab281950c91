//! Random alphanumeric task ids, redrawn on collision.

use std::sync::{Mutex, PoisonError};

use deferd_model::TaskId;
use rand::{Rng, SeedableRng, distributions::Alphanumeric, rngs::StdRng};

/// Length of generated identifiers.
pub const ID_LEN: usize = 8;

/// Process-wide source of short random task identifiers, seeded once.
#[derive(Debug)]
pub struct IdAllocator {
    rng: Mutex<StdRng>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic allocator for tests.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Draw one identifier; may collide with a live one.
    pub fn draw(&self) -> TaskId {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let id: String = (0..ID_LEN)
            .map(|_| char::from(rng.sample(Alphanumeric)))
            .collect();
        TaskId::from(id)
    }

    /// Draw until `taken` reports the identifier free.
    pub fn allocate(&self, taken: impl Fn(&str) -> bool) -> TaskId {
        loop {
            let id = self.draw();
            if !taken(id.as_str()) {
                return id;
            }
        }
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
