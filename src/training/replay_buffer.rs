use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::ai::Transition;

/// Fixed-capacity ring buffer of transitions with FIFO eviction.
pub struct ReplayBuffer {
    buffer: Vec<Transition>,
    capacity: usize,
    /// Slot the next insertion goes to.
    position: usize,
    total_inserted: u64,
    rng: StdRng,
}

impl ReplayBuffer {
    /// # Panics
    /// If `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        Self::with_rng(capacity, StdRng::from_os_rng())
    }

    pub fn with_seed(capacity: usize, seed: u64) -> Self {
        Self::with_rng(capacity, StdRng::seed_from_u64(seed))
    }

    fn with_rng(capacity: usize, rng: StdRng) -> Self {
        assert!(capacity > 0, "replay capacity must be > 0");
        ReplayBuffer {
            buffer: Vec::with_capacity(capacity),
            capacity,
            position: 0,
            total_inserted: 0,
            rng,
        }
    }

    /// Add a transition. Overwrites the oldest one when full.
    pub fn add(&mut self, transition: Transition) {
        if self.buffer.len() < self.capacity {
            self.buffer.push(transition);
        } else {
            self.buffer[self.position] = transition;
        }
        self.position = (self.position + 1) % self.capacity;
        self.total_inserted += 1;
    }

    /// Uniform random batch, drawn with replacement. When fewer than
    /// `batch_size` transitions are stored, all of them are returned instead.
    pub fn sample_batch(&mut self, batch_size: usize) -> Vec<Transition> {
        if self.buffer.len() < batch_size {
            return self.iter().cloned().collect();
        }
        let len = self.buffer.len();
        (0..batch_size)
            .map(|_| self.buffer[self.rng.random_range(0..len)].clone())
            .collect()
    }

    /// Stored transitions, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        let (newer, older) = if self.buffer.len() < self.capacity {
            (&self.buffer[..], &self.buffer[..0])
        } else {
            self.buffer.split_at(self.position)
        };
        older.iter().chain(newer.iter())
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Insertions since creation, including evicted ones.
    pub fn total_inserted(&self) -> u64 {
        self.total_inserted
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.position = 0;
    }
}
