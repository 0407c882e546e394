//! Gossip target selection.
//!
//! The driver hands a strategy the active peers (self already excluded) and
//! sends to whatever subset comes back. Swapping the strategy is how tests get
//! deterministic fan-out.

use crate::network::types::Address;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

pub trait SpreadStrategy: Send {
    fn targets(&mut self, candidates: &[Address]) -> Vec<Address>;
}

/// Uniform sample of up to `fanout` peers, without replacement.
pub struct RandomSpread {
    fanout: usize,
    rng: StdRng,
}

impl RandomSpread {
    pub fn new(fanout: usize) -> Self {
        Self {
            fanout,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(fanout: usize, seed: u64) -> Self {
        Self {
            fanout,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl SpreadStrategy for RandomSpread {
    fn targets(&mut self, candidates: &[Address]) -> Vec<Address> {
        candidates
            .choose_multiple(&mut self.rng, self.fanout)
            .cloned()
            .collect()
    }
}

/// Every candidate, in the order given.
#[derive(Debug, Default, Clone, Copy)]
pub struct BroadcastSpread;

impl SpreadStrategy for BroadcastSpread {
    fn targets(&mut self, candidates: &[Address]) -> Vec<Address> {
        candidates.to_vec()
    }
}
