//! Deterministic per-entity and simulation-level RNG wrappers.
//!
//! # Determinism strategy
//!
//! Every node and every vehicle owns an independent `SmallRng` seeded by:
//!
//!   seed = global_seed XOR (stream * MIXING_CONSTANT)
//!
//! where `stream` is the entity's id folded together with a per-kind salt so
//! node 3 and vehicle 3 never share a stream.  The mixing constant is the
//! 64-bit fractional part of the golden ratio.
//!
//! Consequences:
//!
//! - A node's tie-breaks only depend on the order of its own `update` calls,
//!   never on which worker thread ran them.
//! - A vehicle's dash/dawdle draws only depend on its own history, so the
//!   single- and multi-threaded executors produce identical runs.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::{NodeId, VehicleId};

/// 64-bit fractional golden-ratio constant for seed mixing.
const MIXING_CONSTANT: u64 = 0x9e37_79b9_7f4a_7c15;

const NODE_SALT:    u64 = 0x4e4f_4445 << 32;
const VEHICLE_SALT: u64 = 0x5645_4849 << 32;

// ── EntityRng ─────────────────────────────────────────────────────────────────

/// Per-entity deterministic RNG that remembers its seed so it can be reset
/// between scenario runs.
#[derive(Clone, Debug)]
pub struct EntityRng {
    seed: u64,
    rng:  SmallRng,
}

impl EntityRng {
    /// Seed from the run's global seed and an arbitrary stream number.
    pub fn new(global_seed: u64, stream: u64) -> Self {
        let seed = global_seed ^ stream.wrapping_mul(MIXING_CONSTANT);
        Self { seed, rng: SmallRng::seed_from_u64(seed) }
    }

    /// The RNG a node arbiter uses for its random tie-breaks.
    pub fn for_node(global_seed: u64, node: NodeId) -> Self {
        Self::new(global_seed, NODE_SALT | node.0 as u64)
    }

    /// The RNG a vehicle uses for dashing, dawdling and lane-change tendency.
    pub fn for_vehicle(global_seed: u64, vehicle: VehicleId) -> Self {
        Self::new(global_seed, VEHICLE_SALT | vehicle.0 as u64)
    }

    /// Rewind to the initial state.
    pub fn reset(&mut self) {
        self.rng = SmallRng::seed_from_u64(self.seed);
    }

    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Generate a value uniformly in `range`.
    #[inline]
    pub fn gen_range<T, R>(&mut self, range: R) -> T
    where
        T: rand::distributions::uniform::SampleUniform,
        R: rand::distributions::uniform::SampleRange<T>,
    {
        self.rng.gen_range(range)
    }

    /// `true` with probability `p` (clamped to [0, 1]).
    #[inline]
    pub fn gen_bool(&mut self, p: f64) -> bool {
        self.rng.gen_bool(p.clamp(0.0, 1.0))
    }

    /// A fair coin.
    #[inline]
    pub fn coin(&mut self) -> bool {
        self.rng.r#gen()
    }
}

// ── SimRng ────────────────────────────────────────────────────────────────────

/// Simulation-level RNG for scenario set-up (route choice, spawn delays).
///
/// Used only in single-threaded contexts.  Per-entity randomness during a
/// tick always goes through [`EntityRng`].
pub struct SimRng(SmallRng);

impl SimRng {
    pub fn new(seed: u64) -> Self {
        SimRng(SmallRng::seed_from_u64(seed))
    }

    /// Derive a child `SimRng` with a different seed offset.
    pub fn child(&mut self, offset: u64) -> SimRng {
        let child_seed: u64 = self.0.r#gen::<u64>() ^ offset.wrapping_mul(MIXING_CONSTANT);
        SimRng(SmallRng::seed_from_u64(child_seed))
    }

    #[inline]
    pub fn gen_range<T, R>(&mut self, range: R) -> T
    where
        T: rand::distributions::uniform::SampleUniform,
        R: rand::distributions::uniform::SampleRange<T>,
    {
        self.0.gen_range(range)
    }
}
