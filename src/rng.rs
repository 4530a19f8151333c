//! Per-partition random number generators.
//!
//! Every partition owns exactly one generator, seeded from the run's base
//! seed plus a hash of the partition's role and index. Two partitions never
//! share an engine, so phase-parallel execution cannot perturb the draw
//! sequence, and a serialized partition carries its engine state with it.

use rand::SeedableRng;

/// The engine used throughout the simulation. ChaCha keeps its full state
/// in plain words, so partition serialization round-trips it exactly.
pub type SimRng = rand_chacha::ChaCha12Rng;

/// Derives the generator for the partition identified by `name` (e.g.
/// `"people"` or `"locations"`) and its index within that population.
#[must_use]
pub fn partition_rng(base_seed: u64, name: &str, index: usize) -> SimRng {
    let offset = fxhash::hash64(&format!("{name}#{index}"));
    SimRng::seed_from_u64(base_seed.wrapping_add(offset))
}
