//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the grid simulation produces
//! identical results given identical inputs.
//!
//! # Testing Strategy
//!
//! The simulation must be fully reproducible: the same sequence of
//! placements, removals, and emissions always yields the same buffers.
//! Sources of non-determinism to guard against:
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   Networks and members live in ordered maps and are iterated sorted.
//!
//! - **Floating-point math**: distribution uses exact integer
//!   multiply-then-divide, never ratios through `f64`.
//!
//! - **Interior mutability**: acceptor state is observed through a
//!   snapshot taken at a fixed point in each step.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use grid_core::registry::NetworkRegistry;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Fingerprints from each run.
    pub fingerprints: Vec<u64>,
    /// Number of steps simulated.
    pub steps: u64,
}

impl DeterminismResult {
    /// Assert that the runs matched, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different fingerprints.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let mut unique = self.fingerprints.clone();
            unique.sort_unstable();
            unique.dedup();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Steps: {}\n\
                 Unique fingerprints: {} (expected 1)\n\
                 All fingerprints: {:?}",
                self.fingerprints.len(),
                self.steps,
                unique.len(),
                self.fingerprints
            );
        }
    }
}

/// Run a scenario multiple times and verify the final states match.
///
/// # Arguments
///
/// * `runs` - Number of times to run the scenario
/// * `steps` - Number of steps per run
/// * `setup` - Function to create the initial state
/// * `step` - Function to advance the state by one step
/// * `fingerprint` - Function to reduce final state to a hash
pub fn verify_determinism<S, Setup, Step, Fp>(
    runs: usize,
    steps: u64,
    setup: Setup,
    step: Step,
    fingerprint: Fp,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    Fp: Fn(&S) -> u64,
{
    let mut fingerprints = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();
        for _ in 0..steps {
            step(&mut state);
        }
        fingerprints.push(fingerprint(&state));
    }

    let is_deterministic = fingerprints.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        fingerprints,
        steps,
    }
}

/// Reduce a registry to a single hash covering topology and buffers.
///
/// Two registries with the same partitions, networks, memberships, and
/// buffer contents fingerprint identically.
#[must_use]
pub fn registry_fingerprint(registry: &NetworkRegistry) -> u64 {
    let mut hasher = DefaultHasher::new();
    for partition in registry.partition_ids() {
        partition.0.hash(&mut hasher);
        for network in registry.networks_in(partition) {
            network.id().0.hash(&mut hasher);
            for member in network.members() {
                member.hash(&mut hasher);
            }
            network.buffer().canonical_string().hash(&mut hasher);
            network.capacity().canonical_string().hash(&mut hasher);
        }
    }
    hasher.finish()
}

/// Proptest strategies for grid inputs.
pub mod strategies {
    use grid_core::amount::EnergyAmount;
    use grid_core::space::Position;
    use grid_core::tier::Tier;
    use proptest::prelude::*;

    /// An exact amount in a range that exercises multi-digit arithmetic.
    pub fn arb_amount() -> impl Strategy<Value = EnergyAmount> {
        (0u64..=u64::MAX).prop_map(EnergyAmount::from_units)
    }

    /// A small amount suitable for capacity-bounded scenarios.
    pub fn arb_small_amount() -> impl Strategy<Value = EnergyAmount> {
        (0u64..10_000u64).prop_map(EnergyAmount::from_units)
    }

    /// A position within a compact cube around the origin.
    pub fn arb_position() -> impl Strategy<Value = Position> {
        (-8i32..8, -8i32..8, -8i32..8).prop_map(|(x, y, z)| Position::new(x, y, z))
    }

    /// Any node tier.
    pub fn arb_tier() -> impl Strategy<Value = Tier> {
        prop_oneof![
            Just(Tier::Basic),
            Just(Tier::Advanced),
            Just(Tier::Elite),
            Just(Tier::Ultimate),
        ]
    }
}
