//! Fixture helpers for building grids, containers, and worlds in tests.

use std::cell::RefCell;
use std::rc::Rc;

use grid_core::amount::EnergyAmount;
use grid_core::capacity::BudgetSource;
use grid_core::config::GridConfig;
use grid_core::container::{BasicContainer, SharedContainer};
use grid_core::network::NetworkId;
use grid_core::registry::{NetworkRegistry, PartitionId};
use grid_core::space::Position;
use grid_core::tier::Tier;
use grid_core::world::StaticWorld;

/// The partition every fixture places into.
pub const TEST_PARTITION: PartitionId = PartitionId(0);

/// Shorthand for an exact energy amount.
#[must_use]
pub fn amt(units: u64) -> EnergyAmount {
    EnergyAmount::from_units(units)
}

/// Shorthand for a position on the x axis.
#[must_use]
pub const fn pos(x: i32) -> Position {
    Position::new(x, 0, 0)
}

/// A config with small round tier capacities so test assertions stay
/// legible: basic 100, advanced 1000, elite 10_000, ultimate 100_000.
#[must_use]
pub fn small_tier_config() -> GridConfig {
    let mut config = GridConfig::default();
    // Transfer rates match capacities so single-call emits in tests are
    // bounded by pool headroom, not the per-node intake allowance.
    config.tiers.basic.capacity = amt(100);
    config.tiers.basic.transfer_rate = amt(100);
    config.tiers.advanced.capacity = amt(1000);
    config.tiers.advanced.transfer_rate = amt(1000);
    config.tiers.elite.capacity = amt(10_000);
    config.tiers.elite.transfer_rate = amt(10_000);
    config.tiers.ultimate.capacity = amt(100_000);
    config.tiers.ultimate.transfer_rate = amt(100_000);
    config
}

/// A registry with [`TEST_PARTITION`] loaded and a line of `len` nodes
/// of the given tier along the x axis, all in one network.
///
/// # Panics
///
/// Panics if placement fails, which cannot happen on a fresh registry.
#[must_use]
pub fn line_registry(len: i32, tier: Tier, config: GridConfig) -> (NetworkRegistry, NetworkId) {
    let mut registry = NetworkRegistry::new(config);
    registry.load_partition(TEST_PARTITION);
    let mut id = None;
    for x in 0..len {
        id = Some(
            registry
                .place_node(TEST_PARTITION, pos(x), tier)
                .unwrap_or_else(|e| panic!("fixture placement failed: {e}")),
        );
    }
    (registry, id.unwrap_or_else(|| unreachable!()))
}

/// A plain shared container with the given maximum and no rate limits.
#[must_use]
pub fn acceptor(max: u64) -> SharedContainer {
    Rc::new(RefCell::new(BasicContainer::new(amt(max))))
}

/// A world exposing one acceptor per listed position.
#[must_use]
pub fn world_with(entries: &[(Position, SharedContainer)]) -> StaticWorld {
    let mut world = StaticWorld::new();
    for (position, container) in entries {
        world.add_acceptor(*position, Rc::clone(container));
    }
    world
}

/// A budget source that records how many times it was queried. Used to
/// assert capacity-cache behavior.
#[derive(Debug, Default)]
pub struct CountingBudget {
    units: std::cell::Cell<i64>,
    queries: Rc<std::cell::Cell<usize>>,
}

impl CountingBudget {
    /// A counting source reporting `units`, plus a handle to the query
    /// counter.
    #[must_use]
    pub fn new(units: i64) -> (Self, Rc<std::cell::Cell<usize>>) {
        let queries = Rc::new(std::cell::Cell::new(0));
        let source = Self {
            units: std::cell::Cell::new(units),
            queries: Rc::clone(&queries),
        };
        (source, queries)
    }

    /// Change the reported budget.
    pub fn set_units(&self, units: i64) {
        self.units.set(units);
    }
}

impl BudgetSource for CountingBudget {
    fn budget_units(&self) -> i64 {
        self.queries.set(self.queries.get() + 1);
        self.units.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_registry_is_one_network() {
        let (registry, id) = line_registry(4, Tier::Basic, small_tier_config());
        let network = registry.network(TEST_PARTITION, id).unwrap();
        assert_eq!(network.member_count(), 4);
        assert_eq!(*network.capacity(), amt(400));
    }

    #[test]
    fn test_counting_budget_counts() {
        let (source, queries) = CountingBudget::new(5);
        assert_eq!(source.budget_units(), 5);
        assert_eq!(source.budget_units(), 5);
        assert_eq!(queries.get(), 2);
    }
}
