//! Budget-driven dynamic capacity.
//!
//! The maximum representable amount is not a constant: it scales with an
//! external, time-varying budget (for example, memory made available to
//! the host process). [`CapacityModel`] maps budget units to a capacity
//! ceiling with a guaranteed floor, caching the result until the budget
//! changes.

use std::cell::RefCell;
use std::fmt;

use crate::amount::EnergyAmount;

/// Supplier of the external resource budget, in whole units.
///
/// The core never measures the budget itself; drivers decide what a unit
/// means (the reference deployment uses MiB of available memory). Reported
/// values may be zero or negative; the model floors them.
pub trait BudgetSource {
    /// Current budget in whole units.
    fn budget_units(&self) -> i64;
}

/// A constant budget, for tests and fixed deployments.
#[derive(Debug, Clone, Copy)]
pub struct FixedBudget(pub i64);

impl BudgetSource for FixedBudget {
    fn budget_units(&self) -> i64 {
        self.0
    }
}

/// Snapshot of the budget and the capacity it currently yields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetSnapshot {
    /// Budget units reported by the source.
    pub budget_units: i64,
    /// Resulting maximum capacity.
    pub max_capacity: EnergyAmount,
}

impl fmt::Display for BudgetSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "budget: {} units | max capacity: {}",
            self.budget_units, self.max_capacity
        )
    }
}

/// Maps the external budget to a maximum representable [`EnergyAmount`].
///
/// The product `per_unit * budget` is floored at `minimum` so a starved
/// budget never collapses capacity to zero. Results are cached keyed by
/// the last-seen budget value and recomputed only when it changes.
pub struct CapacityModel {
    per_unit: EnergyAmount,
    minimum: EnergyAmount,
    limits_enabled: bool,
    source: Box<dyn BudgetSource>,
    cache: RefCell<Option<(i64, EnergyAmount)>>,
}

impl CapacityModel {
    /// Exponent of the finite sentinel returned when limits are disabled.
    /// Large enough to behave as "unbounded" while keeping arithmetic total.
    const UNLIMITED_EXP: u32 = 80;

    /// Create a model over the given budget source.
    #[must_use]
    pub fn new(
        per_unit: EnergyAmount,
        minimum: EnergyAmount,
        limits_enabled: bool,
        source: Box<dyn BudgetSource>,
    ) -> Self {
        Self {
            per_unit,
            minimum,
            limits_enabled,
            source,
            cache: RefCell::new(None),
        }
    }

    /// The sentinel capacity used when limits are disabled.
    #[must_use]
    pub fn unlimited_sentinel() -> EnergyAmount {
        EnergyAmount::pow10(Self::UNLIMITED_EXP)
    }

    /// Maximum capacity for an explicit budget value.
    ///
    /// Never returns less than the configured minimum, even for zero or
    /// negative budgets. The result is cached keyed by `budget_units`.
    #[must_use]
    pub fn max_capacity_for(&self, budget_units: i64) -> EnergyAmount {
        if !self.limits_enabled {
            return Self::unlimited_sentinel();
        }

        if let Some((cached_budget, cached_max)) = self.cache.borrow().as_ref() {
            if *cached_budget == budget_units {
                return cached_max.clone();
            }
        }

        let max = self.compute_max(budget_units);
        *self.cache.borrow_mut() = Some((budget_units, max.clone()));
        max
    }

    /// Maximum capacity for the live budget.
    #[must_use]
    pub fn current_max(&self) -> EnergyAmount {
        self.max_capacity_for(self.source.budget_units())
    }

    /// Whether `amount` fits under the current maximum.
    #[must_use]
    pub fn is_within_limit(&self, amount: &EnergyAmount) -> bool {
        *amount <= self.current_max()
    }

    /// Clamp `amount` to the current maximum.
    #[must_use]
    pub fn clamp_to_limit(&self, amount: &EnergyAmount) -> EnergyAmount {
        amount.capped_at(&self.current_max())
    }

    /// Budget and capacity snapshot for diagnostics.
    #[must_use]
    pub fn snapshot(&self) -> BudgetSnapshot {
        let budget_units = self.source.budget_units();
        BudgetSnapshot {
            budget_units,
            max_capacity: self.max_capacity_for(budget_units),
        }
    }

    fn compute_max(&self, budget_units: i64) -> EnergyAmount {
        if budget_units <= 0 {
            return self.minimum.clone();
        }
        #[allow(clippy::cast_sign_loss)]
        let scaled = self.per_unit.mul_scalar(budget_units as u64);
        scaled.at_least(&self.minimum)
    }
}

impl fmt::Debug for CapacityModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapacityModel")
            .field("per_unit", &self.per_unit)
            .field("minimum", &self.minimum)
            .field("limits_enabled", &self.limits_enabled)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Budget stub that counts how often it is polled and can be mutated.
    struct CountingBudget {
        value: Rc<Cell<i64>>,
        polls: Rc<Cell<u32>>,
    }

    impl BudgetSource for CountingBudget {
        fn budget_units(&self) -> i64 {
            self.polls.set(self.polls.get() + 1);
            self.value.get()
        }
    }

    fn model_with(budget: i64) -> CapacityModel {
        CapacityModel::new(
            EnergyAmount::pow10(6),
            EnergyAmount::from_units(1_000_000),
            true,
            Box::new(FixedBudget(budget)),
        )
    }

    #[test]
    fn test_scales_with_budget() {
        let model = model_with(2048);
        assert_eq!(
            model.current_max(),
            EnergyAmount::pow10(6).mul_scalar(2048)
        );
    }

    #[test]
    fn test_minimum_floor_holds_for_bad_budgets() {
        for budget in [0, -1, i64::MIN] {
            let model = model_with(budget);
            assert_eq!(model.current_max(), EnergyAmount::from_units(1_000_000));
        }
    }

    #[test]
    fn test_cache_recomputes_only_on_budget_change() {
        let value = Rc::new(Cell::new(100));
        let polls = Rc::new(Cell::new(0));
        let model = CapacityModel::new(
            EnergyAmount::pow10(3),
            EnergyAmount::one(),
            true,
            Box::new(CountingBudget {
                value: Rc::clone(&value),
                polls: Rc::clone(&polls),
            }),
        );

        let first = model.current_max();
        let second = model.current_max();
        assert_eq!(first, second);

        value.set(200);
        let third = model.current_max();
        assert_eq!(third, EnergyAmount::pow10(3).mul_scalar(200));
        assert!(third > first);
    }

    #[test]
    fn test_limits_disabled_returns_finite_sentinel() {
        let model = CapacityModel::new(
            EnergyAmount::pow10(6),
            EnergyAmount::one(),
            false,
            Box::new(FixedBudget(1)),
        );
        assert_eq!(model.current_max(), CapacityModel::unlimited_sentinel());
        // Sentinel is finite: arithmetic on it stays total.
        assert!(!model.current_max().add(&EnergyAmount::one()).is_zero());
    }

    #[test]
    fn test_clamp_and_within_limit() {
        let model = model_with(1);
        let max = model.current_max();
        let over = max.add(&EnergyAmount::one());
        assert!(model.is_within_limit(&max));
        assert!(!model.is_within_limit(&over));
        assert_eq!(model.clamp_to_limit(&over), max);
    }
}
