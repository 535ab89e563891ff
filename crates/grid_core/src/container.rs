//! The energy storage contract and its variants.
//!
//! [`EnergyContainer`] is the single seam through which all stored energy
//! mutates: `insert`/`extract` with a simulate/execute mode, clamping
//! `set_energy`, and a save/restore contract that round-trips amounts
//! through their canonical decimal string.
//!
//! Variants compose by delegation rather than inheritance: a bounded pool
//! ([`BasicContainer`]), a budget-bound pool whose ceiling tracks the live
//! [`CapacityModel`](crate::capacity::CapacityModel)
//! ([`BudgetBoundContainer`]), a rate-limiting wrapper
//! ([`RateLimitedContainer`]), and a consumption-gated machine pool
//! ([`MachineContainer`]).

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::amount::EnergyAmount;
use crate::capacity::CapacityModel;

/// Whether an operation commits or only reports what it would do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Commit the transfer and fire change notifications.
    Execute,
    /// Dry-run: report the amount without mutating anything.
    Simulate,
}

impl Action {
    /// True if this action commits.
    #[must_use]
    pub const fn execute(self) -> bool {
        matches!(self, Action::Execute)
    }

    /// True if this action is a dry-run.
    #[must_use]
    pub const fn simulate(self) -> bool {
        matches!(self, Action::Simulate)
    }
}

/// Opaque persisted form of a container's contents.
///
/// The encoding is the amount's canonical decimal string, which round-trips
/// exactly. Malformed state restores to zero rather than failing the load.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContainerState {
    /// Canonical decimal string of the stored amount.
    pub energy: String,
}

/// A shared, externally-owned container handle.
///
/// The simulation is single-threaded and cooperative; acceptors discovered
/// in the world are owned by their hosts and shared with networks through
/// this handle.
pub type SharedContainer = Rc<RefCell<dyn EnergyContainer>>;

/// A mutable energy pool.
///
/// Invariant: `0 <= energy <= max_energy` at every observable point;
/// `set_energy` clamps. Simulate mode must report exactly the amount the
/// matching execute would commit, given no interleaved mutation.
pub trait EnergyContainer {
    /// Current stored amount.
    fn energy(&self) -> EnergyAmount;

    /// Set the stored amount, clamping to `[0, max_energy]` and firing the
    /// change notification if the value changed.
    fn set_energy(&mut self, amount: EnergyAmount);

    /// Current maximum. May be dynamic (see [`BudgetBoundContainer`]).
    fn max_energy(&self) -> EnergyAmount;

    /// Remaining headroom: `max_energy - energy`.
    fn needed(&self) -> EnergyAmount {
        self.max_energy().saturating_sub(&self.energy())
    }

    /// Whether this container accepts insertions.
    fn can_receive(&self) -> bool {
        true
    }

    /// Whether this container allows extraction.
    fn can_extract(&self) -> bool {
        true
    }

    /// Whether the container holds nothing.
    fn is_empty(&self) -> bool {
        self.energy().is_zero()
    }

    /// Whether the container is at its maximum.
    fn is_full(&self) -> bool {
        self.energy() >= self.max_energy()
    }

    /// Insert up to `amount`, returning the amount that is (or would be)
    /// accepted. No-op when `amount` is zero or receiving is disabled.
    fn insert(&mut self, amount: &EnergyAmount, action: Action) -> EnergyAmount {
        if amount.is_zero() || !self.can_receive() {
            return EnergyAmount::zero();
        }
        let to_insert = amount.capped_at(&self.needed());
        if action.execute() && !to_insert.is_zero() {
            let updated = self.energy().add(&to_insert);
            self.set_energy(updated);
        }
        to_insert
    }

    /// Extract up to `amount`, returning the amount that is (or would be)
    /// removed. No-op when `amount` is zero or extraction is disabled.
    fn extract(&mut self, amount: &EnergyAmount, action: Action) -> EnergyAmount {
        if amount.is_zero() || !self.can_extract() {
            return EnergyAmount::zero();
        }
        let current = self.energy();
        let to_extract = amount.capped_at(&current);
        if action.execute() && !to_extract.is_zero() {
            self.set_energy(current.saturating_sub(&to_extract));
        }
        to_extract
    }

    /// Persist the contents.
    fn save(&self) -> ContainerState {
        ContainerState {
            energy: self.energy().canonical_string(),
        }
    }

    /// Restore previously persisted contents. Malformed amounts restore to
    /// zero; the surrounding load never fails.
    fn restore(&mut self, state: &ContainerState) {
        self.set_energy(EnergyAmount::parse_or_zero(&state.energy));
    }
}

type ChangeCallback = Box<dyn FnMut()>;

/// Bounded container with a fixed declared maximum.
pub struct BasicContainer {
    stored: EnergyAmount,
    max: EnergyAmount,
    receive_enabled: bool,
    extract_enabled: bool,
    on_changed: Option<ChangeCallback>,
}

impl BasicContainer {
    /// Create an empty container with the given maximum.
    #[must_use]
    pub fn new(max: EnergyAmount) -> Self {
        Self::with_access(max, true, true)
    }

    /// Create a container with explicit receive/extract permissions.
    #[must_use]
    pub fn with_access(max: EnergyAmount, receive_enabled: bool, extract_enabled: bool) -> Self {
        Self {
            stored: EnergyAmount::zero(),
            max,
            receive_enabled,
            extract_enabled,
            on_changed: None,
        }
    }

    /// Register the change-notification hook (builder style).
    #[must_use]
    pub fn on_changed(mut self, callback: ChangeCallback) -> Self {
        self.on_changed = Some(callback);
        self
    }

    fn notify(&mut self) {
        if let Some(callback) = self.on_changed.as_mut() {
            callback();
        }
    }
}

impl EnergyContainer for BasicContainer {
    fn energy(&self) -> EnergyAmount {
        self.stored.clone()
    }

    fn set_energy(&mut self, amount: EnergyAmount) {
        let clamped = amount.capped_at(&self.max);
        if clamped != self.stored {
            self.stored = clamped;
            self.notify();
        }
    }

    fn max_energy(&self) -> EnergyAmount {
        self.max.clone()
    }

    fn can_receive(&self) -> bool {
        self.receive_enabled
    }

    fn can_extract(&self) -> bool {
        self.extract_enabled
    }
}

impl fmt::Debug for BasicContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicContainer")
            .field("stored", &self.stored)
            .field("max", &self.max)
            .field("receive_enabled", &self.receive_enabled)
            .field("extract_enabled", &self.extract_enabled)
            .finish_non_exhaustive()
    }
}

/// Container whose maximum is the live budget-derived capacity.
///
/// Often called "unbounded": it accepts anything up to whatever the
/// [`CapacityModel`] currently allows. The ceiling is evaluated on every
/// query rather than cached per instance, so a budget change takes effect
/// immediately. Extraction is refused only when empty.
pub struct BudgetBoundContainer {
    stored: EnergyAmount,
    capacity: Rc<CapacityModel>,
    on_changed: Option<ChangeCallback>,
}

impl BudgetBoundContainer {
    /// Create an empty container over the shared capacity model.
    #[must_use]
    pub fn new(capacity: Rc<CapacityModel>) -> Self {
        Self {
            stored: EnergyAmount::zero(),
            capacity,
            on_changed: None,
        }
    }

    /// Register the change-notification hook (builder style).
    #[must_use]
    pub fn on_changed(mut self, callback: ChangeCallback) -> Self {
        self.on_changed = Some(callback);
        self
    }

    fn notify(&mut self) {
        if let Some(callback) = self.on_changed.as_mut() {
            callback();
        }
    }
}

impl EnergyContainer for BudgetBoundContainer {
    fn energy(&self) -> EnergyAmount {
        self.stored.clone()
    }

    fn set_energy(&mut self, amount: EnergyAmount) {
        let clamped = self.capacity.clamp_to_limit(&amount);
        if clamped != self.stored {
            self.stored = clamped;
            self.notify();
        }
    }

    fn max_energy(&self) -> EnergyAmount {
        self.capacity.current_max()
    }

    fn can_receive(&self) -> bool {
        true
    }

    fn can_extract(&self) -> bool {
        !self.stored.is_zero()
    }
}

impl fmt::Debug for BudgetBoundContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BudgetBoundContainer")
            .field("stored", &self.stored)
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

/// Wrapper that clamps each insert/extract to a per-operation rate before
/// delegating to the inner container.
#[derive(Debug)]
pub struct RateLimitedContainer<C: EnergyContainer> {
    inner: C,
    rate: EnergyAmount,
}

impl<C: EnergyContainer> RateLimitedContainer<C> {
    /// Wrap `inner` with a per-operation transfer rate.
    #[must_use]
    pub fn new(inner: C, rate: EnergyAmount) -> Self {
        Self { inner, rate }
    }

    /// The per-operation rate.
    #[must_use]
    pub fn rate(&self) -> &EnergyAmount {
        &self.rate
    }

    /// Access the wrapped container.
    #[must_use]
    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Unwrap into the inner container.
    #[must_use]
    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<C: EnergyContainer> EnergyContainer for RateLimitedContainer<C> {
    fn energy(&self) -> EnergyAmount {
        self.inner.energy()
    }

    fn set_energy(&mut self, amount: EnergyAmount) {
        self.inner.set_energy(amount);
    }

    fn max_energy(&self) -> EnergyAmount {
        self.inner.max_energy()
    }

    fn can_receive(&self) -> bool {
        self.inner.can_receive()
    }

    fn can_extract(&self) -> bool {
        self.inner.can_extract()
    }

    fn insert(&mut self, amount: &EnergyAmount, action: Action) -> EnergyAmount {
        let limited = amount.capped_at(&self.rate);
        self.inner.insert(&limited, action)
    }

    fn extract(&mut self, amount: &EnergyAmount, action: Action) -> EnergyAmount {
        let limited = amount.capped_at(&self.rate);
        self.inner.extract(&limited, action)
    }
}

/// Bounded container for a consuming machine: insertions are clamped to an
/// input rate, and a fixed per-step usage amount can be drawn atomically.
pub struct MachineContainer {
    inner: BasicContainer,
    input_rate: EnergyAmount,
    usage_rate: EnergyAmount,
}

impl MachineContainer {
    /// Create an empty machine pool.
    #[must_use]
    pub fn new(max: EnergyAmount, input_rate: EnergyAmount, usage_rate: EnergyAmount) -> Self {
        Self {
            inner: BasicContainer::new(max),
            input_rate,
            usage_rate,
        }
    }

    /// Whether one step's worth of usage is available.
    #[must_use]
    pub fn has_enough_energy(&self) -> bool {
        self.inner.energy() >= self.usage_rate
    }

    /// Consume one step's usage. Fails without mutating when insufficient.
    pub fn consume_energy(&mut self) -> bool {
        if self.has_enough_energy() {
            let remaining = self.inner.energy().saturating_sub(&self.usage_rate);
            self.inner.set_energy(remaining);
            true
        } else {
            false
        }
    }

    /// The per-operation input rate.
    #[must_use]
    pub fn input_rate(&self) -> &EnergyAmount {
        &self.input_rate
    }

    /// The per-step usage amount.
    #[must_use]
    pub fn usage_rate(&self) -> &EnergyAmount {
        &self.usage_rate
    }
}

impl EnergyContainer for MachineContainer {
    fn energy(&self) -> EnergyAmount {
        self.inner.energy()
    }

    fn set_energy(&mut self, amount: EnergyAmount) {
        self.inner.set_energy(amount);
    }

    fn max_energy(&self) -> EnergyAmount {
        self.inner.max_energy()
    }

    fn insert(&mut self, amount: &EnergyAmount, action: Action) -> EnergyAmount {
        let limited = amount.capped_at(&self.input_rate);
        self.inner.insert(&limited, action)
    }
}

impl fmt::Debug for MachineContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MachineContainer")
            .field("inner", &self.inner)
            .field("input_rate", &self.input_rate)
            .field("usage_rate", &self.usage_rate)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capacity::FixedBudget;

    fn amt(units: u64) -> EnergyAmount {
        EnergyAmount::from_units(units)
    }

    #[test]
    fn test_insert_clamps_to_needed() {
        let mut container = BasicContainer::new(amt(100));
        let accepted = container.insert(&amt(150), Action::Execute);
        assert_eq!(accepted, amt(100));
        assert_eq!(container.energy(), amt(100));
        assert!(container.is_full());

        // Full container accepts nothing more.
        assert_eq!(container.insert(&amt(1), Action::Execute), EnergyAmount::zero());
        assert_eq!(container.energy(), amt(100));
    }

    #[test]
    fn test_simulate_reports_without_mutating() {
        let mut container = BasicContainer::new(amt(100));
        container.set_energy(amt(40));

        let simulated = container.insert(&amt(80), Action::Simulate);
        assert_eq!(container.energy(), amt(40));

        let committed = container.insert(&amt(80), Action::Execute);
        assert_eq!(simulated, committed);
        assert_eq!(container.energy(), amt(100));
    }

    #[test]
    fn test_extract_bounded_by_current() {
        let mut container = BasicContainer::new(amt(100));
        container.set_energy(amt(30));

        let removed = container.extract(&amt(50), Action::Execute);
        assert_eq!(removed, amt(30));
        assert!(container.is_empty());
    }

    #[test]
    fn test_extract_then_insert_round_trip() {
        let mut container = BasicContainer::new(amt(100));
        container.set_energy(amt(77));

        let all = container.extract(&container.energy(), Action::Execute);
        assert!(container.is_empty());
        let back = container.insert(&all, Action::Execute);
        assert_eq!(back, amt(77));
        assert_eq!(container.energy(), amt(77));
    }

    #[test]
    fn test_access_flags() {
        let mut sink = BasicContainer::with_access(amt(100), true, false);
        sink.set_energy(amt(50));
        assert_eq!(sink.extract(&amt(10), Action::Execute), EnergyAmount::zero());
        assert_eq!(sink.energy(), amt(50));

        let mut source = BasicContainer::with_access(amt(100), false, true);
        assert_eq!(source.insert(&amt(10), Action::Execute), EnergyAmount::zero());
        assert!(source.is_empty());
    }

    #[test]
    fn test_change_notification_fires_on_real_change_only() {
        use std::cell::Cell;
        use std::rc::Rc;

        let changes = Rc::new(Cell::new(0u32));
        let counter = Rc::clone(&changes);
        let mut container =
            BasicContainer::new(amt(100)).on_changed(Box::new(move || {
                counter.set(counter.get() + 1);
            }));

        container.insert(&amt(10), Action::Execute);
        assert_eq!(changes.get(), 1);
        container.insert(&amt(0), Action::Execute);
        container.insert(&amt(10), Action::Simulate);
        assert_eq!(changes.get(), 1);
        container.set_energy(amt(10)); // unchanged value
        assert_eq!(changes.get(), 1);
    }

    #[test]
    fn test_budget_bound_tracks_live_capacity() {
        let model = Rc::new(CapacityModel::new(
            EnergyAmount::pow10(3),
            amt(10),
            true,
            Box::new(FixedBudget(5)),
        ));
        let mut container = BudgetBoundContainer::new(Rc::clone(&model));

        assert_eq!(container.max_energy(), amt(5000));
        assert!(container.can_receive());
        assert!(!container.can_extract());

        container.insert(&amt(9999), Action::Execute);
        assert_eq!(container.energy(), amt(5000));
        assert!(container.can_extract());
    }

    #[test]
    fn test_rate_limited_clamps_each_operation() {
        let mut container = RateLimitedContainer::new(BasicContainer::new(amt(1000)), amt(25));
        assert_eq!(container.insert(&amt(100), Action::Execute), amt(25));
        assert_eq!(container.insert(&amt(100), Action::Execute), amt(25));
        assert_eq!(container.energy(), amt(50));

        assert_eq!(container.extract(&amt(100), Action::Execute), amt(25));
        assert_eq!(container.energy(), amt(25));
    }

    #[test]
    fn test_machine_gating() {
        let mut machine = MachineContainer::new(amt(100), amt(40), amt(30));
        assert!(!machine.has_enough_energy());
        assert!(!machine.consume_energy());
        assert!(machine.is_empty());

        // Input rate caps a single insertion.
        assert_eq!(machine.insert(&amt(100), Action::Execute), amt(40));
        assert!(machine.has_enough_energy());
        assert!(machine.consume_energy());
        assert_eq!(machine.energy(), amt(10));

        // Below the usage rate: fails without mutating.
        assert!(!machine.consume_energy());
        assert_eq!(machine.energy(), amt(10));
    }

    #[test]
    fn test_save_restore_round_trip() {
        let mut container = BasicContainer::new(EnergyAmount::pow10(60));
        container.set_energy(EnergyAmount::pow10(55).add(&amt(3)));

        let state = container.save();
        let mut restored = BasicContainer::new(EnergyAmount::pow10(60));
        restored.restore(&state);
        assert_eq!(restored.energy(), container.energy());
    }

    #[test]
    fn test_restore_malformed_state_yields_zero() {
        let mut container = BasicContainer::new(amt(100));
        container.set_energy(amt(50));
        container.restore(&ContainerState {
            energy: "garbage".to_owned(),
        });
        assert!(container.is_empty());
    }
}
