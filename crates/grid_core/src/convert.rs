//! Conversion to and from the foreign energy protocol.
//!
//! Foreign consumers speak a bounded-integer protocol (`u64` units with a
//! configured ceiling). Two independent rational rates govern conversion,
//! one per direction, so asymmetric exchange rates are expressible.
//! Conversion is exact integer mul-then-div; the only loss is the final
//! floor, which the distribution algorithm accounts for by debiting
//! actually-accepted amounts.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::amount::EnergyAmount;
use crate::container::{Action, EnergyContainer, SharedContainer};
use crate::error::GridError;

/// A rational rate as a numerator/denominator pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ratio {
    /// Numerator, at least 1.
    pub numerator: u64,
    /// Denominator, at least 1.
    pub denominator: u64,
}

impl Ratio {
    /// A 1:1 rate.
    pub const ONE: Self = Self {
        numerator: 1,
        denominator: 1,
    };

    /// Create a validated ratio.
    pub fn new(numerator: u64, denominator: u64) -> Result<Self, GridError> {
        if numerator == 0 || denominator == 0 {
            return Err(GridError::InvalidRatio {
                numerator,
                denominator,
            });
        }
        Ok(Self {
            numerator,
            denominator,
        })
    }

    /// Apply the rate to an amount: `amount * numerator / denominator`,
    /// multiplied before the floor division.
    #[must_use]
    pub fn apply(&self, amount: &EnergyAmount) -> EnergyAmount {
        amount.mul_scalar(self.numerator).div_scalar(self.denominator)
    }

    /// Whether the ratio is structurally valid.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.numerator != 0 && self.denominator != 0
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// Converter between native amounts and foreign protocol units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignConverter {
    /// Rate applied when converting native amounts to foreign units.
    pub native_to_foreign: Ratio,
    /// Rate applied when converting foreign units to native amounts.
    pub foreign_to_native: Ratio,
    /// Largest representable foreign value; conversions clamp to it.
    pub foreign_max: u64,
}

impl ForeignConverter {
    /// Convert a native amount to foreign units, clamped to
    /// `[0, foreign_max]`.
    #[must_use]
    pub fn to_foreign(&self, amount: &EnergyAmount) -> u64 {
        let converted = self.native_to_foreign.apply(amount);
        converted
            .as_biguint()
            .to_u64()
            .map_or(self.foreign_max, |units| units.min(self.foreign_max))
    }

    /// Convert foreign units to a native amount.
    #[must_use]
    pub fn from_foreign(&self, units: u64) -> EnergyAmount {
        self.foreign_to_native.apply(&EnergyAmount::from_units(units))
    }
}

impl Default for ForeignConverter {
    fn default() -> Self {
        // 1 native = 1/5 foreign, 1 foreign = 5 native; foreign values are
        // bounded by the protocol's signed 32-bit range.
        Self {
            native_to_foreign: Ratio {
                numerator: 1,
                denominator: 5,
            },
            foreign_to_native: Ratio {
                numerator: 5,
                denominator: 1,
            },
            foreign_max: i32::MAX as u64,
        }
    }
}

/// The foreign storage protocol: bounded-integer receive/extract with a
/// simulate flag.
pub trait ForeignStorage {
    /// Currently stored foreign units.
    fn stored(&self) -> u64;

    /// Storage ceiling in foreign units.
    fn capacity(&self) -> u64;

    /// Accept up to `max_receive` units; returns the accepted amount.
    fn receive(&mut self, max_receive: u64, simulate: bool) -> u64;

    /// Release up to `max_extract` units; returns the released amount.
    fn extract(&mut self, max_extract: u64, simulate: bool) -> u64;

    /// Whether the storage accepts input.
    fn can_receive(&self) -> bool {
        true
    }

    /// Whether the storage allows output.
    fn can_extract(&self) -> bool {
        true
    }
}

/// Minimal in-memory foreign storage, for tests and scenario drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignBuffer {
    stored: u64,
    capacity: u64,
}

impl ForeignBuffer {
    /// Create an empty buffer with the given ceiling.
    #[must_use]
    pub const fn new(capacity: u64) -> Self {
        Self {
            stored: 0,
            capacity,
        }
    }
}

impl ForeignStorage for ForeignBuffer {
    fn stored(&self) -> u64 {
        self.stored
    }

    fn capacity(&self) -> u64 {
        self.capacity
    }

    fn receive(&mut self, max_receive: u64, simulate: bool) -> u64 {
        let accepted = max_receive.min(self.capacity - self.stored);
        if !simulate {
            self.stored += accepted;
        }
        accepted
    }

    fn extract(&mut self, max_extract: u64, simulate: bool) -> u64 {
        let released = max_extract.min(self.stored);
        if !simulate {
            self.stored -= released;
        }
        released
    }
}

/// A shared foreign storage handle.
pub type SharedForeignStorage = Rc<RefCell<dyn ForeignStorage>>;

/// A foreign storage viewed as a native [`EnergyContainer`].
///
/// This is how foreign consumers appear as network acceptors: their demand
/// is converted into native units, and insertions cross the protocol
/// boundary through the converter.
pub struct ForeignAcceptor {
    storage: SharedForeignStorage,
    converter: ForeignConverter,
}

impl ForeignAcceptor {
    /// Wrap a foreign storage with the given converter.
    #[must_use]
    pub fn new(storage: SharedForeignStorage, converter: ForeignConverter) -> Self {
        Self { storage, converter }
    }
}

impl EnergyContainer for ForeignAcceptor {
    fn energy(&self) -> EnergyAmount {
        self.converter.from_foreign(self.storage.borrow().stored())
    }

    fn set_energy(&mut self, amount: EnergyAmount) {
        // The foreign protocol has no direct setter; adjust through
        // receive/extract.
        let target = self.converter.to_foreign(&amount);
        let current = self.storage.borrow().stored();
        let mut storage = self.storage.borrow_mut();
        if target > current {
            storage.receive(target - current, false);
        } else if target < current {
            storage.extract(current - target, false);
        }
    }

    fn max_energy(&self) -> EnergyAmount {
        self.converter.from_foreign(self.storage.borrow().capacity())
    }

    fn can_receive(&self) -> bool {
        self.storage.borrow().can_receive()
    }

    fn can_extract(&self) -> bool {
        self.storage.borrow().can_extract()
    }

    fn insert(&mut self, amount: &EnergyAmount, action: Action) -> EnergyAmount {
        if amount.is_zero() || !self.can_receive() {
            return EnergyAmount::zero();
        }
        let foreign = self.converter.to_foreign(amount);
        let accepted = self.storage.borrow_mut().receive(foreign, action.simulate());
        self.converter.from_foreign(accepted)
    }

    fn extract(&mut self, amount: &EnergyAmount, action: Action) -> EnergyAmount {
        if amount.is_zero() || !self.can_extract() {
            return EnergyAmount::zero();
        }
        let foreign = self.converter.to_foreign(amount);
        let released = self.storage.borrow_mut().extract(foreign, action.simulate());
        self.converter.from_foreign(released)
    }
}

impl fmt::Debug for ForeignAcceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForeignAcceptor")
            .field("converter", &self.converter)
            .finish_non_exhaustive()
    }
}

/// A native container viewed through the foreign protocol, for exporting
/// energy to foreign machines.
pub struct NativeAsForeign {
    container: SharedContainer,
    converter: ForeignConverter,
}

impl NativeAsForeign {
    /// Wrap a native container with the given converter.
    #[must_use]
    pub fn new(container: SharedContainer, converter: ForeignConverter) -> Self {
        Self {
            container,
            converter,
        }
    }
}

impl ForeignStorage for NativeAsForeign {
    fn stored(&self) -> u64 {
        self.converter.to_foreign(&self.container.borrow().energy())
    }

    fn capacity(&self) -> u64 {
        self.converter.to_foreign(&self.container.borrow().max_energy())
    }

    fn receive(&mut self, max_receive: u64, simulate: bool) -> u64 {
        if max_receive == 0 {
            return 0;
        }
        let native = self.converter.from_foreign(max_receive);
        let action = if simulate { Action::Simulate } else { Action::Execute };
        let accepted = self.container.borrow_mut().insert(&native, action);
        self.converter.to_foreign(&accepted)
    }

    fn extract(&mut self, max_extract: u64, simulate: bool) -> u64 {
        if max_extract == 0 {
            return 0;
        }
        let native = self.converter.from_foreign(max_extract);
        let action = if simulate { Action::Simulate } else { Action::Execute };
        let released = self.container.borrow_mut().extract(&native, action);
        self.converter.to_foreign(&released)
    }

    fn can_receive(&self) -> bool {
        self.container.borrow().can_receive()
    }

    fn can_extract(&self) -> bool {
        self.container.borrow().can_extract()
    }
}

impl fmt::Debug for NativeAsForeign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeAsForeign")
            .field("converter", &self.converter)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::BasicContainer;

    fn amt(units: u64) -> EnergyAmount {
        EnergyAmount::from_units(units)
    }

    #[test]
    fn test_ratio_rejects_zero_parts() {
        assert!(Ratio::new(0, 5).is_err());
        assert!(Ratio::new(5, 0).is_err());
        assert!(Ratio::new(1, 1).is_ok());
    }

    #[test]
    fn test_to_foreign_clamps_to_max() {
        let converter = ForeignConverter::default();
        let huge = EnergyAmount::pow10(40);
        assert_eq!(converter.to_foreign(&huge), i32::MAX as u64);
        assert_eq!(converter.to_foreign(&EnergyAmount::zero()), 0);
    }

    #[test]
    fn test_default_rates() {
        let converter = ForeignConverter::default();
        // 1 foreign = 5 native.
        assert_eq!(converter.from_foreign(10), amt(50));
        // 5 native = 1 foreign; 4 native floors to 0.
        assert_eq!(converter.to_foreign(&amt(25)), 5);
        assert_eq!(converter.to_foreign(&amt(4)), 0);
    }

    #[test]
    fn test_foreign_acceptor_reports_native_demand() {
        let storage: SharedForeignStorage =
            Rc::new(RefCell::new(ForeignBuffer::new(100)));
        let acceptor = ForeignAcceptor::new(storage, ForeignConverter::default());
        // 100 foreign capacity = 500 native.
        assert_eq!(acceptor.needed(), amt(500));
    }

    #[test]
    fn test_foreign_acceptor_insert_crosses_boundary() {
        let storage: SharedForeignStorage =
            Rc::new(RefCell::new(ForeignBuffer::new(100)));
        let mut acceptor =
            ForeignAcceptor::new(Rc::clone(&storage), ForeignConverter::default());

        // 50 native -> 10 foreign accepted -> reported as 50 native.
        let accepted = acceptor.insert(&amt(50), Action::Execute);
        assert_eq!(accepted, amt(50));
        assert_eq!(storage.borrow().stored(), 10);

        // Sub-unit amounts floor to zero foreign and are not accepted.
        let accepted = acceptor.insert(&amt(4), Action::Execute);
        assert_eq!(accepted, EnergyAmount::zero());
        assert_eq!(storage.borrow().stored(), 10);
    }

    #[test]
    fn test_native_as_foreign_round_trip() {
        let container: SharedContainer =
            Rc::new(RefCell::new(BasicContainer::new(amt(1000))));
        let mut view = NativeAsForeign::new(Rc::clone(&container), ForeignConverter::default());

        // 20 foreign = 100 native, accepted in full.
        assert_eq!(view.receive(20, false), 20);
        assert_eq!(container.borrow().energy(), amt(100));
        assert_eq!(view.stored(), 20);

        assert_eq!(view.extract(5, false), 5);
        assert_eq!(container.borrow().energy(), amt(75));
    }

    #[test]
    fn test_simulate_does_not_mutate_foreign_storage() {
        let storage: SharedForeignStorage =
            Rc::new(RefCell::new(ForeignBuffer::new(100)));
        let mut acceptor =
            ForeignAcceptor::new(Rc::clone(&storage), ForeignConverter::default());

        let simulated = acceptor.insert(&amt(50), Action::Simulate);
        assert_eq!(simulated, amt(50));
        assert_eq!(storage.borrow().stored(), 0);
    }
}
