//! Resolved simulation parameters.
//!
//! The core only ever sees plain values; how they were loaded (file
//! format, defaults layering) is the driver's business. `Default` mirrors
//! the reference deployment's values.

use serde::{Deserialize, Serialize};

use crate::amount::EnergyAmount;
use crate::capacity::{BudgetSource, CapacityModel};
use crate::convert::{ForeignConverter, Ratio};
use crate::error::GridError;
use crate::tier::TierTable;

/// Parameters of the budget-driven capacity model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapacityConfig {
    /// Capacity granted per budget unit.
    pub per_budget_unit: EnergyAmount,
    /// Guaranteed floor regardless of budget.
    pub minimum_guaranteed: EnergyAmount,
    /// When false, capacity is an effectively-unbounded finite sentinel.
    pub limits_enabled: bool,
}

impl CapacityConfig {
    /// Build a [`CapacityModel`] over the given budget source.
    #[must_use]
    pub fn build_model(&self, source: Box<dyn BudgetSource>) -> CapacityModel {
        CapacityModel::new(
            self.per_budget_unit.clone(),
            self.minimum_guaranteed.clone(),
            self.limits_enabled,
            source,
        )
    }
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self {
            per_budget_unit: EnergyAmount::pow10(50),
            minimum_guaranteed: EnergyAmount::pow10(12),
            limits_enabled: true,
        }
    }
}

/// All resolved grid parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Per-tier capacity and throughput.
    pub tiers: TierTable,
    /// Member-count ceiling per network; `None` is unbounded.
    pub max_network_members: Option<usize>,
    /// Acceptor-count ceiling per network scan; `None` is unbounded.
    pub max_network_acceptors: Option<usize>,
    /// Steps between acceptor rescans when the cache is enabled.
    pub acceptor_scan_interval: u32,
    /// When false, acceptors are rescanned every step.
    pub acceptor_cache_enabled: bool,
    /// Per-member buffer loss applied before distribution, if enabled.
    pub distance_loss: Option<Ratio>,
    /// Whether bridging nodes merge adjacent networks.
    pub merging_enabled: bool,
    /// Foreign-protocol conversion rates.
    pub converter: ForeignConverter,
    /// Budget-driven capacity parameters.
    pub capacity: CapacityConfig,
}

impl GridConfig {
    /// Check cross-field validity. Call once after loading.
    pub fn validate(&self) -> Result<(), GridError> {
        if self.acceptor_scan_interval == 0 {
            return Err(GridError::InvalidConfig(
                "acceptor_scan_interval must be at least 1".to_owned(),
            ));
        }
        for ratio in [
            self.converter.native_to_foreign,
            self.converter.foreign_to_native,
        ] {
            if !ratio.is_valid() {
                return Err(GridError::InvalidRatio {
                    numerator: ratio.numerator,
                    denominator: ratio.denominator,
                });
            }
        }
        if let Some(loss) = self.distance_loss {
            if !loss.is_valid() {
                return Err(GridError::InvalidRatio {
                    numerator: loss.numerator,
                    denominator: loss.denominator,
                });
            }
            if loss.numerator > loss.denominator {
                return Err(GridError::InvalidConfig(
                    "distance_loss must not exceed 1 per member".to_owned(),
                ));
            }
        }
        if self.max_network_members == Some(0) || self.max_network_acceptors == Some(0) {
            return Err(GridError::InvalidConfig(
                "network ceilings must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            tiers: TierTable::default(),
            max_network_members: None,
            max_network_acceptors: None,
            acceptor_scan_interval: 20,
            acceptor_cache_enabled: true,
            distance_loss: None,
            merging_enabled: true,
            converter: ForeignConverter::default(),
            capacity: CapacityConfig::default(),
        }
    }
}
