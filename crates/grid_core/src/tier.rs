//! Node tiers: immutable capacity/throughput profiles.

use serde::{Deserialize, Serialize};

use crate::amount::EnergyAmount;

/// A node's capability tier, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    /// Entry tier.
    Basic,
    /// Second tier.
    Advanced,
    /// Third tier.
    Elite,
    /// Top tier.
    Ultimate,
}

impl Tier {
    /// All tiers, lowest first.
    pub const ALL: [Tier; 4] = [Tier::Basic, Tier::Advanced, Tier::Elite, Tier::Ultimate];

    /// The next tier up; `Ultimate` stays `Ultimate`.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Tier::Basic => Tier::Advanced,
            Tier::Advanced => Tier::Elite,
            Tier::Elite => Tier::Ultimate,
            Tier::Ultimate => Tier::Ultimate,
        }
    }

    /// Stable name for persistence.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Tier::Basic => "basic",
            Tier::Advanced => "advanced",
            Tier::Elite => "elite",
            Tier::Ultimate => "ultimate",
        }
    }

    /// Parse a persisted tier name. Unknown names fall back to `Basic`
    /// rather than failing the load.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "advanced" => Tier::Advanced,
            "elite" => Tier::Elite,
            "ultimate" => Tier::Ultimate,
            _ => Tier::Basic,
        }
    }
}

/// Resolved capacity and throughput for one tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierSpec {
    /// Contribution to a network's pooled capacity.
    pub capacity: EnergyAmount,
    /// Per-step transfer allowance.
    pub transfer_rate: EnergyAmount,
}

/// Per-tier parameters, supplied by configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierTable {
    /// Basic tier parameters.
    pub basic: TierSpec,
    /// Advanced tier parameters.
    pub advanced: TierSpec,
    /// Elite tier parameters.
    pub elite: TierSpec,
    /// Ultimate tier parameters.
    pub ultimate: TierSpec,
}

impl TierTable {
    /// Parameters for the given tier.
    #[must_use]
    pub fn spec(&self, tier: Tier) -> &TierSpec {
        match tier {
            Tier::Basic => &self.basic,
            Tier::Advanced => &self.advanced,
            Tier::Elite => &self.elite,
            Tier::Ultimate => &self.ultimate,
        }
    }
}

impl Default for TierTable {
    fn default() -> Self {
        // Each tier is 10x the previous, capacities 10^48..10^51 and
        // transfer rates 10^44..10^47.
        let tier = |cap_exp: u32, rate_exp: u32| TierSpec {
            capacity: EnergyAmount::pow10(cap_exp),
            transfer_rate: EnergyAmount::pow10(rate_exp),
        };
        Self {
            basic: tier(48, 44),
            advanced: tier(49, 45),
            elite: tier(50, 46),
            ultimate: tier(51, 47),
        }
    }
}
