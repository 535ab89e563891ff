//! # Grid Core
//!
//! Deterministic energy-grid simulation core.
//!
//! This crate contains **only** deterministic logic:
//! - No IO
//! - No system randomness
//! - No floating-point math on the hot path (arbitrary-precision integers)
//!
//! Energy is a conserved quantity: networks pool the capacity of their
//! member nodes, accept emissions up to that capacity, and redistribute
//! the pooled buffer to adjacent acceptors once per step. Graph edits
//! (placing and removing nodes) merge and split networks while moving
//! every unit of buffered energy along with them.
//!
//! ## Crate Structure
//!
//! - [`amount`] - Arbitrary-precision energy arithmetic and formatting
//! - [`container`] - Storage trait and its standard implementations
//! - [`capacity`] - Budget-driven capacity limits
//! - [`convert`] - Foreign energy unit interop
//! - [`network`] - Connected components and per-step distribution
//! - [`registry`] - Placement, merging, splitting, partition lifecycle
//! - [`space`] - Positions and directions
//! - [`tier`] - Node tiers and their capacity table
//! - [`world`] - Acceptor discovery interface
//! - [`config`] - Tunable simulation parameters

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod amount;
pub mod capacity;
pub mod config;
pub mod container;
pub mod convert;
pub mod error;
pub mod network;
pub mod node;
pub mod registry;
pub mod space;
pub mod tier;
pub mod world;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::amount::EnergyAmount;
    pub use crate::capacity::{BudgetSource, CapacityModel, FixedBudget};
    pub use crate::config::{CapacityConfig, GridConfig};
    pub use crate::container::{
        Action, BasicContainer, BudgetBoundContainer, EnergyContainer, MachineContainer,
        RateLimitedContainer, SharedContainer,
    };
    pub use crate::convert::{ForeignConverter, ForeignStorage, Ratio};
    pub use crate::error::{GridError, Result};
    pub use crate::network::{Network, NetworkId, NetworkStepReport};
    pub use crate::node::Node;
    pub use crate::registry::{NetworkRegistry, PartitionId, RegistrySummary, StepReport};
    pub use crate::space::{Direction, Position};
    pub use crate::tier::{Tier, TierSpec, TierTable};
    pub use crate::world::{AcceptorProvider, NullWorld, StaticWorld};
}
