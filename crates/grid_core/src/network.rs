//! Connected components of the grid graph.
//!
//! A [`Network`] pools the capacity of its member nodes into one buffer,
//! discovers acceptors adjacent to any member, and redistributes the
//! buffer once per simulation step. Members and acceptors are kept in
//! ordered maps so every iteration — and therefore every distribution —
//! is deterministic.
//!
//! Topology (who is a member) is decided by the
//! [`NetworkRegistry`](crate::registry::NetworkRegistry); this module owns
//! the per-network state and the per-step distribution algorithm.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::amount::EnergyAmount;
use crate::config::GridConfig;
use crate::container::{Action, SharedContainer};
use crate::space::{Direction, Position};
use crate::world::AcceptorProvider;

/// Stable network identity, assigned monotonically per partition.
///
/// Monotonic ids (rather than random ones) make merge tie-breaking and
/// iteration order reproducible across runs.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct NetworkId(pub u64);

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "net#{}", self.0)
    }
}

/// A discovered acceptor: a position paired with the externally-owned
/// storage found there. Recomputed on scan, never persisted.
#[derive(Clone)]
pub struct AcceptorEndpoint {
    /// World position of the acceptor.
    pub position: Position,
    /// The storage interface discovered at that position.
    pub container: SharedContainer,
}

impl fmt::Debug for AcceptorEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AcceptorEndpoint")
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}

/// What one network did during one step.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NetworkStepReport {
    /// Total amount accepted by acceptors this step.
    pub distributed: EnergyAmount,
    /// Amount removed by distance loss this step.
    pub lost: EnergyAmount,
    /// Number of acceptors that received energy.
    pub acceptors_served: usize,
}

/// One connected component: pooled buffer, member set, discovered
/// acceptors.
///
/// Invariants: `0 <= buffer <= capacity`; every member node's
/// back-reference points here; an invalidated network has no members.
#[derive(Debug)]
pub struct Network {
    id: NetworkId,
    members: BTreeSet<Position>,
    capacity: EnergyAmount,
    buffer: EnergyAmount,
    acceptors: BTreeMap<Position, AcceptorEndpoint>,
    acceptors_dirty: bool,
    steps_since_scan: u32,
    valid: bool,
}

impl Network {
    /// Create an empty, valid network.
    #[must_use]
    pub fn new(id: NetworkId) -> Self {
        Self {
            id,
            members: BTreeSet::new(),
            capacity: EnergyAmount::zero(),
            buffer: EnergyAmount::zero(),
            acceptors: BTreeMap::new(),
            acceptors_dirty: true,
            steps_since_scan: 0,
            valid: true,
        }
    }

    /// This network's identity.
    #[must_use]
    pub const fn id(&self) -> NetworkId {
        self.id
    }

    /// Whether the network is live.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.valid
    }

    /// Member positions, in deterministic order.
    pub fn members(&self) -> impl Iterator<Item = Position> + '_ {
        self.members.iter().copied()
    }

    /// Number of member nodes.
    #[must_use]
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Whether `position` is a member.
    #[must_use]
    pub fn contains(&self, position: Position) -> bool {
        self.members.contains(&position)
    }

    /// Current pooled buffer.
    #[must_use]
    pub fn buffer(&self) -> &EnergyAmount {
        &self.buffer
    }

    /// Current pooled capacity (sum of member tier capacities).
    #[must_use]
    pub fn capacity(&self) -> &EnergyAmount {
        &self.capacity
    }

    /// Number of currently recorded acceptors.
    #[must_use]
    pub fn acceptor_count(&self) -> usize {
        self.acceptors.len()
    }

    /// Add a member position. Returns false if a configured member-count
    /// ceiling rejects the add; the caller must then retry against a
    /// different or new network.
    pub(crate) fn add_member(&mut self, position: Position, limit: Option<usize>) -> bool {
        if !self.valid {
            return false;
        }
        if self.members.contains(&position) {
            return true;
        }
        if let Some(limit) = limit {
            if self.members.len() >= limit {
                warn!(network = %self.id, limit, "member ceiling reached, add rejected");
                return false;
            }
        }
        self.members.insert(position);
        self.mark_acceptors_dirty();
        true
    }

    /// Remove a member position. Returns whether it was present.
    pub(crate) fn remove_member(&mut self, position: Position) -> bool {
        let removed = self.members.remove(&position);
        if removed {
            self.mark_acceptors_dirty();
        }
        removed
    }

    /// Set the recomputed capacity, clamping the buffer to it.
    pub(crate) fn set_capacity(&mut self, capacity: EnergyAmount) {
        if self.buffer > capacity {
            debug!(
                network = %self.id,
                "buffer trimmed to shrunken capacity"
            );
            self.buffer = capacity.clone();
        }
        self.capacity = capacity;
    }

    /// Force an acceptor rescan on the next step.
    pub(crate) fn mark_acceptors_dirty(&mut self) {
        self.acceptors_dirty = true;
    }

    /// Drain the buffer completely, returning its contents.
    pub(crate) fn take_buffer(&mut self) -> EnergyAmount {
        std::mem::take(&mut self.buffer)
    }

    /// Credit the buffer without the emit cap. Merge/split bookkeeping
    /// only; callers guarantee the capacity invariant.
    pub(crate) fn absorb_buffer(&mut self, amount: EnergyAmount) {
        self.buffer = self.buffer.add(&amount).capped_at(&self.capacity);
    }

    /// Push energy into the pooled buffer. Returns the amount actually
    /// accepted, bounded by remaining pool headroom.
    pub fn emit(&mut self, amount: &EnergyAmount) -> EnergyAmount {
        if !self.valid {
            return EnergyAmount::zero();
        }
        let headroom = self.capacity.saturating_sub(&self.buffer);
        let accepted = amount.capped_at(&headroom);
        self.buffer = self.buffer.add(&accepted);
        accepted
    }

    /// Pull energy out of the pooled buffer. Returns the amount actually
    /// removed, bounded by the buffer.
    pub fn extract(&mut self, amount: &EnergyAmount) -> EnergyAmount {
        let removed = amount.capped_at(&self.buffer);
        self.buffer = self.buffer.saturating_sub(&removed);
        removed
    }

    /// Rescan the world for acceptors adjacent to any member.
    ///
    /// First writer wins per position; a configured acceptor ceiling
    /// truncates the scan with a warning.
    pub fn update_acceptors(&mut self, world: &dyn AcceptorProvider, limit: Option<usize>) {
        self.acceptors.clear();
        'scan: for member in &self.members {
            for direction in Direction::ALL {
                let probe = member.relative(direction);
                if self.members.contains(&probe) || self.acceptors.contains_key(&probe) {
                    continue;
                }
                let Some(container) = world.acceptor_at(probe, direction.opposite()) else {
                    continue;
                };
                if !container.borrow().can_receive() {
                    continue;
                }
                if let Some(limit) = limit {
                    if self.acceptors.len() >= limit {
                        warn!(network = %self.id, limit, "acceptor ceiling reached, scan truncated");
                        break 'scan;
                    }
                }
                self.acceptors.insert(
                    probe,
                    AcceptorEndpoint {
                        position: probe,
                        container,
                    },
                );
            }
        }
        self.acceptors_dirty = false;
        self.steps_since_scan = 0;
    }

    /// Advance this network by one step: rescan acceptors per the caching
    /// policy, apply distance loss, then distribute the buffer.
    pub fn step(&mut self, world: &dyn AcceptorProvider, config: &GridConfig) -> NetworkStepReport {
        #[cfg(feature = "debug-validation")]
        self.check_invariants();

        let mut report = NetworkStepReport::default();
        if !self.valid || self.members.is_empty() {
            return report;
        }

        self.maybe_rescan(world, config);

        if self.buffer.is_zero() {
            return report;
        }

        if let Some(loss_rate) = config.distance_loss {
            report.lost = self.apply_distance_loss(loss_rate);
            if self.buffer.is_zero() {
                return report;
            }
        }

        // Snapshot live demand per acceptor. Order follows the position
        // map, so a fixed topology distributes identically every run.
        let mut demands: Vec<(SharedContainer, EnergyAmount)> = Vec::new();
        let mut total_needed = EnergyAmount::zero();
        for endpoint in self.acceptors.values() {
            let needed = {
                let container = endpoint.container.borrow();
                if !container.can_receive() {
                    continue;
                }
                container.needed()
            };
            if needed.is_zero() {
                continue;
            }
            total_needed = total_needed.add(&needed);
            demands.push((endpoint.container.clone(), needed));
        }

        if total_needed.is_zero() {
            return report;
        }

        let available = self.buffer.capped_at(&total_needed);

        if total_needed > available {
            // Scarcity: exact proportional shares, floored. The floor
            // remainder stays in the buffer, so nothing is lost.
            for (container, needed) in demands {
                let share = available.mul_div(&needed, &total_needed);
                let to_send = share.capped_at(&needed);
                if to_send.is_zero() {
                    continue;
                }
                let accepted = container.borrow_mut().insert(&to_send, Action::Execute);
                if !accepted.is_zero() {
                    // Debit what was actually accepted; unit-conversion
                    // rounding may make it less than the share requested.
                    self.buffer = self.buffer.saturating_sub(&accepted);
                    report.distributed = report.distributed.add(&accepted);
                    report.acceptors_served += 1;
                }
            }
        } else {
            // Abundance: everyone gets their full demand.
            for (container, needed) in demands {
                let accepted = container.borrow_mut().insert(&needed, Action::Execute);
                if !accepted.is_zero() {
                    self.buffer = self.buffer.saturating_sub(&accepted);
                    report.distributed = report.distributed.add(&accepted);
                    report.acceptors_served += 1;
                }
            }
        }

        report
    }

    /// Invalidate the network: clear membership and acceptors, zero the
    /// buffer, mark invalid. Idempotent; the registry drops its indices.
    pub(crate) fn invalidate(&mut self) {
        if !self.valid {
            return;
        }
        debug!(network = %self.id, "network invalidated");
        self.valid = false;
        self.members.clear();
        self.acceptors.clear();
        self.buffer = EnergyAmount::zero();
        self.capacity = EnergyAmount::zero();
    }

    #[cfg(feature = "debug-validation")]
    fn check_invariants(&self) {
        assert!(
            self.buffer <= self.capacity,
            "{}: buffer {} exceeds capacity {}",
            self.id,
            self.buffer,
            self.capacity
        );
        assert!(self.valid || self.members.is_empty());
    }

    fn maybe_rescan(&mut self, world: &dyn AcceptorProvider, config: &GridConfig) {
        // Count this step before testing the interval, so interval N
        // rescans on the Nth step after the last scan.
        self.steps_since_scan += 1;
        let due = self.acceptors_dirty
            || !config.acceptor_cache_enabled
            || self.steps_since_scan >= config.acceptor_scan_interval;
        if due {
            self.update_acceptors(world, config.max_network_acceptors);
        }
    }

    /// Remove `buffer * rate * member_count` from the buffer, capped at
    /// the buffer itself. Models resistive loss growing with grid extent.
    fn apply_distance_loss(&mut self, rate: crate::convert::Ratio) -> EnergyAmount {
        let members = self.members.len() as u64;
        let loss = self
            .buffer
            .mul_scalar(rate.numerator)
            .mul_scalar(members)
            .div_scalar(rate.denominator)
            .capped_at(&self.buffer);
        self.buffer = self.buffer.saturating_sub(&loss);
        loss
    }
}
