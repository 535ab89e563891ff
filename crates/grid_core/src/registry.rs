//! Partitioned network bookkeeping: placement, merging, splitting.
//!
//! The [`NetworkRegistry`] owns every node and network, grouped into
//! partitions that load and unload independently. Placing a node joins
//! or merges adjacent networks; removing one runs a flood fill over the
//! survivors and rebuilds one network per connected group, splitting the
//! pooled buffer proportionally to each group's capacity.
//!
//! All maps are ordered, so stepping, merging, and splitting are fully
//! deterministic for a given sequence of operations.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::amount::EnergyAmount;
use crate::config::GridConfig;
use crate::error::{GridError, Result};
use crate::network::{Network, NetworkId, NetworkStepReport};
use crate::node::Node;
use crate::space::Position;
use crate::tier::{Tier, TierTable};
use crate::world::AcceptorProvider;

/// Identity of an independently-loadable region of the grid.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct PartitionId(pub u32);

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "part#{}", self.0)
    }
}

/// All state for one loaded partition.
#[derive(Debug, Default)]
struct Partition {
    nodes: BTreeMap<Position, Node>,
    networks: BTreeMap<NetworkId, Network>,
    pos_index: HashMap<Position, NetworkId>,
    next_network_id: u64,
}

impl Partition {
    fn allocate_id(&mut self) -> NetworkId {
        let id = NetworkId(self.next_network_id);
        self.next_network_id += 1;
        id
    }
}

/// Aggregate of what every network did during one step.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StepReport {
    /// Total amount accepted by acceptors across all networks.
    pub distributed: EnergyAmount,
    /// Total amount removed by distance loss.
    pub lost: EnergyAmount,
    /// Number of acceptors that received energy.
    pub acceptors_served: usize,
    /// Number of live networks stepped.
    pub networks_stepped: usize,
}

impl StepReport {
    fn absorb(&mut self, report: &NetworkStepReport) {
        self.distributed = self.distributed.add(&report.distributed);
        self.lost = self.lost.add(&report.lost);
        self.acceptors_served += report.acceptors_served;
        self.networks_stepped += 1;
    }
}

/// Point-in-time counts and totals over the whole registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySummary {
    /// Number of loaded partitions.
    pub partitions: usize,
    /// Total nodes across all partitions.
    pub nodes: usize,
    /// Total live networks across all partitions.
    pub networks: usize,
    /// Total acceptors currently recorded across all networks.
    pub acceptors: usize,
    /// Sum of all network buffers.
    pub total_buffer: EnergyAmount,
    /// Sum of all network capacities.
    pub total_capacity: EnergyAmount,
}

impl fmt::Display for RegistrySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} partitions, {} nodes, {} networks, {} / {} buffered",
            self.partitions, self.nodes, self.networks, self.total_buffer, self.total_capacity
        )
    }
}

/// Owner of all nodes and networks, keyed by partition.
#[derive(Debug)]
pub struct NetworkRegistry {
    config: GridConfig,
    partitions: BTreeMap<PartitionId, Partition>,
}

impl NetworkRegistry {
    /// Create an empty registry with the given configuration.
    #[must_use]
    pub fn new(config: GridConfig) -> Self {
        Self {
            config,
            partitions: BTreeMap::new(),
        }
    }

    /// The configuration this registry was built with.
    #[must_use]
    pub const fn config(&self) -> &GridConfig {
        &self.config
    }

    /// Make a partition available for placement. No-op if already loaded.
    pub fn load_partition(&mut self, partition: PartitionId) {
        if self.partitions.contains_key(&partition) {
            return;
        }
        debug!(%partition, "partition loaded");
        self.partitions.insert(partition, Partition::default());
    }

    /// Drop a partition and invalidate every network inside it.
    pub fn unload_partition(&mut self, partition: PartitionId) {
        let Some(mut part) = self.partitions.remove(&partition) else {
            return;
        };
        info!(
            %partition,
            nodes = part.nodes.len(),
            networks = part.networks.len(),
            "partition unloaded"
        );
        for network in part.networks.values_mut() {
            network.invalidate();
        }
    }

    /// Whether the partition is currently loaded.
    #[must_use]
    pub fn is_loaded(&self, partition: PartitionId) -> bool {
        self.partitions.contains_key(&partition)
    }

    /// Place a node, joining or merging any adjacent networks. Returns
    /// the id of the network the node ended up in.
    ///
    /// # Errors
    ///
    /// [`GridError::PartitionNotLoaded`] if the partition is not loaded,
    /// [`GridError::PositionOccupied`] if a node already sits there.
    pub fn place_node(
        &mut self,
        partition: PartitionId,
        position: Position,
        tier: Tier,
    ) -> Result<NetworkId> {
        let part = self
            .partitions
            .get_mut(&partition)
            .ok_or(GridError::PartitionNotLoaded(partition))?;
        if part.nodes.contains_key(&position) {
            return Err(GridError::PositionOccupied(position));
        }
        part.nodes.insert(position, Node::new(position, tier));

        let id = Self::merge_or_create(part, position, &self.config);
        debug!(%partition, ?position, network = %id, "node placed");
        Ok(id)
    }

    /// Remove a node, splitting its network if the removal disconnects
    /// it. No-op if the partition is unloaded or no node sits there.
    pub fn remove_node(&mut self, partition: PartitionId, position: Position) {
        let Some(part) = self.partitions.get_mut(&partition) else {
            return;
        };
        let Some(node) = part.nodes.remove(&position) else {
            return;
        };
        part.pos_index.remove(&position);
        if let Some(id) = node.network() {
            if let Some(network) = part.networks.get_mut(&id) {
                network.remove_member(position);
                if network.member_count() == 0 {
                    network.invalidate();
                    part.networks.remove(&id);
                }
            }
        }
        debug!(%partition, ?position, "node removed");
        Self::refresh_around(part, position, &self.config);
    }

    /// The node at `position`, if any.
    #[must_use]
    pub fn node_at(&self, partition: PartitionId, position: Position) -> Option<&Node> {
        self.partitions.get(&partition)?.nodes.get(&position)
    }

    /// The live network with the given id, if any.
    #[must_use]
    pub fn network(&self, partition: PartitionId, id: NetworkId) -> Option<&Network> {
        self.partitions
            .get(&partition)?
            .networks
            .get(&id)
            .filter(|n| n.is_valid())
    }

    /// The live network containing `position`, if any.
    #[must_use]
    pub fn network_at(&self, partition: PartitionId, position: Position) -> Option<&Network> {
        let part = self.partitions.get(&partition)?;
        let id = part.pos_index.get(&position)?;
        part.networks.get(id).filter(|n| n.is_valid())
    }

    /// Push energy into the network containing `position`. The intake is
    /// bounded by the node's tier transfer rate, then by pool headroom.
    /// Returns the amount accepted, zero when no network is there.
    pub fn emit_at(
        &mut self,
        partition: PartitionId,
        position: Position,
        amount: &EnergyAmount,
    ) -> EnergyAmount {
        let Some(part) = self.partitions.get_mut(&partition) else {
            return EnergyAmount::zero();
        };
        let Some(node) = part.nodes.get(&position) else {
            return EnergyAmount::zero();
        };
        let rate = &self.config.tiers.spec(node.tier()).transfer_rate;
        let intake = amount.capped_at(rate);
        let Some(id) = part.pos_index.get(&position) else {
            return EnergyAmount::zero();
        };
        match part.networks.get_mut(id) {
            Some(network) => network.emit(&intake),
            None => EnergyAmount::zero(),
        }
    }

    /// Pull energy out of the network containing `position`. Returns the
    /// amount removed, zero when no network is there.
    pub fn extract_at(
        &mut self,
        partition: PartitionId,
        position: Position,
        amount: &EnergyAmount,
    ) -> EnergyAmount {
        let Some(part) = self.partitions.get_mut(&partition) else {
            return EnergyAmount::zero();
        };
        let Some(id) = part.pos_index.get(&position) else {
            return EnergyAmount::zero();
        };
        match part.networks.get_mut(id) {
            Some(network) => network.extract(amount),
            None => EnergyAmount::zero(),
        }
    }

    /// Advance every live network by one step, in partition then network
    /// id order.
    pub fn step_all(&mut self, world: &dyn AcceptorProvider) -> StepReport {
        let mut report = StepReport::default();
        for part in self.partitions.values_mut() {
            for network in part.networks.values_mut() {
                if !network.is_valid() {
                    continue;
                }
                report.absorb(&network.step(world, &self.config));
            }
        }
        report
    }

    /// Ids of the currently loaded partitions, in order.
    pub fn partition_ids(&self) -> impl Iterator<Item = PartitionId> + '_ {
        self.partitions.keys().copied()
    }

    /// Live networks in a partition, in id order.
    pub fn networks_in(&self, partition: PartitionId) -> impl Iterator<Item = &Network> + '_ {
        self.partitions
            .get(&partition)
            .into_iter()
            .flat_map(|part| part.networks.values())
            .filter(|n| n.is_valid())
    }

    /// Counts and buffer totals over every loaded partition.
    #[must_use]
    pub fn summary(&self) -> RegistrySummary {
        let mut summary = RegistrySummary {
            partitions: self.partitions.len(),
            nodes: 0,
            networks: 0,
            acceptors: 0,
            total_buffer: EnergyAmount::zero(),
            total_capacity: EnergyAmount::zero(),
        };
        for part in self.partitions.values() {
            summary.nodes += part.nodes.len();
            for network in part.networks.values() {
                if !network.is_valid() {
                    continue;
                }
                summary.networks += 1;
                summary.acceptors += network.acceptor_count();
                summary.total_buffer = summary.total_buffer.add(network.buffer());
                summary.total_capacity = summary.total_capacity.add(network.capacity());
            }
        }
        summary
    }

    /// Join `position` to a neighboring network, merging all distinct
    /// neighbors into one, or create a fresh network when it has none.
    fn merge_or_create(part: &mut Partition, position: Position, config: &GridConfig) -> NetworkId {
        let mut neighbor_nets: BTreeSet<NetworkId> = BTreeSet::new();
        for neighbor in position.neighbors() {
            if let Some(id) = part.pos_index.get(&neighbor) {
                if part.networks.get(id).is_some_and(Network::is_valid) {
                    neighbor_nets.insert(*id);
                }
            }
        }

        // Try joining candidates in id order; a member ceiling may
        // reject, in which case the node gets its own network.
        let mut joined: Option<NetworkId> = None;
        for id in &neighbor_nets {
            if let Some(network) = part.networks.get_mut(id) {
                if network.add_member(position, config.max_network_members) {
                    joined = Some(*id);
                    break;
                }
            }
        }
        let joined = joined.unwrap_or_else(|| {
            let id = part.allocate_id();
            let mut network = Network::new(id);
            network.add_member(position, None);
            part.networks.insert(id, network);
            id
        });

        Self::index_member(part, position, joined);

        if config.merging_enabled {
            for other in neighbor_nets {
                if other != joined {
                    Self::merge(part, joined, other, config);
                }
            }
        }

        Self::recompute_capacity(part, joined, &config.tiers);
        joined
    }

    /// Fold `other` into `target`: move members, transfer the buffer,
    /// drop `other`. Skipped with a warning when a member ceiling would
    /// be exceeded, leaving both networks adjacent but separate.
    fn merge(part: &mut Partition, target: NetworkId, other: NetworkId, config: &GridConfig) {
        let Some(mut absorbed) = part.networks.remove(&other) else {
            return;
        };
        let target_len = part
            .networks
            .get(&target)
            .map_or(0, Network::member_count);
        if let Some(limit) = config.max_network_members {
            if target_len + absorbed.member_count() > limit {
                warn!(%target, %other, limit, "merge exceeds member ceiling, skipped");
                part.networks.insert(other, absorbed);
                return;
            }
        }

        let members: Vec<Position> = absorbed.members().collect();
        let buffer = absorbed.take_buffer();
        absorbed.invalidate();

        if let Some(network) = part.networks.get_mut(&target) {
            for member in &members {
                network.add_member(*member, None);
            }
        }
        for member in members {
            Self::index_member(part, member, target);
        }

        Self::recompute_capacity(part, target, &config.tiers);
        if let Some(network) = part.networks.get_mut(&target) {
            network.absorb_buffer(buffer);
        }
        debug!(%target, %other, "networks merged");
    }

    /// Re-derive connectivity around a removed position: flood-fill the
    /// former neighbors and rebuild one network per connected group,
    /// splitting any buffered energy proportionally to group capacity.
    fn refresh_around(part: &mut Partition, removed: Position, config: &GridConfig) {
        let mut groups: Vec<BTreeSet<Position>> = Vec::new();
        let mut seen: HashSet<Position> = HashSet::new();
        for start in removed.neighbors() {
            if !part.nodes.contains_key(&start) || seen.contains(&start) {
                continue;
            }
            // With merging disabled, a purely geometric fill could sweep
            // a deliberately separate adjacent network into this group;
            // stay inside the seed's prior network instead.
            let within = if config.merging_enabled {
                None
            } else {
                part.pos_index.get(&start).copied()
            };
            let group = Self::flood_fill(part, start, within);
            seen.extend(group.iter().copied());
            groups.push(group);
        }

        // Removal from the middle of nowhere, or a single surviving
        // group: the old network (minus the removed member) still holds.
        if groups.len() <= 1 {
            if let Some(group) = groups.first() {
                if let Some(first) = group.iter().next() {
                    if let Some(id) = part.pos_index.get(first).copied() {
                        Self::recompute_capacity(part, id, &config.tiers);
                    }
                }
            }
            return;
        }

        info!(?removed, groups = groups.len(), "network split");

        // Collect the pooled energy of every old network touched by the
        // split, then invalidate them.
        let mut old_nets: BTreeSet<NetworkId> = BTreeSet::new();
        for group in &groups {
            for position in group {
                if let Some(id) = part.pos_index.get(position) {
                    old_nets.insert(*id);
                }
            }
        }
        let mut pooled = EnergyAmount::zero();
        for id in &old_nets {
            if let Some(network) = part.networks.get_mut(id) {
                pooled = pooled.add(&network.take_buffer());
                network.invalidate();
            }
            part.networks.remove(id);
        }

        // One fresh network per group. No member ceiling here: the
        // groups already existed as one legal network.
        let mut rebuilt: Vec<(NetworkId, EnergyAmount)> = Vec::new();
        let mut total_capacity = EnergyAmount::zero();
        for group in &groups {
            let id = part.allocate_id();
            let mut network = Network::new(id);
            for &member in group {
                network.add_member(member, None);
            }
            part.networks.insert(id, network);
            for &member in group {
                Self::index_member(part, member, id);
            }
            Self::recompute_capacity(part, id, &config.tiers);
            let capacity = part
                .networks
                .get(&id)
                .map_or_else(EnergyAmount::zero, |n| n.capacity().clone());
            total_capacity = total_capacity.add(&capacity);
            rebuilt.push((id, capacity));
        }

        // Split the pooled buffer proportionally to capacity, floored;
        // the rounding remainder goes to the first group so no energy is
        // created or destroyed.
        if pooled.is_zero() {
            return;
        }
        let mut assigned = EnergyAmount::zero();
        let mut shares: Vec<(NetworkId, EnergyAmount)> = Vec::with_capacity(rebuilt.len());
        for (id, capacity) in &rebuilt {
            let share = pooled.mul_div(capacity, &total_capacity).capped_at(capacity);
            assigned = assigned.add(&share);
            shares.push((*id, share));
        }
        let mut remainder = pooled.saturating_sub(&assigned);
        for (id, share) in shares {
            let Some(network) = part.networks.get_mut(&id) else {
                continue;
            };
            let headroom = network.capacity().saturating_sub(&share);
            let topup = remainder.capped_at(&headroom);
            remainder = remainder.saturating_sub(&topup);
            network.absorb_buffer(share.add(&topup));
        }
    }

    /// All nodes reachable from `start` through the node arena. When
    /// `within` is set, the fill never leaves that network.
    fn flood_fill(
        part: &Partition,
        start: Position,
        within: Option<NetworkId>,
    ) -> BTreeSet<Position> {
        let mut group = BTreeSet::new();
        let mut queue = VecDeque::new();
        group.insert(start);
        queue.push_back(start);
        while let Some(current) = queue.pop_front() {
            for neighbor in current.neighbors() {
                if !part.nodes.contains_key(&neighbor) {
                    continue;
                }
                if within.is_some_and(|id| part.pos_index.get(&neighbor) != Some(&id)) {
                    continue;
                }
                if group.insert(neighbor) {
                    queue.push_back(neighbor);
                }
            }
        }
        group
    }

    /// Point both the position index and the node back-reference at `id`.
    fn index_member(part: &mut Partition, position: Position, id: NetworkId) {
        part.pos_index.insert(position, id);
        if let Some(node) = part.nodes.get_mut(&position) {
            node.set_network(Some(id));
        }
    }

    /// Recompute a network's capacity as the sum of its members' tier
    /// capacities.
    fn recompute_capacity(part: &mut Partition, id: NetworkId, tiers: &TierTable) {
        let Some(network) = part.networks.get(&id) else {
            return;
        };
        let mut capacity = EnergyAmount::zero();
        for position in network.members() {
            if let Some(node) = part.nodes.get(&position) {
                capacity = capacity.add(&tiers.spec(node.tier()).capacity);
            }
        }
        if let Some(network) = part.networks.get_mut(&id) {
            network.set_capacity(capacity);
        }
    }
}
