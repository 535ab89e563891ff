//! Graph vertices of the energy grid.
//!
//! A node is one transmitter cell: a stable position identity, an
//! immutable tier, and a nullable back-reference to the network it
//! currently belongs to. The back-reference is an id, not a pointer
//! (arena-and-handle): networks can be invalidated while nodes persist
//! without any dangling references.
//!
//! Adjacency is not stored on the node; it is derived by the registry
//! from the node arena (two nodes are adjacent when their positions are
//! lattice neighbors). Only the registry mutates the network id.

use serde::{Deserialize, Serialize};

use crate::network::NetworkId;
use crate::space::Position;
use crate::tier::Tier;

/// One transmitter vertex in the grid graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    position: Position,
    tier: Tier,
    network: Option<NetworkId>,
}

impl Node {
    /// Create a detached node.
    #[must_use]
    pub const fn new(position: Position, tier: Tier) -> Self {
        Self {
            position,
            tier,
            network: None,
        }
    }

    /// The node's stable position identity.
    #[must_use]
    pub const fn position(&self) -> Position {
        self.position
    }

    /// The node's tier. Never changes after construction.
    #[must_use]
    pub const fn tier(&self) -> Tier {
        self.tier
    }

    /// The network this node currently belongs to, if any.
    #[must_use]
    pub const fn network(&self) -> Option<NetworkId> {
        self.network
    }

    /// Set the network back-reference. Registry/network use only.
    pub(crate) fn set_network(&mut self, network: Option<NetworkId>) {
        self.network = network;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_node_is_detached() {
        let node = Node::new(Position::new(1, 2, 3), Tier::Elite);
        assert_eq!(node.network(), None);
        assert_eq!(node.tier(), Tier::Elite);
        assert_eq!(node.position(), Position::new(1, 2, 3));
    }
}
