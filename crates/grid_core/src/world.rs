//! The external world collaborator.
//!
//! Networks discover downstream consumers by probing positions adjacent
//! to their members. The world answers those probes; the core treats it
//! as a pure query function and never caches answers beyond one scan.

use std::collections::HashMap;

use crate::container::SharedContainer;
use crate::space::{Direction, Position};

/// Supplies the receivable storage, if any, at a world position.
///
/// `side` is the face being probed (the direction from the acceptor back
/// toward the probing member), for worlds with sided storage access.
pub trait AcceptorProvider {
    /// The storage interface at `position`, probed from `side`.
    fn acceptor_at(&self, position: Position, side: Direction) -> Option<SharedContainer>;
}

/// A world with no acceptors at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullWorld;

impl AcceptorProvider for NullWorld {
    fn acceptor_at(&self, _position: Position, _side: Direction) -> Option<SharedContainer> {
        None
    }
}

/// Map-backed world for tests and scenario drivers. Storage at a position
/// is exposed on every side.
#[derive(Default)]
pub struct StaticWorld {
    acceptors: HashMap<Position, SharedContainer>,
}

impl StaticWorld {
    /// Create an empty world.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a storage at a position, replacing any previous one.
    pub fn add_acceptor(&mut self, position: Position, container: SharedContainer) {
        self.acceptors.insert(position, container);
    }

    /// Remove the storage at a position.
    pub fn remove_acceptor(&mut self, position: Position) -> Option<SharedContainer> {
        self.acceptors.remove(&position)
    }
}

impl AcceptorProvider for StaticWorld {
    fn acceptor_at(&self, position: Position, _side: Direction) -> Option<SharedContainer> {
        self.acceptors.get(&position).cloned()
    }
}
