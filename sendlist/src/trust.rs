//! Controlling-address inheritance.
//!
//! A node may target files, programs and `:include:` lists only when some
//! node on its `alias` chain (itself included) carries a verified identity.
//! That node is its *controlling address* and supplies the uid/gid used for
//! permission decisions.

use sendlist_common::QueueFlags;

use crate::node::{Arena, NodeId};

/// How far a node's identity can be trusted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trust {
    /// No verified identity anywhere on the chain; e.g. named by the sender.
    Unverified,
    /// Verified through the given ancestor.
    InheritedFromAncestor(NodeId),
    /// The node's own identity is verified.
    VerifiedLocal,
}

impl Trust {
    /// Trust of a node (possibly not yet in the arena) with the given flags
    /// and controlling address.
    #[must_use]
    pub fn evaluate(arena: &Arena, flags: QueueFlags, alias: Option<NodeId>) -> Self {
        if flags.contains(QueueFlags::GOOD_UID) {
            return Self::VerifiedLocal;
        }

        controlling_address(arena, alias).map_or(Self::Unverified, Self::InheritedFromAncestor)
    }

    /// Trust of a node already in the arena.
    #[must_use]
    pub fn of(arena: &Arena, id: NodeId) -> Self {
        let node = &arena[id];
        Self::evaluate(arena, node.flags, node.alias)
    }
}

/// Whether a node with `trust` may be delivered to a file or program, or
/// expand an `:include:`. `force` is the administrative override.
#[must_use]
pub const fn may_target_privileged(trust: Trust, force: bool) -> bool {
    force || !matches!(trust, Trust::Unverified)
}

/// The first node with a verified identity walking up from `start`.
#[must_use]
pub fn controlling_address(arena: &Arena, start: Option<NodeId>) -> Option<NodeId> {
    let mut current = start;
    let mut steps = 0;

    while let Some(id) = current {
        if arena[id].flags.contains(QueueFlags::GOOD_UID) {
            return Some(id);
        }

        steps += 1;
        if steps > arena.len() {
            break;
        }
        current = arena[id].alias;
    }

    None
}
