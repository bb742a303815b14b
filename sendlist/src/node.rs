//! Recipient nodes and the arena that owns them.
//!
//! The expansion tree is expressed with indices into an [`Arena`] rather
//! than pointers: `child` is the owning edge (the head of the list an
//! address expanded into), `sibling` threads nodes that share a parent, and
//! `alias` points back at the controlling address.

use std::{
    fmt,
    ops::{Index, IndexMut},
    path::PathBuf,
    time::Duration,
};

use sendlist_common::{Address, QueueFlags};

/// Stable handle to a node in an [`Arena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Numeric identity of a node whose `GOOD_UID` flag is set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Owner {
    pub uid: u32,
    pub gid: u32,
    /// Home directory, known only for identities from the user directory.
    pub home: Option<PathBuf>,
}

impl Owner {
    pub const ROOT: Self = Self {
        uid: 0,
        gid: 0,
        home: None,
    };
}

/// One distinct parsed address instance.
#[derive(Clone, Debug)]
pub struct RecipientNode {
    pub address: Address,
    pub flags: QueueFlags,
    /// The controlling address this node was expanded from.
    pub alias: Option<NodeId>,
    /// Head of the list this node expanded into.
    pub child: Option<NodeId>,
    pub sibling: Option<NodeId>,
    /// Fixed at creation from configuration.
    pub timeout: Duration,
    owner: Option<Owner>,
}

impl RecipientNode {
    #[must_use]
    pub const fn new(address: Address, timeout: Duration) -> Self {
        Self {
            address,
            flags: QueueFlags::EMPTY,
            alias: None,
            child: None,
            sibling: None,
            timeout,
            owner: None,
        }
    }

    /// Record a verified identity and set `GOOD_UID`.
    pub fn verify(&mut self, owner: Owner) {
        self.owner = Some(owner);
        self.flags.insert(QueueFlags::GOOD_UID);
    }

    /// The verified identity, present exactly when `GOOD_UID` is set.
    #[must_use]
    pub const fn owner(&self) -> Option<&Owner> {
        if self.flags.contains(QueueFlags::GOOD_UID) {
            self.owner.as_ref()
        } else {
            None
        }
    }

    #[must_use]
    pub const fn is_sendable(&self) -> bool {
        self.flags.is_sendable()
    }
}

/// Owner of every node created while resolving one message.
#[derive(Debug, Default)]
pub struct Arena {
    nodes: Vec<RecipientNode>,
}

impl Arena {
    pub fn push(&mut self, node: RecipientNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&RecipientNode> {
        self.nodes.get(id.0)
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes on the `sibling` chain starting at `head`, in chain order.
    pub fn siblings(&self, head: Option<NodeId>) -> impl Iterator<Item = NodeId> + '_ {
        let mut seen = 0;
        std::iter::successors(head, move |&id| self[id].sibling).take_while(move |_| {
            seen += 1;
            seen <= self.nodes.len()
        })
    }

    /// Controllers of `id` walking up the `alias` chain, nearest first.
    pub fn controllers(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let mut seen = 0;
        std::iter::successors(self[id].alias, move |&id| self[id].alias).take_while(move |_| {
            seen += 1;
            seen <= self.nodes.len()
        })
    }
}

impl Index<NodeId> for Arena {
    type Output = RecipientNode;

    fn index(&self, id: NodeId) -> &Self::Output {
        &self.nodes[id.0]
    }
}

impl IndexMut<NodeId> for Arena {
    fn index_mut(&mut self, id: NodeId) -> &mut Self::Output {
        &mut self.nodes[id.0]
    }
}
