//! The resolver for one message's recipients.
//!
//! The expansion itself lives in [`crate::sendto`], [`crate::recipient`] and
//! [`crate::include`]; this module holds the shared state, its construction
//! and the final report.

use sendlist_common::{
    Address, AddressParser, QueueFlags, ResolverConfig, SourceError, internal,
};

use crate::{
    alias::{AliasDatabase, AliasMap},
    depth::Depth,
    diagnostics::Diagnostics,
    forward::{ForwardSource, HomeForward},
    identity::{Directory, StaticDirectory, SystemDirectory},
    node::{Arena, NodeId, RecipientNode},
    tree,
    writable::Credentials,
};

/// Result of submitting one node to the queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Admitted {
    /// Appended to the queue.
    New(NodeId),
    /// Merged into an existing entry.
    Duplicate(NodeId),
}

impl Admitted {
    pub(crate) const fn id(self) -> NodeId {
        match self {
            Self::New(id) | Self::Duplicate(id) => id,
        }
    }
}

/// Resolves the recipients of one message into a deduplicated queue.
///
/// Every node, the queue and the diagnostics are owned by the resolver and
/// handed over as a [`Resolution`] by [`Resolver::finish`].
pub struct Resolver {
    pub(crate) config: ResolverConfig,
    pub(crate) parser: AddressParser,
    pub(crate) directory: Box<dyn Directory>,
    pub(crate) aliases: Box<dyn AliasDatabase>,
    pub(crate) forwards: Box<dyn ForwardSource>,
    pub(crate) credentials: Credentials,
    pub(crate) arena: Arena,
    pub(crate) queue: Vec<NodeId>,
    pub(crate) diagnostics: Diagnostics,
    pub(crate) recipient_count: usize,
    /// Legacy whitespace-delimited mode; cleared for the rest of the message
    /// once a top-level list uses modern delimiters.
    pub(crate) old_style: bool,
}

impl Resolver {
    #[must_use]
    pub fn builder(config: ResolverConfig) -> ResolverBuilder {
        ResolverBuilder {
            config,
            directory: None,
            aliases: None,
            forwards: None,
            credentials: None,
        }
    }

    /// Resolver with the default collaborators for `config`.
    ///
    /// # Errors
    ///
    /// See [`ResolverBuilder::build`].
    pub fn new(config: ResolverConfig) -> Result<Self, SourceError> {
        Self::builder(config).build()
    }

    /// Send to every address in `list`.
    ///
    /// `controller` is the address the list was expanded from, `None` for a
    /// list named by the sender. Returns the head of the controller's child
    /// chain (for a top-level list, the most recently added node).
    pub fn send_to(
        &mut self,
        list: &str,
        controller: Option<NodeId>,
        flags: QueueFlags,
    ) -> Option<NodeId> {
        self.send_to_at(list, controller, flags, Depth::TOP)
    }

    /// Submit one already parsed address to the queue.
    ///
    /// Returns the queue entry now standing for `address` (which may be an
    /// earlier duplicate), or `None` if the branch was cut off.
    pub fn resolve_recipient(
        &mut self,
        address: Address,
        controller: Option<NodeId>,
        flags: QueueFlags,
    ) -> Option<NodeId> {
        let mut node = RecipientNode::new(address, self.config.queue_timeout());
        node.alias = controller;
        node.flags = flags;

        self.recipient(node, Depth::TOP).map(Admitted::id)
    }

    #[must_use]
    pub const fn arena(&self) -> &Arena {
        &self.arena
    }

    #[must_use]
    pub fn queue(&self) -> &[NodeId] {
        &self.queue
    }

    #[must_use]
    pub const fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    #[must_use]
    pub fn finish(self) -> Resolution {
        internal!(
            level = DEBUG,
            "Resolved {} recipients into {} queue entries",
            self.recipient_count,
            self.queue.len()
        );

        Resolution {
            arena: self.arena,
            queue: self.queue,
            diagnostics: self.diagnostics,
            recipient_count: self.recipient_count,
        }
    }
}

/// Builder for [`Resolver`].
///
/// Collaborators that are not supplied come from the configuration: the
/// `passwd_file` (or the system user database), the `alias_file` (or no
/// aliases), `~/.forward` files and the credentials of this process.
pub struct ResolverBuilder {
    config: ResolverConfig,
    directory: Option<Box<dyn Directory>>,
    aliases: Option<Box<dyn AliasDatabase>>,
    forwards: Option<Box<dyn ForwardSource>>,
    credentials: Option<Credentials>,
}

impl ResolverBuilder {
    #[must_use]
    pub fn directory(mut self, directory: impl Directory + 'static) -> Self {
        self.directory = Some(Box::new(directory));
        self
    }

    #[must_use]
    pub fn aliases(mut self, aliases: impl AliasDatabase + 'static) -> Self {
        self.aliases = Some(Box::new(aliases));
        self
    }

    #[must_use]
    pub fn forwards(mut self, forwards: impl ForwardSource + 'static) -> Self {
        self.forwards = Some(Box::new(forwards));
        self
    }

    #[must_use]
    pub const fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Build the resolver.
    ///
    /// # Errors
    ///
    /// Returns a [`SourceError`] if the configured passwd or alias file
    /// cannot be loaded.
    pub fn build(self) -> Result<Resolver, SourceError> {
        let directory: Box<dyn Directory> = match (self.directory, &self.config.passwd_file) {
            (Some(directory), _) => directory,
            (None, Some(path)) => Box::new(StaticDirectory::load(path)?),
            (None, None) => Box::new(SystemDirectory),
        };

        let aliases: Box<dyn AliasDatabase> = match (self.aliases, &self.config.alias_file) {
            (Some(aliases), _) => aliases,
            (None, Some(path)) => Box::new(AliasMap::load(path)?),
            (None, None) => Box::new(AliasMap::default()),
        };

        Ok(Resolver {
            parser: AddressParser::new(self.config.local_hosts.iter().cloned()),
            old_style: self.config.old_style_addresses,
            directory,
            aliases,
            forwards: self.forwards.unwrap_or_else(|| Box::new(HomeForward)),
            credentials: self.credentials.unwrap_or_else(Credentials::current),
            arena: Arena::default(),
            queue: Vec::new(),
            diagnostics: Diagnostics::default(),
            recipient_count: 0,
            config: self.config,
        })
    }
}

/// Everything a finished resolution produced.
#[derive(Debug)]
pub struct Resolution {
    arena: Arena,
    queue: Vec<NodeId>,
    diagnostics: Diagnostics,
    recipient_count: usize,
}

impl Resolution {
    #[must_use]
    pub const fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Every queue entry, in the order it was first seen.
    #[must_use]
    pub fn queue(&self) -> &[NodeId] {
        &self.queue
    }

    #[must_use]
    pub const fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    #[must_use]
    pub const fn recipient_count(&self) -> usize {
        self.recipient_count
    }

    /// The delivery input: queue entries that are neither suppressed nor
    /// bad, in queue order.
    pub fn deliverable(&self) -> impl Iterator<Item = &RecipientNode> {
        self.queue
            .iter()
            .map(|&id| &self.arena[id])
            .filter(|node| node.is_sendable())
    }

    #[must_use]
    pub fn has_bad_addresses(&self) -> bool {
        self.queue
            .iter()
            .any(|&id| self.arena[id].flags.contains(QueueFlags::BAD_ADDRESS))
    }

    /// The first queue entry for an address equal to `address`.
    #[must_use]
    pub fn find(&self, address: &Address) -> Option<NodeId> {
        self.queue
            .iter()
            .copied()
            .find(|&id| self.arena[id].address.same_addr(address))
    }

    /// The node in the tree under `root` whose child or sibling edge points
    /// at `target`.
    #[must_use]
    pub fn referencing(&self, root: NodeId, target: NodeId) -> Option<NodeId> {
        tree::addrref(&self.arena, Some(root), target)
    }

    /// The expansion forest, one node per line.
    #[must_use]
    pub fn render_tree(&self) -> String {
        tree::render(&self.arena, &self.queue)
    }
}
