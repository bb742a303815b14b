//! Recipient resolution for a mail transfer agent.
//!
//! A [`Resolver`] takes the address lists of one message, parses them,
//! suppresses duplicates and expands aliases, `:include:` files and
//! `~/.forward` files into a flat queue. Files and programs are only
//! accepted as targets when a verified identity controls the address.

mod argv;
mod depth;
mod include;
mod recipient;
mod sendto;

pub mod alias;
pub mod diagnostics;
pub mod forward;
pub mod identity;
pub mod node;
pub mod resolver;
pub mod tree;
pub mod trust;
pub mod writable;

pub use alias::{AliasDatabase, AliasMap};
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use forward::{ForwardSource, HomeForward};
pub use identity::{Directory, Identity, IdentityResolver, StaticDirectory, SystemDirectory};
pub use node::{Arena, NodeId, Owner, RecipientNode};
pub use resolver::{Resolution, Resolver, ResolverBuilder};
pub use trust::Trust;
pub use writable::Credentials;
