//! Walking the expansion tree.

use std::{collections::HashSet, fmt::Write};

use crate::node::{Arena, NodeId};

/// Find the node under `root` whose `child` or `sibling` edge points at
/// `target`.
///
/// Depth first over `child`, then along `sibling`. Nodes are visited at most
/// once, so a malformed tree cannot loop.
#[must_use]
pub fn addrref(arena: &Arena, root: Option<NodeId>, target: NodeId) -> Option<NodeId> {
    let mut visited = HashSet::new();
    addrref_inner(arena, root, target, &mut visited)
}

fn addrref_inner(
    arena: &Arena,
    mut current: Option<NodeId>,
    target: NodeId,
    visited: &mut HashSet<NodeId>,
) -> Option<NodeId> {
    while let Some(id) = current {
        if !visited.insert(id) {
            return None;
        }

        let node = &arena[id];
        if node.child == Some(target) || node.sibling == Some(target) {
            return Some(id);
        }
        if let Some(found) = addrref_inner(arena, node.child, target, visited) {
            return Some(found);
        }

        current = node.sibling;
    }

    None
}

/// Render the expansion forest rooted at the queue entries without a
/// controlling address.
///
/// Children are listed in the order they were added. Each line shows the
/// mailer, the address and the flags.
#[must_use]
pub fn render(arena: &Arena, queue: &[NodeId]) -> String {
    let mut out = String::new();
    let mut visited = HashSet::new();

    for &id in queue.iter().filter(|&&id| arena[id].alias.is_none()) {
        render_node(arena, id, 0, &mut visited, &mut out);
    }

    out
}

fn render_node(
    arena: &Arena,
    id: NodeId,
    level: usize,
    visited: &mut HashSet<NodeId>,
    out: &mut String,
) {
    if !visited.insert(id) {
        return;
    }

    let node = &arena[id];
    let _ = writeln!(
        out,
        "{:indent$}{} {} [{:?}]",
        "",
        node.address.mailer,
        node.address,
        node.flags,
        indent = level * 2
    );

    let mut children: Vec<NodeId> = arena.siblings(node.child).collect();
    children.reverse();
    for child in children {
        render_node(arena, child, level + 1, visited, out);
    }
}
