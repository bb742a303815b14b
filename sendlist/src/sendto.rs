//! Expanding an address list into queue entries.

use sendlist_common::{QueueFlags, expansion};

use crate::{
    depth::Depth,
    node::{NodeId, RecipientNode},
    resolver::{Admitted, Resolver},
};

/// Characters that mark a list as using modern delimiters.
const MODERN_DELIMITERS: [char; 4] = [',', ';', '<', '('];

impl Resolver {
    /// Parse `list` and submit every address to the queue, linking new nodes
    /// under `controller`.
    pub(crate) fn send_to_at(
        &mut self,
        list: &str,
        controller: Option<NodeId>,
        flags: QueueFlags,
        depth: Depth,
    ) -> Option<NodeId> {
        expansion!(
            "sendto: {} (controller {:?}, depth {})",
            list,
            controller.map(|id| self.arena[id].address.printable.as_str()),
            depth.get()
        );

        if controller.is_none() && self.old_style && list.contains(MODERN_DELIMITERS) {
            self.old_style = false;
        }
        let delimiter = if self.old_style && controller.is_none() {
            ' '
        } else {
            ','
        };

        let (inherited, controller_primary) = controller.map_or((QueueFlags::EMPTY, false), |id| {
            let flags = self.arena[id].flags;
            (
                flags & QueueFlags::INHERITABLE,
                flags.contains(QueueFlags::PRIMARY),
            )
        });

        let mut pending = Vec::new();
        let mut self_reference = false;
        let mut first = true;
        let mut cursor = 0;

        loop {
            cursor += list[cursor..]
                .find(|c: char| !c.is_whitespace() && c != ',')
                .unwrap_or(list.len() - cursor);
            if cursor >= list.len() {
                break;
            }

            let Some(address) = self.parser.parse(list, &mut cursor, delimiter) else {
                continue;
            };

            let mut node = RecipientNode::new(address, self.config.queue_timeout());
            node.alias = controller;
            node.flags = inherited | flags;

            let singleton = first && cursor == list.len() && controller_primary;
            if controller.is_none() || singleton {
                node.flags.insert(QueueFlags::PRIMARY);
            }

            if controller.is_some_and(|id| self.arena[id].address.same_addr(&node.address)) {
                self_reference = true;
            } else {
                pending.push(node);
            }
            first = false;
        }

        if let Some(id) = controller
            && !self_reference
        {
            self.arena[id].flags.insert(QueueFlags::DONT_SEND);
        }

        let mut head = controller.and_then(|id| self.arena[id].child);
        for node in pending {
            let Some(admitted) = self.recipient(node, depth) else {
                continue;
            };

            let id = admitted.id();
            if let Some(controller) = controller
                && self.arena[id].address.display_name.is_none()
            {
                self.arena[id].address.display_name =
                    self.arena[controller].address.display_name.clone();
            }

            if let Admitted::New(id) = admitted {
                self.arena[id].sibling = head;
                head = Some(id);
            }
        }

        if let Some(id) = controller {
            self.arena[id].child = head;
        }

        head
    }
}
