//! The dedup queue and per-recipient classification.

use std::path::PathBuf;

use sendlist_common::{Mailer, QueueFlags, RecipientError, expansion};

use crate::{
    depth::Depth,
    identity::{IdentityResolver, Match},
    node::{NodeId, Owner, RecipientNode},
    resolver::{Admitted, Resolver},
    trust::{Trust, controlling_address, may_target_privileged},
    writable::file_target_ok,
};

const INCLUDE_PREFIX: &str = ":include:";

impl Resolver {
    /// Submit `node` to the queue and expand it.
    ///
    /// Returns `None` only when the recursion guard cut the branch off.
    pub(crate) fn recipient(&mut self, mut node: RecipientNode, depth: Depth) -> Option<Admitted> {
        if depth.exceeds(self.config.max_recursion) {
            self.diagnostics
                .user_error(Some(&node.address), &RecipientError::LoopBroken);
            return None;
        }

        if node.alias.is_none() {
            node.address.normalize_case();
        }

        let unquoted = node.address.unquoted_user();
        let quoted = node.address.is_quoted();

        if node.address.mailer == Mailer::Local
            && let Some(command) = unquoted.strip_prefix('|')
        {
            node.address.mailer = Mailer::Program;
            node.address.user = command.to_string();

            if !self.may_target_privileged(&node) {
                self.diagnostics
                    .reject(&mut node, &RecipientError::ProgramNotPermitted);
            }
        }

        if let Some(existing) = self
            .queue
            .iter()
            .copied()
            .find(|&id| self.arena[id].address.same_addr(&node.address))
        {
            if !node
                .flags
                .intersects(QueueFlags::DONT_SEND | QueueFlags::PSEUDO)
            {
                self.diagnostics
                    .info(Some(&node.address), "duplicate suppressed");
            }

            let merged = QueueFlags::merge_duplicate(self.arena[existing].flags, node.flags);
            self.arena[existing].flags = merged;
            return Some(Admitted::Duplicate(existing));
        }

        let id = self.arena.push(node);
        self.queue.push(id);
        self.recipient_count += 1;
        expansion!(
            "queued {} as {} ({:?})",
            self.arena[id].address,
            id,
            self.arena[id].flags
        );

        if self.arena[id].address.mailer == Mailer::Local
            && !self.arena[id].flags.contains(QueueFlags::DONT_SEND)
        {
            if let Some(path) = unquoted.strip_prefix(INCLUDE_PREFIX) {
                self.include_directive(id, PathBuf::from(path), depth);
            } else if !self.config.no_alias {
                self.alias(id, depth);
            }
        }

        if self.arena[id].is_sendable() && self.arena[id].address.mailer == Mailer::Local {
            if unquoted.starts_with('/') {
                self.file_target(id, PathBuf::from(&unquoted));
            } else {
                self.local_user(id, &unquoted, quoted, depth);
            }
        }

        Some(Admitted::New(id))
    }

    fn may_target_privileged(&self, node: &RecipientNode) -> bool {
        let trust = Trust::evaluate(&self.arena, node.flags, node.alias);
        may_target_privileged(trust, self.config.force_mail)
    }

    fn include_directive(&mut self, id: NodeId, path: PathBuf, depth: Depth) {
        let node = &mut self.arena[id];
        node.address.mailer = Mailer::Include;
        node.flags.insert(QueueFlags::DONT_SEND);

        if self.may_target_privileged(&self.arena[id]) {
            self.diagnostics.info(
                Some(&self.arena[id].address),
                format!("including file {}", path.display()),
            );
            self.include(&path, "sending", id, depth);
        } else {
            self.diagnostics
                .reject(&mut self.arena[id], &RecipientError::IncludeNotPermitted);
        }
    }

    /// Expand `id` through the alias database.
    fn alias(&mut self, id: NodeId, depth: Depth) {
        let Some(rhs) = self.aliases.lookup(&self.arena[id].address.user) else {
            return;
        };

        self.diagnostics
            .info(Some(&self.arena[id].address), format!("aliased to {rhs}"));

        if controlling_address(&self.arena, Some(id)).is_none() {
            self.arena[id].verify(self.aliases.owner());
        }

        self.send_to_at(&rhs, Some(id), QueueFlags::EMPTY, depth.nested());
    }

    fn file_target(&mut self, id: NodeId, path: PathBuf) {
        let node = &mut self.arena[id];
        node.address.mailer = Mailer::File;
        node.address.user = path.display().to_string();

        let error = if self.may_target_privileged(&self.arena[id]) {
            if file_target_ok(&path, &self.credentials) {
                return;
            }
            RecipientError::CannotCreate(path)
        } else {
            RecipientError::FileNotPermitted
        };

        self.diagnostics.reject(&mut self.arena[id], &error);
    }

    fn local_user(&mut self, id: NodeId, name: &str, quoted: bool, depth: Depth) {
        let resolver = IdentityResolver::new(&*self.directory, self.config.space_substitute);
        let Some((identity, matched)) = resolver.resolve(name) else {
            self.diagnostics.reject(
                &mut self.arena[id],
                &RecipientError::UnknownUser(name.to_string()),
            );
            return;
        };

        let full_name = identity.full_name();
        if matched == Match::FullName {
            self.diagnostics.info(
                Some(&self.arena[id].address),
                format!("sending to {full_name} <{}>", identity.login),
            );
        }

        let id = if !quoted && self.arena[id].address.user != identity.login {
            let Some(target) = self.canonicalize(id, &identity.login) else {
                return;
            };
            target
        } else {
            id
        };

        let node = &mut self.arena[id];
        node.verify(Owner {
            uid: identity.uid,
            gid: identity.gid,
            home: Some(identity.home),
        });
        if node.address.display_name.is_none() && !full_name.is_empty() {
            node.address.display_name = Some(full_name);
        }

        if !quoted {
            self.forward(id, depth);
        }
    }

    /// Rename `id` to the login it resolved to and return the node that
    /// carries on as that user.
    ///
    /// If the login is already queued and deliverable, `id` keeps its name,
    /// is folded into that entry and `None` is returned. An entry that was
    /// replaced by an expansion leading back to `id` is revived instead. Any
    /// other undeliverable entry leaves `id` deliverable under its own name.
    fn canonicalize(&mut self, id: NodeId, login: &str) -> Option<NodeId> {
        let mut canonical = self.arena[id].address.clone();
        canonical.user = login.to_string();

        let existing = self
            .queue
            .iter()
            .copied()
            .find(|&other| other != id && self.arena[other].address.same_addr(&canonical));

        let Some(existing) = existing else {
            self.arena[id].address.user = canonical.user;
            return Some(id);
        };

        let sendable = self.arena[existing].is_sendable();
        let revive = !sendable
            && !self.arena[existing].flags.contains(QueueFlags::BAD_ADDRESS)
            && self.arena.controllers(id).any(|c| c == existing);

        if !sendable && !revive {
            expansion!("{} stays as {}: {} is not deliverable", login, id, existing);
            return Some(id);
        }

        if !self.arena[id].flags.contains(QueueFlags::PSEUDO) {
            self.diagnostics
                .info(Some(&self.arena[id].address), "duplicate suppressed");
        }
        let merged = QueueFlags::merge_duplicate(self.arena[existing].flags, self.arena[id].flags);
        self.arena[existing].flags = merged;
        self.arena[id].flags.insert(QueueFlags::DONT_SEND);

        if revive {
            self.arena[existing].flags.remove(QueueFlags::DONT_SEND);
            return Some(existing);
        }
        None
    }

    /// Expand a verified user's forwarding file, if there is one.
    fn forward(&mut self, id: NodeId, depth: Depth) {
        let Some(path) = self
            .arena[id]
            .owner()
            .and_then(|owner| self.forwards.forward_file(owner))
        else {
            return;
        };

        self.include(&path, "forwarding", id, depth);
    }
}
