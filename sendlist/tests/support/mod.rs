//! Test support for resolving recipients against an in-memory user directory
//! and alias table.

#![allow(dead_code, clippy::expect_used, clippy::unwrap_used)]

use std::{
    os::unix::fs::{MetadataExt, PermissionsExt},
    path::{Path, PathBuf},
};

use sendlist::{AliasMap, Credentials, RecipientNode, Resolution, Resolver, StaticDirectory};
use sendlist_common::{Mailer, QueueFlags, ResolverConfig};
use tempfile::TempDir;

const PASSWD: &str = "\
root:x:0:0:Charlie &:/nonexistent/root:/bin/sh
alice:x:1001:100:Alice Liddell:/nonexistent/alice:/bin/sh
bob:x:1002:100:Bob,,,:/nonexistent/bob:/bin/sh
carol:x:1003:100::/nonexistent/carol:/bin/sh
dave:x:1004:100::/nonexistent/dave:/bin/sh
erin:x:1005:100::/nonexistent/erin:/bin/sh
jsmith:x:1006:100:John Smith,Room 1:/nonexistent/jsmith:/bin/sh
";

/// A resolver environment: users, aliases, configuration and a scratch
/// directory for include, forward and mailbox files.
pub struct Harness {
    dir: TempDir,
    passwd: String,
    aliases: AliasMap,
    config: ResolverConfig,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create scratch directory"),
            passwd: PASSWD.to_string(),
            aliases: AliasMap::default(),
            config: ResolverConfig::default(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    #[must_use]
    pub fn alias(mut self, name: &str, rhs: &str) -> Self {
        self.aliases.insert(name, rhs);
        self
    }

    #[must_use]
    pub fn config(mut self, f: impl FnOnce(&mut ResolverConfig)) -> Self {
        f(&mut self.config);
        self
    }

    /// Add a user owned by the running process, with a home directory in the
    /// scratch directory. Returns the home directory.
    pub fn local_user(&mut self, login: &str) -> PathBuf {
        let home = self.path().join(login);
        std::fs::create_dir(&home).unwrap();
        let metadata = std::fs::metadata(&home).unwrap();

        self.passwd.push_str(&format!(
            "{login}:x:{}:{}::{}:/bin/sh\n",
            metadata.uid(),
            metadata.gid(),
            home.display()
        ));

        home
    }

    /// Write a file in the scratch directory with the given mode.
    pub fn file(&self, name: &str, content: &str, mode: u32) -> PathBuf {
        let path = self.path().join(name);
        std::fs::write(&path, content).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    pub fn resolver(&self) -> Resolver {
        Resolver::builder(self.config.clone())
            .directory(StaticDirectory::from_passwd(&self.passwd).unwrap())
            .aliases(self.aliases.clone())
            .credentials(Credentials::current())
            .build()
            .unwrap()
    }

    pub fn resolve(&self, list: &str) -> Resolution {
        let mut resolver = self.resolver();
        resolver.send_to(list, None, QueueFlags::EMPTY);
        resolver.finish()
    }
}

/// Printable form of every deliverable recipient, in order.
pub fn deliverable(resolution: &Resolution) -> Vec<String> {
    resolution
        .deliverable()
        .map(|node| node.address.to_string())
        .collect()
}

/// Users of every queue entry, in order.
pub fn queued(resolution: &Resolution) -> Vec<String> {
    resolution
        .queue()
        .iter()
        .map(|&id| resolution.arena()[id].address.user.clone())
        .collect()
}

/// The queue entry with the given user.
pub fn entry<'a>(resolution: &'a Resolution, user: &str) -> &'a RecipientNode {
    resolution
        .queue()
        .iter()
        .map(|&id| &resolution.arena()[id])
        .find(|node| node.address.user == user)
        .unwrap_or_else(|| panic!("{user} is not queued"))
}

/// The queue entry for an `:include:` directive.
pub fn include_entry(resolution: &Resolution) -> &RecipientNode {
    resolution
        .queue()
        .iter()
        .map(|&id| &resolution.arena()[id])
        .find(|node| node.address.mailer == Mailer::Include)
        .expect("no :include: entry queued")
}

/// Messages of every diagnostic, in order.
pub fn messages(resolution: &Resolution) -> Vec<String> {
    resolution
        .diagnostics()
        .iter()
        .map(|d| d.message.clone())
        .collect()
}
