//! `:include:` and forwarding files.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    os::unix::fs::MetadataExt,
    path::Path,
};

use sendlist_common::{QueueFlags, RecipientError};

use crate::{
    depth::Depth,
    node::{NodeId, Owner},
    resolver::Resolver,
    trust::controlling_address,
};

impl Resolver {
    /// Send to every line of `path` with `controller` as the controlling
    /// address.
    ///
    /// A controller without a verified identity takes on the file's owner.
    /// Failing to open the file is reported against the controller and
    /// leaves the rest of the message alone.
    pub(crate) fn include(&mut self, path: &Path, label: &str, controller: NodeId, depth: Depth) {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(source) => {
                self.diagnostics.reject(
                    &mut self.arena[controller],
                    &RecipientError::IncludeOpen {
                        path: path.to_path_buf(),
                        source,
                    },
                );
                return;
            }
        };

        if controlling_address(&self.arena, Some(controller)).is_none() {
            match file.metadata() {
                Ok(metadata) => self.arena[controller].verify(Owner {
                    uid: metadata.uid(),
                    gid: metadata.gid(),
                    home: None,
                }),
                Err(e) => self.diagnostics.system_error(
                    Some(&self.arena[controller].address),
                    format!("Cannot fstat {}: {e}", path.display()),
                ),
            }
        }

        let mut reader = BufReader::new(file);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    self.diagnostics.system_error(
                        Some(&self.arena[controller].address),
                        format!("Error reading {}: {e}", path.display()),
                    );
                    break;
                }
            }

            let line = String::from_utf8_lossy(&buf);
            let line = line.trim_end_matches(['\n', '\r']);
            if line.is_empty() {
                continue;
            }

            self.diagnostics
                .info(Some(&self.arena[controller].address), format!("{label} to {line}"));
            self.send_to_at(line, Some(controller), QueueFlags::EMPTY, depth.nested());
        }
    }
}
