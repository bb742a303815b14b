//! Alias database lookups.

use std::{collections::HashMap, os::unix::fs::MetadataExt, path::Path};

use sendlist_common::SourceError;

use crate::node::Owner;

/// Maps local names to address lists.
pub trait AliasDatabase {
    /// The right-hand side for `name`, if it is an alias.
    fn lookup(&self, name: &str) -> Option<String>;

    /// The identity that owns the database. Aliases expanded from it act
    /// with this identity unless their controlling address has one already.
    fn owner(&self) -> Owner;
}

impl<T: AliasDatabase + ?Sized> AliasDatabase for Box<T> {
    fn lookup(&self, name: &str) -> Option<String> {
        (**self).lookup(name)
    }

    fn owner(&self) -> Owner {
        (**self).owner()
    }
}

/// An in-memory alias table, usually read from an aliases(5) file.
#[derive(Clone, Debug)]
pub struct AliasMap {
    entries: HashMap<String, String>,
    owner: Owner,
}

impl Default for AliasMap {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            owner: Owner::ROOT,
        }
    }
}

impl AliasMap {
    /// Parse aliases(5) text.
    ///
    /// Each entry is `name: address, address, ...`. A line starting with
    /// whitespace continues the previous entry, `#` starts a comment line,
    /// and names are case-insensitive. The map is owned by root.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Malformed`] for an entry without a `:` or with an
    /// empty name, or a continuation line with nothing to continue.
    pub fn parse(content: &str) -> Result<Self, SourceError> {
        let mut map = Self::default();
        let mut current: Option<(String, String)> = None;

        for (index, line) in content.lines().enumerate() {
            let malformed = |reason: &str| SourceError::Malformed {
                line: index + 1,
                reason: reason.to_string(),
            };

            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }

            if line.starts_with([' ', '\t']) {
                let Some((_, rhs)) = current.as_mut() else {
                    return Err(malformed("continuation line without an alias"));
                };
                rhs.push(',');
                rhs.push_str(line.trim());
                continue;
            }

            if let Some((name, rhs)) = current.take() {
                map.insert(&name, rhs);
            }

            let Some((name, rhs)) = line.split_once(':') else {
                return Err(malformed("expected 'name: address, ...'"));
            };
            let name = name.trim();
            if name.is_empty() {
                return Err(malformed("empty alias name"));
            }

            current = Some((name.to_string(), rhs.trim().to_string()));
        }

        if let Some((name, rhs)) = current {
            map.insert(&name, rhs);
        }

        Ok(map)
    }

    /// Read an aliases(5) file. The map is owned by the file's owner.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Io`] if the file cannot be read, otherwise as
    /// [`Self::parse`].
    pub fn load(path: &Path) -> Result<Self, SourceError> {
        let io_error = |source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        };

        let content = std::fs::read_to_string(path).map_err(io_error)?;
        let metadata = std::fs::metadata(path).map_err(io_error)?;

        let mut map = Self::parse(&content)?;
        map.owner = Owner {
            uid: metadata.uid(),
            gid: metadata.gid(),
            home: None,
        };

        Ok(map)
    }

    pub fn insert(&mut self, name: &str, rhs: impl Into<String>) {
        self.entries.insert(name.to_ascii_lowercase(), rhs.into());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl AliasDatabase for AliasMap {
    fn lookup(&self, name: &str) -> Option<String> {
        self.entries.get(&name.to_ascii_lowercase()).cloned()
    }

    fn owner(&self) -> Owner {
        self.owner.clone()
    }
}
