//! Configuration for recipient resolution.
//!
//! Loaded from RON; every field has a default so an empty `()` (or no file
//! at all) is a valid configuration.
//!
//! ```ron
//! (
//!     max_recursion: 10,
//!     old_style_addresses: false,
//!     space_substitute: '.',
//!     local_hosts: ["localhost", "mail.example.org"],
//!     alias_file: Some("/etc/mail/aliases"),
//! )
//! ```

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Characters that may not be used as the space substitute because the list
/// tokenizer gives them meaning.
const RESERVED_SUBSTITUTES: [char; 4] = [',', ';', '<', '('];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Deepest alias/forward/include nesting before a branch is cut off.
    ///
    /// Default: 10
    #[serde(default = "defaults::max_recursion")]
    pub max_recursion: usize,

    /// Start each envelope in legacy mode, where a top-level list without any
    /// of `, ; < (` is split on whitespace.
    ///
    /// Default: false
    #[serde(default)]
    pub old_style_addresses: bool,

    /// Stands in for a space in user names, e.g. `John.Smith`.
    ///
    /// Default: '.'
    #[serde(default = "defaults::space_substitute")]
    pub space_substitute: char,

    /// Allow programs, files and `:include:`s without a trusted controller.
    ///
    /// Default: false
    #[serde(default)]
    pub force_mail: bool,

    /// Skip the alias database entirely.
    ///
    /// Default: false
    #[serde(default)]
    pub no_alias: bool,

    /// How long a recipient may stay queued.
    ///
    /// Default: 259200 seconds (3 days)
    #[serde(default = "defaults::queue_timeout_secs")]
    pub queue_timeout_secs: u64,

    /// Host names delivered by the local mailer, compared case-insensitively.
    #[serde(default = "defaults::local_hosts")]
    pub local_hosts: Vec<String>,

    /// aliases(5) file backing the alias database.
    #[serde(default)]
    pub alias_file: Option<PathBuf>,

    /// passwd(5) file to use instead of the system user database.
    #[serde(default)]
    pub passwd_file: Option<PathBuf>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_recursion: defaults::max_recursion(),
            old_style_addresses: false,
            space_substitute: defaults::space_substitute(),
            force_mail: false,
            no_alias: false,
            queue_timeout_secs: defaults::queue_timeout_secs(),
            local_hosts: defaults::local_hosts(),
            alias_file: None,
            passwd_file: None,
        }
    }
}

impl ResolverConfig {
    /// Parse and validate a RON configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed RON and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_ron(content: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read, otherwise as
    /// [`Self::from_ron`].
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content =
            std::fs::read_to_string(&path).map_err(|source| ConfigError::Read { path, source })?;
        Self::from_ron(&content)
    }

    /// Check values that serde cannot.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_recursion == 0 {
            return Err(ConfigError::Invalid {
                field: "max_recursion",
                reason: "must be at least 1".to_string(),
            });
        }

        if RESERVED_SUBSTITUTES.contains(&self.space_substitute)
            || self.space_substitute.is_whitespace()
        {
            return Err(ConfigError::Invalid {
                field: "space_substitute",
                reason: format!("'{}' is an address delimiter", self.space_substitute),
            });
        }

        Ok(())
    }

    #[must_use]
    pub const fn queue_timeout(&self) -> Duration {
        Duration::from_secs(self.queue_timeout_secs)
    }
}

/// Default configuration values.
mod defaults {
    pub const fn max_recursion() -> usize {
        10
    }

    pub const fn space_substitute() -> char {
        '.'
    }

    pub const fn queue_timeout_secs() -> u64 {
        259_200 // 3 days
    }

    pub fn local_hosts() -> Vec<String> {
        vec!["localhost".to_string()]
    }
}
