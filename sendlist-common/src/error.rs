//! Error types shared by the resolver crates.
//!
//! Recipient errors never abort a resolution: they are attached to the
//! offending recipient as diagnostics while its siblings carry on. Only
//! configuration and data-source errors are returned with `?`.

use std::{io, path::PathBuf};

use thiserror::Error;

/// Per-recipient, user-attributable failures.
#[derive(Debug, Error)]
pub enum RecipientError {
    /// Expansion nested deeper than the configured maximum.
    #[error("aliasing/forwarding loop broken")]
    LoopBroken,

    /// A program target without a trusted controlling identity.
    #[error("Cannot mail directly to programs")]
    ProgramNotPermitted,

    /// A file target without a trusted controlling identity.
    #[error("Cannot mail directly to files")]
    FileNotPermitted,

    /// An `:include:` directive without a trusted controlling identity.
    #[error("Cannot mail directly to :include:s")]
    IncludeNotPermitted,

    /// The identity directory has no such login or full name.
    #[error("User unknown: {0}")]
    UnknownUser(String),

    /// A file target that is neither writable nor safely creatable.
    #[error("Cannot create {}", .0.display())]
    CannotCreate(PathBuf),

    /// An `:include:` or forwarding file could not be opened.
    #[error("Cannot open {}: {source}", .path.display())]
    IncludeOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A joined `user at host` argument is too long.
    #[error("address overflow")]
    AddressOverflow,
}

impl RecipientError {
    /// Returns `true` if the recipient itself is undeliverable as a result.
    #[must_use]
    pub const fn is_bad_address(&self) -> bool {
        matches!(
            self,
            Self::ProgramNotPermitted
                | Self::FileNotPermitted
                | Self::IncludeNotPermitted
                | Self::UnknownUser(_)
                | Self::CannotCreate(_)
        )
    }
}

/// Errors loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("Failed to read config from {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The configuration is not valid RON for this schema.
    #[error("Invalid config: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// A configuration value is out of range.
    #[error("Invalid configuration for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Errors loading an identity directory or alias map from a file.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Failed to read the source file.
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A line could not be understood.
    #[error("Line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}
