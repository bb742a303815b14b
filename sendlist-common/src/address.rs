use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// Delivery classification of an address.
///
/// The parser only ever produces [`Mailer::Local`] or [`Mailer::Remote`]; the
/// resolver reclassifies local names into programs, files and `:include:`
/// directives as it learns more about them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mailer {
    /// A local mailbox (or an alias of one).
    Local,
    /// A pipe to a program, `|command`.
    Program,
    /// An absolute path to a file that mail is appended to.
    File,
    /// An `:include:` directive naming a list file.
    Include,
    /// Anything addressed to a non-local host.
    Remote,
}

impl Mailer {
    /// Mailers that deliver on this host ignore the host part when comparing.
    #[must_use]
    pub const fn is_local(self) -> bool {
        !matches!(self, Self::Remote)
    }
}

impl Display for Mailer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Local => "local",
            Self::Program => "prog",
            Self::File => "file",
            Self::Include => "include",
            Self::Remote => "remote",
        })
    }
}

/// A single parsed address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// The address as it was written, used in diagnostics.
    pub printable: String,
    /// The user token, still carrying any quoting.
    pub user: String,
    pub host: Option<String>,
    pub mailer: Mailer,
    /// `Name <addr>` or `addr (Name)`.
    pub display_name: Option<String>,
}

impl Address {
    #[must_use]
    pub fn new(user: impl Into<String>, host: Option<String>, mailer: Mailer) -> Self {
        let user = user.into();
        let printable = host
            .as_ref()
            .map_or_else(|| user.clone(), |host| format!("{user}@{host}"));

        Self {
            printable,
            user,
            host,
            mailer,
            display_name: None,
        }
    }

    /// Address equality used for duplicate suppression and self-reference
    /// detection.
    ///
    /// Mailers must match and users must match exactly. Hosts are only
    /// compared (case-insensitively) for remote addresses.
    #[must_use]
    pub fn same_addr(&self, other: &Self) -> bool {
        if self.mailer != other.mailer || self.user != other.user {
            return false;
        }

        if self.mailer.is_local() {
            return true;
        }

        match (&self.host, &other.host) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            (None, None) => true,
            _ => false,
        }
    }

    /// Lower-case the host, and the user of a plain local mailbox.
    ///
    /// Programs, file paths, `:include:` directives and quoted users keep
    /// their case, as does the local part of a remote address.
    pub fn normalize_case(&mut self) {
        if let Some(host) = self.host.as_mut() {
            host.make_ascii_lowercase();
        }

        let keeps_case = self.user.starts_with(['|', '/', '"', '\\'])
            || self.user.starts_with(":include:");
        if self.mailer == Mailer::Local && !keeps_case {
            self.user.make_ascii_lowercase();
        }
    }

    /// Whether the user token was protected by quoting (`"user"` or `\user`).
    ///
    /// Quote-protected local users are delivered to directly, skipping their
    /// forwarding file.
    #[must_use]
    pub fn is_quoted(&self) -> bool {
        self.user.contains('"') || self.user.starts_with('\\')
    }

    /// The user token with quotes and backslash escapes removed.
    #[must_use]
    pub fn unquoted_user(&self) -> String {
        unquote(&self.user)
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.host {
            Some(host) => write!(f, "{}@{host}", self.user),
            None => f.write_str(&self.user),
        }
    }
}

/// Strip double quotes and backslash escapes.
#[must_use]
pub fn unquote(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => {}
            '\\' => {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            }
            c => out.push(c),
        }
    }

    out
}
