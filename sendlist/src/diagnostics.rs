//! The report produced while resolving one message.

use std::fmt::{self, Display};

use sendlist_common::{Address, QueueFlags, RecipientError, internal};

use crate::node::RecipientNode;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    /// Verbose trace of what the resolver did.
    Info,
    /// Attributed to the message and reported back to the sender.
    UserError,
    /// A local problem the administrator has to look at.
    SystemError,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Printable form of the recipient the diagnostic is about.
    pub recipient: Option<String>,
    pub message: String,
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.recipient {
            Some(recipient) => write!(f, "{recipient}... {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn info(&mut self, recipient: Option<&Address>, message: impl Into<String>) {
        self.record(Severity::Info, recipient, message.into());
    }

    pub fn user_error(&mut self, recipient: Option<&Address>, error: &RecipientError) {
        self.record(Severity::UserError, recipient, error.to_string());
    }

    /// Report `error` against `node`, marking the node undeliverable when the
    /// error makes it so.
    pub fn reject(&mut self, node: &mut RecipientNode, error: &RecipientError) {
        if error.is_bad_address() {
            node.flags.insert(QueueFlags::BAD_ADDRESS);
        }
        self.user_error(Some(&node.address), error);
    }

    pub fn system_error(&mut self, recipient: Option<&Address>, message: impl Into<String>) {
        self.record(Severity::SystemError, recipient, message.into());
    }

    fn record(&mut self, severity: Severity, recipient: Option<&Address>, message: String) {
        let diagnostic = Diagnostic {
            severity,
            recipient: recipient.map(|address| address.printable.clone()),
            message,
        };

        match severity {
            Severity::Info => internal!(level = DEBUG, "{}", diagnostic),
            Severity::UserError => internal!(level = WARN, "{}", diagnostic),
            Severity::SystemError => internal!(level = ERROR, "{}", diagnostic),
        }

        self.entries.push(diagnostic);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    /// Diagnostics of at least user-error severity.
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries
            .iter()
            .filter(|d| d.severity != Severity::Info)
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
