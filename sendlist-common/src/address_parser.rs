//! Address-list tokenizer
//!
//! Splits one address off a delimiter-separated list and parses it into an
//! [`Address`]. This is deliberately forgiving: address lists come from
//! message headers, alias files and `:include:` files written by hand, and a
//! malformed entry only costs that entry.
//!
//! # Grammar
//!
//! ```text
//! list        = address *( delimiter address )
//! address     = name-addr / addr-spec *( "(" comment ")" )
//! name-addr   = [ phrase ] "<" route-addr ">"
//! route-addr  = [ "@" host *( "," "@" host ) ":" ] addr-spec
//! addr-spec   = user [ "@" host ]
//! user        = word / quoted-string / "|" command / "/" path / ":include:" path
//! ```
//!
//! A delimiter inside a quoted string, angle brackets or a comment does not
//! end an address. The whitespace delimiter (legacy lists) matches any
//! whitespace character.
//!
//! # Size Constraints
//!
//! - Maximum address length: [`MAX_NAME`] octets

use crate::address::{Address, Mailer, unquote};

/// Longest address (or joined `user at host` argument) that is accepted.
pub const MAX_NAME: usize = 256;

/// Result type for address parsing
pub type Result<T> = std::result::Result<T, AddressError>;

/// Errors that can occur while parsing a single address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// Nothing but whitespace, comments or an empty route
    Empty,
    /// Address exceeds [`MAX_NAME`] octets
    TooLong,
    /// Unclosed quoted string
    UnclosedQuotedString,
    /// `<` without `>` or the other way around
    UnbalancedAngleBrackets,
    /// `(` without `)` or the other way around
    UnbalancedParentheses,
    /// Nothing before the `@`
    MissingUser,
    /// Nothing after the `@`
    MissingHost,
}

impl std::fmt::Display for AddressError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "Empty address"),
            Self::TooLong => write!(f, "Address exceeds {MAX_NAME} octets"),
            Self::UnclosedQuotedString => write!(f, "Unclosed quoted string"),
            Self::UnbalancedAngleBrackets => write!(f, "Unbalanced '<' '>'"),
            Self::UnbalancedParentheses => write!(f, "Unbalanced '(' ')'"),
            Self::MissingUser => write!(f, "Missing user before '@'"),
            Self::MissingHost => write!(f, "Missing host after '@'"),
        }
    }
}

impl std::error::Error for AddressError {}

/// Parses addresses, deciding which of them belong to the local mailer.
#[derive(Debug, Clone, Default)]
pub struct AddressParser {
    local_hosts: Vec<String>,
}

impl AddressParser {
    /// Create a parser that treats `local_hosts` (and bare users) as local.
    #[must_use]
    pub fn new<I, S>(local_hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            local_hosts: local_hosts.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse the address starting at `cursor`.
    ///
    /// On return `cursor` points at the delimiter that ended the address, or
    /// at the end of `list`. A malformed address yields `None`; the cursor is
    /// still advanced so the caller can carry on with the rest of the list.
    pub fn parse(&self, list: &str, cursor: &mut usize, delimiter: char) -> Option<Address> {
        let start = (*cursor).min(list.len());
        let rest = &list[start..];
        let end = find_delimiter(rest, delimiter).map_or(list.len(), |offset| start + offset);
        *cursor = end;

        let token = &list[start..end];
        match self.parse_token(token) {
            Ok(address) => Some(address),
            Err(e) => {
                tracing::debug!(token, "Skipping address: {e}");
                None
            }
        }
    }

    /// Parse one complete address.
    ///
    /// # Errors
    ///
    /// Returns an [`AddressError`] describing why `token` is not an address.
    pub fn parse_token(&self, token: &str) -> Result<Address> {
        let token = token.trim();

        if token.is_empty() {
            return Err(AddressError::Empty);
        }
        if token.len() > MAX_NAME {
            return Err(AddressError::TooLong);
        }
        check_balanced(token)?;

        let (route, display_name) = match find_route(token) {
            Some((open, close)) => (&token[open + 1..close], clean_phrase(&token[..open])),
            None => {
                let (bare, comment) = strip_comments(token);
                return self.build(token, &bare, comment);
            }
        };

        self.build(token, route, display_name)
    }

    fn build(&self, printable: &str, route: &str, display_name: Option<String>) -> Result<Address> {
        let route = strip_source_route(route.trim()).trim();
        if route.is_empty() {
            return Err(AddressError::Empty);
        }

        let (user, host) = match find_unquoted_at(route) {
            Some(at) => {
                let (user, host) = (route[..at].trim(), route[at + 1..].trim());
                if user.is_empty() {
                    return Err(AddressError::MissingUser);
                }
                if host.is_empty() {
                    return Err(AddressError::MissingHost);
                }
                (user, Some(host.to_string()))
            }
            None => (route, None),
        };

        let mailer = match &host {
            Some(host) if !self.is_local_host(host) => Mailer::Remote,
            _ => Mailer::Local,
        };

        Ok(Address {
            printable: printable.to_string(),
            user: user.to_string(),
            host,
            mailer,
            display_name,
        })
    }

    fn is_local_host(&self, host: &str) -> bool {
        self.local_hosts
            .iter()
            .any(|local| local.eq_ignore_ascii_case(host))
    }
}

/// Tracks quoting and nesting while scanning an address.
#[derive(Default)]
struct Scanner {
    in_quotes: bool,
    escaped: bool,
    angle: isize,
    paren: isize,
}

impl Scanner {
    /// Feed one character; returns `true` if it is outside any quoting or
    /// nesting (and is not itself part of one).
    fn feed(&mut self, ch: char) -> bool {
        if self.escaped {
            self.escaped = false;
            return false;
        }

        match ch {
            '\\' => {
                self.escaped = true;
                false
            }
            '"' if self.paren == 0 => {
                self.in_quotes = !self.in_quotes;
                false
            }
            _ if self.in_quotes => false,
            '(' => {
                self.paren += 1;
                false
            }
            ')' => {
                self.paren -= 1;
                false
            }
            _ if self.paren > 0 => false,
            '<' => {
                self.angle += 1;
                false
            }
            '>' => {
                self.angle -= 1;
                false
            }
            _ => self.angle == 0,
        }
    }
}

fn find_delimiter(input: &str, delimiter: char) -> Option<usize> {
    let mut scanner = Scanner::default();

    for (i, ch) in input.char_indices() {
        let outside = scanner.feed(ch);
        let is_delimiter = if delimiter == ' ' {
            ch.is_whitespace()
        } else {
            ch == delimiter
        };

        if outside && is_delimiter {
            return Some(i);
        }
    }

    None
}

fn check_balanced(token: &str) -> Result<()> {
    let mut scanner = Scanner::default();

    for ch in token.chars() {
        scanner.feed(ch);
        if scanner.angle < 0 {
            return Err(AddressError::UnbalancedAngleBrackets);
        }
        if scanner.paren < 0 {
            return Err(AddressError::UnbalancedParentheses);
        }
    }

    if scanner.in_quotes {
        Err(AddressError::UnclosedQuotedString)
    } else if scanner.angle != 0 {
        Err(AddressError::UnbalancedAngleBrackets)
    } else if scanner.paren != 0 {
        Err(AddressError::UnbalancedParentheses)
    } else {
        Ok(())
    }
}

/// Byte offsets of the first `<` and its matching `>` outside quotes and
/// comments.
fn find_route(token: &str) -> Option<(usize, usize)> {
    let mut scanner = Scanner::default();
    let mut open = None;

    for (i, ch) in token.char_indices() {
        let (in_quotes, paren) = (scanner.in_quotes, scanner.paren);
        scanner.feed(ch);
        if in_quotes || paren > 0 {
            continue;
        }

        match ch {
            '<' if open.is_none() => open = Some(i),
            '>' if scanner.angle == 0 => return open.map(|open| (open, i)),
            _ => {}
        }
    }

    None
}

/// Remove `(comments)` outside quotes; the first non-empty comment is returned
/// as a display name.
fn strip_comments(token: &str) -> (String, Option<String>) {
    let mut bare = String::with_capacity(token.len());
    let mut comment = String::new();
    let mut first_comment = None;
    let mut scanner = Scanner::default();

    for ch in token.chars() {
        let before = scanner.paren;
        scanner.feed(ch);

        if before == 0 && scanner.paren == 0 {
            bare.push(ch);
        } else if before > 0 && scanner.paren == 0 {
            if first_comment.is_none() {
                first_comment = clean_phrase(&comment);
            }
            comment.clear();
        } else if before > 0 {
            comment.push(ch);
        }
    }

    (bare, first_comment)
}

fn clean_phrase(phrase: &str) -> Option<String> {
    let phrase = unquote(phrase.trim());
    let phrase = phrase.trim();
    (!phrase.is_empty()).then(|| phrase.to_string())
}

/// Drop an obsolete `@host1,@host2:` source route.
fn strip_source_route(route: &str) -> &str {
    if !route.starts_with('@') {
        return route;
    }

    let mut scanner = Scanner::default();
    let mut colon = None;
    for (i, ch) in route.char_indices() {
        if scanner.feed(ch) && ch == ':' {
            colon = Some(i);
        }
    }

    colon.map_or(route, |colon| &route[colon + 1..])
}

/// Position of the last `@` that is not inside a quoted string.
fn find_unquoted_at(input: &str) -> Option<usize> {
    let mut scanner = Scanner::default();
    let mut last = None;

    for (i, ch) in input.char_indices() {
        if scanner.feed(ch) && ch == '@' {
            last = Some(i);
        }
    }

    last
}
