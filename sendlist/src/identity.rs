//! Identity directory and the local-user resolver built on it.

use std::{
    ffi::{CStr, CString},
    io,
    path::{Path, PathBuf},
};

use sendlist_common::SourceError;

/// One entry of the user directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub login: String,
    pub uid: u32,
    pub gid: u32,
    /// Raw GECOS field.
    pub gecos: String,
    pub home: PathBuf,
}

impl Identity {
    /// Full name composed from the GECOS field.
    ///
    /// Only the part before the first comma is used, and each `&` is
    /// replaced by the login with its first letter capitalised.
    #[must_use]
    pub fn full_name(&self) -> String {
        let name = self.gecos.split(',').next().unwrap_or_default();
        if !name.contains('&') {
            return name.to_string();
        }

        let mut login = self.login.chars();
        let capitalised = login.next().map_or_else(String::new, |first| {
            first.to_uppercase().chain(login).collect::<String>()
        });

        name.replace('&', &capitalised)
    }
}

/// Source of identities.
pub trait Directory {
    /// Look up an exact login name.
    fn find_by_login(&self, login: &str) -> Option<Identity>;

    /// Every identity, in directory order.
    fn identities(&self) -> Vec<Identity>;
}

impl<T: Directory + ?Sized> Directory for Box<T> {
    fn find_by_login(&self, login: &str) -> Option<Identity> {
        (**self).find_by_login(login)
    }

    fn identities(&self) -> Vec<Identity> {
        (**self).identities()
    }
}

/// In-memory directory, usually read from a passwd(5) file.
#[derive(Clone, Debug, Default)]
pub struct StaticDirectory {
    entries: Vec<Identity>,
}

impl StaticDirectory {
    #[must_use]
    pub const fn new(entries: Vec<Identity>) -> Self {
        Self { entries }
    }

    /// Parse passwd(5) text: `login:password:uid:gid:gecos:home[:shell]`.
    ///
    /// Blank lines and lines starting with `#` are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Malformed`] for a line with too few fields or a
    /// non-numeric uid/gid.
    pub fn from_passwd(content: &str) -> Result<Self, SourceError> {
        let mut entries = Vec::new();

        for (index, line) in content.lines().enumerate() {
            let line = line.trim_end();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let malformed = |reason: &str| SourceError::Malformed {
                line: index + 1,
                reason: reason.to_string(),
            };

            let fields: Vec<&str> = line.split(':').collect();
            if fields.len() < 6 {
                return Err(malformed("expected at least 6 ':'-separated fields"));
            }

            entries.push(Identity {
                login: fields[0].to_string(),
                uid: fields[2].parse().map_err(|_| malformed("invalid uid"))?,
                gid: fields[3].parse().map_err(|_| malformed("invalid gid"))?,
                gecos: fields[4].to_string(),
                home: PathBuf::from(fields[5]),
            });
        }

        Ok(Self { entries })
    }

    /// Read a passwd(5) file.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Io`] if the file cannot be read, otherwise as
    /// [`Self::from_passwd`].
    pub fn load(path: &Path) -> Result<Self, SourceError> {
        let content = std::fs::read_to_string(path).map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_passwd(&content)
    }
}

impl Directory for StaticDirectory {
    fn find_by_login(&self, login: &str) -> Option<Identity> {
        self.entries.iter().find(|e| e.login == login).cloned()
    }

    fn identities(&self) -> Vec<Identity> {
        self.entries.clone()
    }
}

/// The host's user database via `getpwnam_r(3)` and `getpwent(3)`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemDirectory;

const INITIAL_BUFFER: usize = 1024;
const MAX_BUFFER: usize = 1024 * 1024;

impl Directory for SystemDirectory {
    fn find_by_login(&self, login: &str) -> Option<Identity> {
        let name = CString::new(login).ok()?;
        let mut buf: Vec<libc::c_char> = vec![0; INITIAL_BUFFER];

        loop {
            // SAFETY: an all-zero passwd is a valid value for getpwnam_r to fill.
            let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
            let mut result: *mut libc::passwd = std::ptr::null_mut();

            // SAFETY: every pointer is valid for the duration of the call and
            // `buf.len()` is the real size of `buf`.
            let rc = unsafe {
                libc::getpwnam_r(
                    name.as_ptr(),
                    &mut pwd,
                    buf.as_mut_ptr(),
                    buf.len(),
                    &mut result,
                )
            };

            match rc {
                0 if result.is_null() => return None,
                // SAFETY: on success `pwd` points into `buf`, which is alive.
                0 => return Some(unsafe { identity_from_passwd(&pwd) }),
                libc::ERANGE if buf.len() < MAX_BUFFER => buf.resize(buf.len() * 2, 0),
                errno => {
                    tracing::warn!(login, "getpwnam_r: {}", io::Error::from_raw_os_error(errno));
                    return None;
                }
            }
        }
    }

    fn identities(&self) -> Vec<Identity> {
        let mut identities = Vec::new();

        // getpwent is not reentrant; the directory is only walked from the
        // thread resolving a message.
        // SAFETY: plain libc calls; each returned entry is copied before the
        // next call invalidates it.
        unsafe {
            libc::setpwent();
            loop {
                let entry = libc::getpwent();
                if entry.is_null() {
                    break;
                }
                identities.push(identity_from_passwd(&*entry));
            }
            libc::endpwent();
        }

        identities
    }
}

/// Copy a libc passwd entry.
///
/// # Safety
///
/// Every string pointer in `pwd` must be null or a valid C string.
unsafe fn identity_from_passwd(pwd: &libc::passwd) -> Identity {
    let field = |ptr: *const libc::c_char| {
        if ptr.is_null() {
            String::new()
        } else {
            // SAFETY: guaranteed by the caller.
            unsafe { CStr::from_ptr(ptr) }
                .to_string_lossy()
                .into_owned()
        }
    };

    Identity {
        login: field(pwd.pw_name),
        uid: pwd.pw_uid,
        gid: pwd.pw_gid,
        gecos: field(pwd.pw_gecos),
        home: PathBuf::from(field(pwd.pw_dir)),
    }
}

/// How a name was matched to an identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Match {
    Login,
    FullName,
}

/// Maps local names to identities.
pub struct IdentityResolver<'a> {
    directory: &'a dyn Directory,
    space_substitute: char,
}

impl<'a> IdentityResolver<'a> {
    #[must_use]
    pub const fn new(directory: &'a dyn Directory, space_substitute: char) -> Self {
        Self {
            directory,
            space_substitute,
        }
    }

    /// Find the identity for `name`.
    ///
    /// The (lower-cased) name is tried as a login first. Failing that, `_`
    /// and the space substitute are read as spaces and every identity whose
    /// full name has more than one word is compared word by word,
    /// ignoring case. The first match wins.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<(Identity, Match)> {
        let name = name.to_ascii_lowercase();

        if let Some(identity) = self.directory.find_by_login(&name) {
            return Some((identity, Match::Login));
        }

        let wanted: String = name
            .chars()
            .map(|c| {
                if c == '_' || c == self.space_substitute {
                    ' '
                } else {
                    c
                }
            })
            .collect();

        self.directory
            .identities()
            .into_iter()
            .find(|identity| {
                let full_name = identity.full_name();
                full_name.trim().contains(' ') && same_words(&full_name, &wanted)
            })
            .map(|identity| (identity, Match::FullName))
    }
}

/// Word-by-word, case-insensitive comparison ignoring extra whitespace.
fn same_words(a: &str, b: &str) -> bool {
    let a: Vec<&str> = a.split_whitespace().collect();
    let b: Vec<&str> = b.split_whitespace().collect();

    a.len() == b.len()
        && a.iter()
            .zip(&b)
            .all(|(x, y)| x.eq_ignore_ascii_case(y))
}
