//! Writability of file delivery targets.

use std::{
    fs::{self, Metadata},
    os::unix::fs::MetadataExt,
    path::Path,
};

/// Any execute permission bit.
const EXECUTE_BITS: u32 = 0o111;
const SET_UID: u32 = 0o4000;
const SET_GID: u32 = 0o2000;
const OWNER_WRITE: u32 = 0o200;
/// Owner write and search, needed to create a file in a directory.
const DIRECTORY_CREATE: u32 = 0o300;

/// Identity of the running process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Credentials {
    pub real_uid: u32,
    pub real_gid: u32,
    pub effective_uid: u32,
}

impl Credentials {
    /// Credentials of the current process.
    #[must_use]
    pub fn current() -> Self {
        // SAFETY: these calls cannot fail and have no preconditions.
        unsafe {
            Self {
                real_uid: libc::getuid(),
                real_gid: libc::getgid(),
                effective_uid: libc::geteuid(),
            }
        }
    }
}

/// The parts of a file's status the permission checks need.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileStat {
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
}

impl From<&Metadata> for FileStat {
    fn from(metadata: &Metadata) -> Self {
        Self {
            mode: metadata.mode(),
            uid: metadata.uid(),
            gid: metadata.gid(),
        }
    }
}

/// Whether mail may be appended to an existing file.
///
/// Any execute bit rejects the file. The acting identity is the real
/// uid/gid, except that a privileged process takes on the file's owner or
/// group when the set-uid or set-gid bit is present. The superuser may
/// write anything else; otherwise the owner, group or other write bit is
/// selected depending on how the acting identity matches the file.
#[must_use]
pub const fn writable(stat: &FileStat, credentials: &Credentials) -> bool {
    if stat.mode & EXECUTE_BITS != 0 {
        return false;
    }

    let mut uid = credentials.real_uid;
    let mut gid = credentials.real_gid;
    if credentials.effective_uid == 0 {
        if stat.mode & SET_UID != 0 {
            uid = stat.uid;
        }
        if stat.mode & SET_GID != 0 {
            gid = stat.gid;
        }
    }

    if uid == 0 {
        return true;
    }

    let mut bits = OWNER_WRITE;
    if uid != stat.uid {
        bits >>= 3;
        if gid != stat.gid {
            bits >>= 3;
        }
    }

    stat.mode & bits != 0
}

/// Whether a new file may be created in a directory: it must be owned by the
/// real uid, with owner write and search permission.
#[must_use]
pub const fn safe_directory(stat: &FileStat, credentials: &Credentials) -> bool {
    stat.uid == credentials.real_uid && stat.mode & DIRECTORY_CREATE == DIRECTORY_CREATE
}

/// Whether `path` is acceptable as a file delivery target: either an existing
/// writable file, or a new file in a safe directory.
#[must_use]
pub fn file_target_ok(path: &Path, credentials: &Credentials) -> bool {
    if let Ok(metadata) = fs::metadata(path) {
        return writable(&FileStat::from(&metadata), credentials);
    }

    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("/"),
    };

    fs::metadata(directory)
        .is_ok_and(|metadata| safe_directory(&FileStat::from(&metadata), credentials))
}
