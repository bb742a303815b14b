use std::{os::unix::fs::MetadataExt, path::PathBuf};

use crate::node::Owner;

const OWNER_READ: u32 = 0o400;

/// Finds the forwarding file of a verified local user.
pub trait ForwardSource {
    fn forward_file(&self, owner: &Owner) -> Option<PathBuf>;
}

impl<T: ForwardSource + ?Sized> ForwardSource for Box<T> {
    fn forward_file(&self, owner: &Owner) -> Option<PathBuf> {
        (**self).forward_file(owner)
    }
}

/// `~/.forward`, honoured only when it is a regular file owned by the user
/// (or root) and readable by its owner.
#[derive(Clone, Copy, Debug, Default)]
pub struct HomeForward;

impl ForwardSource for HomeForward {
    fn forward_file(&self, owner: &Owner) -> Option<PathBuf> {
        let path = owner.home.as_ref()?.join(".forward");
        let metadata = std::fs::metadata(&path).ok()?;

        let owned = metadata.uid() == owner.uid || metadata.uid() == 0;
        (metadata.is_file() && owned && metadata.mode() & OWNER_READ != 0).then_some(path)
    }
}
