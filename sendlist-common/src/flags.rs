//! Per-recipient flag set.

use std::{
    fmt,
    ops::{BitAnd, BitOr, BitOrAssign, Not},
};

use serde::{Deserialize, Serialize};

/// Independently settable recipient flags.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueFlags(u8);

impl QueueFlags {
    pub const EMPTY: Self = Self(0);
    /// Named directly by the sender rather than purely alias-derived.
    pub const PRIMARY: Self = Self(1);
    /// Kept for bookkeeping but never delivered.
    pub const DONT_SEND: Self = Self(1 << 1);
    /// Resolution failed; reported to the sender, never delivered.
    pub const BAD_ADDRESS: Self = Self(1 << 2);
    /// uid/gid/home came from a verified lookup, not from inheritance.
    pub const GOOD_UID: Self = Self(1 << 3);
    /// Synthetic entry (e.g. the sender) that does not report duplicates.
    pub const PSEUDO: Self = Self(1 << 4);

    /// Bits a node picks up from the address that expanded into it.
    ///
    /// `PRIMARY` is decided per list, `GOOD_UID` only ever comes from a
    /// lookup, and `DONT_SEND` on a controller means it was replaced by its
    /// expansion.
    pub const INHERITABLE: Self = Self(Self::BAD_ADDRESS.0 | Self::PSEUDO.0);

    const NAMES: [(Self, &'static str); 5] = [
        (Self::PRIMARY, "PRIMARY"),
        (Self::DONT_SEND, "DONT_SEND"),
        (Self::BAD_ADDRESS, "BAD_ADDRESS"),
        (Self::GOOD_UID, "GOOD_UID"),
        (Self::PSEUDO, "PSEUDO"),
    ];

    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// All bits of `other` are set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Any bit of `other` is set.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub const fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    /// Neither suppressed nor failed.
    #[must_use]
    pub const fn is_sendable(self) -> bool {
        !self.intersects(Self(Self::DONT_SEND.0 | Self::BAD_ADDRESS.0))
    }

    /// Flags of an existing queue entry after a duplicate of it is submitted.
    ///
    /// | existing `PRIMARY` | incoming `PSEUDO` | result                                   |
    /// |--------------------|-------------------|------------------------------------------|
    /// | no                 | no                | `existing \| incoming`, `PSEUDO` cleared |
    /// | no                 | yes               | `existing \| incoming`                   |
    /// | yes                | no                | `existing`, `PSEUDO` cleared             |
    /// | yes                | yes               | `existing`                               |
    #[must_use]
    pub const fn merge_duplicate(existing: Self, incoming: Self) -> Self {
        let mut merged = existing;

        if !existing.contains(Self::PRIMARY) {
            merged.insert(incoming);
        }
        if !incoming.contains(Self::PSEUDO) {
            merged.remove(Self::PSEUDO);
        }

        merged
    }
}

impl BitOr for QueueFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for QueueFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for QueueFlags {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        Self(self.0 & rhs.0)
    }
}

impl Not for QueueFlags {
    type Output = Self;

    fn not(self) -> Self::Output {
        Self(!self.0)
    }
}

impl fmt::Debug for QueueFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("EMPTY");
        }

        let mut first = true;
        for (flag, name) in Self::NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str(" | ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const P: QueueFlags = QueueFlags::PRIMARY;
    const D: QueueFlags = QueueFlags::DONT_SEND;
    const B: QueueFlags = QueueFlags::BAD_ADDRESS;
    const G: QueueFlags = QueueFlags::GOOD_UID;
    const S: QueueFlags = QueueFlags::PSEUDO;
    const E: QueueFlags = QueueFlags::EMPTY;

    #[test]
    fn test_merge_duplicate_truth_table() {
        let cases = [
            // existing, incoming, expected
            (E, E, E),
            (E, P, P),
            (E, D, D),
            (D, P, D | P),
            (P, D, P),
            (P | D, E, P | D),
            (S, E, E),
            (S, S, S),
            (S | D, P, P | D),
            (P | S, E, P),
            (P | S, S, P | S),
            (E, S | D, S | D),
            (G, B, G | B),
            (P | G, B, P | G),
        ];

        for (existing, incoming, expected) in cases {
            assert_eq!(
                QueueFlags::merge_duplicate(existing, incoming),
                expected,
                "merge({existing:?}, {incoming:?})"
            );
        }
    }

    #[test]
    fn test_is_sendable() {
        assert!(P.is_sendable());
        assert!((P | G).is_sendable());
        assert!(!(P | D).is_sendable());
        assert!(!B.is_sendable());
    }

    #[test]
    fn test_inheritable_excludes_trust_and_suppression() {
        let inherited = (P | D | B | G | S) & QueueFlags::INHERITABLE;
        assert_eq!(inherited, B | S);
    }

    #[test]
    fn test_insert_remove_contains() {
        let mut flags = E;
        flags.insert(P | D);
        assert!(flags.contains(P));
        assert!(flags.contains(P | D));
        assert!(!flags.contains(P | B));
        assert!(flags.intersects(P | B));

        flags.remove(P);
        assert_eq!(flags, D);
    }

    #[test]
    fn test_debug() {
        assert_eq!(format!("{:?}", P | D), "PRIMARY | DONT_SEND");
        assert_eq!(format!("{E:?}"), "EMPTY");
    }
}
