/// Nesting depth of an expansion.
///
/// Passed by value through every expansion entry point; entering an alias,
/// `:include:` or forward expansion hands the callee [`Depth::nested`], so
/// unwinding (normally or after an error) restores the caller's depth.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Depth(usize);

impl Depth {
    /// Depth of a list supplied by the sender.
    pub const TOP: Self = Self(0);

    #[must_use]
    pub const fn nested(self) -> Self {
        Self(self.0 + 1)
    }

    #[must_use]
    pub const fn exceeds(self, max: usize) -> bool {
        self.0 > max
    }

    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }
}
