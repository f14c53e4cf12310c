use std::fmt::{Display, Formatter};
use std::ops::Neg;

/// Handle to a BDD node, with the complement bit stored in the sign.
///
/// Index `1` is the terminal node, so `Ref::ONE` is `@1` and `Ref::ZERO` is `~@1`.
/// Index `0` is never allocated.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Ref(i32);

impl Ref {
    pub const ONE: Ref = Ref(1);
    pub const ZERO: Ref = Ref(-1);

    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    pub const fn positive(index: u32) -> Self {
        Self(index as i32)
    }

    pub const fn is_negated(self) -> bool {
        self.0 < 0
    }

    pub const fn negate(self) -> Self {
        Self(-self.0)
    }

    /// The non-complemented version of this handle.
    pub const fn regular(self) -> Self {
        Self(self.0.abs())
    }

    /// Return the internal representation of the reference.
    pub const fn get(self) -> i32 {
        self.0
    }

    /// Return the index of the referenced node.
    pub const fn index(self) -> u32 {
        self.0.unsigned_abs()
    }

    pub const fn is_terminal(self) -> bool {
        self.0 == 1 || self.0 == -1
    }
}

impl Neg for Ref {
    type Output = Self;

    fn neg(self) -> Self::Output {
        self.negate()
    }
}

impl Display for Ref {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", if self.is_negated() { "~" } else { "" }, self.index())
    }
}
