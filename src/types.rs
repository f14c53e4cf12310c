//! Type-safe wrappers for BDD variables and levels.
//!
//! A [`Var`] names a boolean decision variable and never changes once
//! allocated; a [`Level`] is its current position in the ordering and moves
//! whenever the manager reorders.
use std::fmt;

/// A variable identifier (1-indexed).
///
/// # Invariants
///
/// - Variable IDs must be >= 1 (0 is reserved for the terminal)
/// - Variable IDs are allocated monotonically and never reused
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Var(u32);

impl Var {
    /// Creates a new variable with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if `id == 0`. Variables must be 1-indexed.
    pub fn new(id: u32) -> Self {
        assert_ne!(id, 0, "Variable IDs must be >= 1");
        Var(id)
    }

    /// Returns the raw variable ID.
    pub fn id(self) -> u32 {
        self.0
    }

    /// Returns the ID as a slot index into per-variable tables.
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Returns the variable allocated right after this one.
    pub fn succ(self) -> Self {
        Var(self.0 + 1)
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

impl From<Var> for u32 {
    fn from(var: Var) -> Self {
        var.0
    }
}

/// A level in the variable ordering (0-indexed, top to bottom).
///
/// The terminal node sits below every variable, at [`Level::TERMINAL`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Level(usize);

impl Level {
    pub const TERMINAL: Level = Level(usize::MAX);

    pub fn new(index: usize) -> Self {
        Level(index)
    }

    pub fn index(self) -> usize {
        self.0
    }

    pub fn next(self) -> Self {
        Level(self.0 + 1)
    }

    /// Returns the previous level up, or None if at level 0.
    pub fn prev(self) -> Option<Self> {
        self.0.checked_sub(1).map(Level)
    }

    pub fn is_terminal(self) -> bool {
        self == Self::TERMINAL
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_terminal() {
            write!(f, "L#")
        } else {
            write!(f, "L{}", self.0)
        }
    }
}

impl From<usize> for Level {
    fn from(index: usize) -> Self {
        Level(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_var_creation() {
        let v1 = Var::new(1);
        let v2 = v1.succ();
        assert_eq!(v1.id(), 1);
        assert_eq!(v2.id(), 2);
        assert_eq!(v2.index(), 2);
        assert!(v1 < v2);
    }

    #[test]
    #[should_panic(expected = "Variable IDs must be >= 1")]
    fn test_var_zero_panics() {
        Var::new(0);
    }

    #[test]
    fn test_level_navigation() {
        let l0 = Level::new(0);
        let l1 = l0.next();
        assert_eq!(l1.prev(), Some(l0));
        assert_eq!(l0.prev(), None);
        assert!(l1 < Level::TERMINAL);
        assert!(Level::TERMINAL.is_terminal());
    }
}
