use crate::reference::Ref;
use crate::types::Var;

/// Internal node of the graph.
///
/// The high edge of a stored node is never complemented; negation is pushed
/// onto the low edge and the incoming handle instead.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Node {
    pub variable: Var,
    pub low: Ref,
    pub high: Ref,
}

impl Node {
    /// Placeholder stored in free slots and in the terminal slot.
    pub(crate) fn vacant() -> Self {
        Self {
            variable: Var::new(u32::MAX),
            low: Ref::ZERO,
            high: Ref::ONE,
        }
    }
}
