//! Type definitions shared by the tree and the navigator.

use std::fmt;

/// Handle to a node inside a property tree arena.
///
/// Handles are plain indices into the tree that issued them. A handle to a
/// node that was removed from the tree may later be reused for a new node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl TryFrom<usize> for NodeId {
    type Error = std::num::TryFromIntError;

    fn try_from(index: usize) -> std::result::Result<Self, Self::Error> {
        u32::try_from(index).map(NodeId)
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, crate::PropError>;
