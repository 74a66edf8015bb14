//! The capability a property tree exposes to the [`Navigator`](crate::Navigator).
//!
//! Nodes are addressed by [`NodeId`] handles into the tree's own storage. The
//! navigator never assumes a concrete node kind; everything it does goes
//! through this trait.

use serde_json::Value;

use crate::event::{ChangeEvent, Events};
use crate::types::{NodeId, Result};

pub trait PropertyTree {
    /// The node a fresh navigator starts from.
    fn root(&self) -> NodeId;

    /// Attribute path of `node`, used in diagnostics.
    fn path(&self, node: NodeId) -> String;

    /// Resolves the child of `node` named `name`, ignoring case.
    fn child_by_name(&self, node: NodeId, name: &str) -> Result<NodeId>;

    /// Resolves the child of `node` at position `index`.
    fn child_at_index(&self, node: NodeId, index: usize) -> Result<NodeId>;

    /// Returns the first child of `node`, in declaration order, for which
    /// `criteria` holds. Stops scanning at the first match.
    fn find_child(&self, node: NodeId, criteria: &mut dyn FnMut(NodeId) -> bool) -> Option<NodeId>;

    /// Invokes `callback` on each child of `node` with its position. The first
    /// callback error halts iteration and is returned.
    fn for_each_child(
        &self,
        node: NodeId,
        callback: &mut dyn FnMut(usize, NodeId) -> Result<()>,
    ) -> Result<()>;

    fn add(&mut self, node: NodeId, value: Value) -> Result<Option<ChangeEvent>>;

    fn replace(&mut self, node: NodeId, value: Value) -> Result<Option<ChangeEvent>>;

    fn delete(&mut self, node: NodeId) -> Result<Option<ChangeEvent>>;

    /// Tells `node` that the given changes were committed at or below it.
    fn notify(&mut self, node: NodeId, events: &Events) -> Result<()>;
}
