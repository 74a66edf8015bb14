//! Stack-based cursor over a [`PropertyTree`].
//!
//! The navigator remembers every node it stepped through, from the source it
//! was created with to the currently focused node. Mutations made through it
//! are replayed upward along that trace, so every ancestor gets to observe (or
//! veto) a change committed deep in the tree without any upward search.
//!
//! Errors are sticky: a failed step is recorded and every later step or
//! mutation becomes a no-op until [`Navigator::clear_error`] is called. This
//! lets callers chain steps and check once at the end:
//!
//! ```
//! use scim_prop::{navigate, Attribute, Resource};
//! use serde_json::json;
//!
//! let schema = Attribute::from_value(json!({
//!     "name": "User", "type": "complex", "subAttributes": [
//!         {"name": "emails", "type": "complex", "multiValued": true, "subAttributes": [
//!             {"name": "value", "type": "string"}
//!         ]}
//!     ]
//! })).unwrap();
//! let mut user = Resource::new(schema).unwrap();
//!
//! let mut nav = navigate(&mut user);
//! nav.dot("emails").add(json!({"value": "x@y.com"}));
//! nav.at(0).dot("value").replace("a@b.com");
//! assert!(!nav.has_error());
//! assert_eq!(nav.depth(), 4);
//!
//! nav.dot("nope");
//! assert!(nav.has_error());
//! assert_eq!(nav.depth(), 4);
//! ```

use serde_json::Value;

use crate::event::{ChangeEvent, Events};
use crate::tree::PropertyTree;
use crate::types::{NodeId, Result};
use crate::PropError;

/// Creates a navigator positioned at the root of `tree`.
pub fn navigate<T: PropertyTree + ?Sized>(tree: &mut T) -> Navigator<'_, T> {
    let root = tree.root();
    Navigator::new(tree, root)
}

/// Cursor over a [`PropertyTree`] that records the nodes it stepped through.
///
/// Steps ([`dot`](Self::dot), [`at`](Self::at), [`find`](Self::find)) push
/// onto the trace, [`retract`](Self::retract) pops. Mutations go to the
/// current node and their events are then delivered to every node on the
/// trace, current first and source last. The first failure, whether a step,
/// a mutation or a notification, is kept as the error and turns every later
/// step and mutation into a no-op.
///
/// # Example
///
/// ```
/// use scim_prop::{Attribute, Navigator, PropertyTree, Resource};
/// use serde_json::json;
///
/// let schema = Attribute::from_value(json!({
///     "name": "User", "type": "complex", "subAttributes": [
///         {"name": "name", "type": "complex", "subAttributes": [
///             {"name": "givenName", "type": "string"}
///         ]}
///     ]
/// })).unwrap();
/// let mut user = Resource::new(schema).unwrap();
/// let name = user.child_by_name(user.root(), "name").unwrap();
///
/// // Trace starts at `name`, so the root is never notified.
/// let mut nav = Navigator::new(&mut user, name);
/// nav.dot("givenName").replace("Barbara").retract().retract();
/// assert_eq!(nav.current(), name);
/// assert!(nav.into_result().is_ok());
/// ```
pub struct Navigator<'t, T: PropertyTree + ?Sized> {
    tree: &'t mut T,
    stack: Vec<NodeId>,
    err: Option<PropError>,
}

impl<'t, T: PropertyTree + ?Sized> Navigator<'t, T> {
    /// Creates a navigator whose source is `source`. The source can never be
    /// retracted.
    pub fn new(tree: &'t mut T, source: NodeId) -> Self {
        Navigator {
            tree,
            stack: vec![source],
            err: None,
        }
    }

    /// The error recorded by a previous step, if any.
    pub fn error(&self) -> Option<&PropError> {
        self.err.as_ref()
    }

    /// Whether a step or mutation has failed since the error was last
    /// cleared.
    pub fn has_error(&self) -> bool {
        self.err.is_some()
    }

    /// Resets the error state. The stack is left as it is.
    pub fn clear_error(&mut self) {
        self.err = None;
    }

    /// Number of nodes on the trace, including the current one. At least one.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// The node the navigator was created at, bottom of the trace.
    pub fn source(&self) -> NodeId {
        self.stack[0]
    }

    /// The focused node, top of the trace. Mutations apply here.
    ///
    /// # Example
    ///
    /// ```
    /// use scim_prop::{navigate, Attribute, Resource};
    /// use serde_json::json;
    ///
    /// let schema = Attribute::from_value(json!({
    ///     "name": "User", "type": "complex", "subAttributes": [
    ///         {"name": "userName", "type": "string"}
    ///     ]
    /// })).unwrap();
    /// let mut user = Resource::new(schema).unwrap();
    ///
    /// let mut nav = navigate(&mut user);
    /// assert_eq!(nav.current(), nav.source());
    /// nav.dot("userName").replace("bjensen");
    /// assert_eq!(nav.tree().raw(nav.current()), json!("bjensen"));
    /// ```
    pub fn current(&self) -> NodeId {
        self.stack[self.stack.len() - 1]
    }

    /// Nodes on the trace, source first.
    pub fn trace(&self) -> &[NodeId] {
        &self.stack
    }

    /// Read access to the tree being navigated.
    pub fn tree(&self) -> &T {
        &*self.tree
    }

    /// Steps back to the previously focused node. No-op at the source.
    ///
    /// Retraction ignores the error state so callers can unwind after a
    /// failed step.
    pub fn retract(&mut self) -> &mut Self {
        if self.stack.len() > 1 {
            self.stack.pop();
        }
        self
    }

    /// Focuses the child named `name` (case insensitive).
    pub fn dot(&mut self, name: &str) -> &mut Self {
        if self.err.is_some() {
            return self;
        }
        let current = self.current();
        match self.tree.child_by_name(current, name) {
            Ok(child) => self.stack.push(child),
            Err(_) => {
                self.err = Some(PropError::InvalidPath {
                    name: name.to_string(),
                    path: self.tree.path(current),
                });
            }
        }
        self
    }

    /// Focuses the child at `index`.
    pub fn at(&mut self, index: usize) -> &mut Self {
        if self.err.is_some() {
            return self;
        }
        let current = self.current();
        match self.tree.child_at_index(current, index) {
            Ok(child) => self.stack.push(child),
            Err(_) => {
                self.err = Some(PropError::NoTarget {
                    target: format!("at index '{index}'"),
                    path: self.tree.path(current),
                });
            }
        }
        self
    }

    /// Focuses the first child, in declaration order, meeting `criteria`.
    pub fn find<F>(&mut self, mut criteria: F) -> &mut Self
    where
        F: FnMut(&T, NodeId) -> bool,
    {
        if self.err.is_some() {
            return self;
        }
        let current = self.current();
        let tree: &T = &*self.tree;
        match tree.find_child(current, &mut |child| criteria(tree, child)) {
            Some(child) => self.stack.push(child),
            None => {
                self.err = Some(PropError::NoTarget {
                    target: "meeting criteria".to_string(),
                    path: self.tree.path(current),
                });
            }
        }
        self
    }

    /// Invokes `callback` on every child of the current node. Returns the
    /// recorded error without iterating if the navigator is faulted.
    pub fn for_each_child<F>(&self, mut callback: F) -> Result<()>
    where
        F: FnMut(&T, usize, NodeId) -> Result<()>,
    {
        if let Some(err) = &self.err {
            return Err(err.clone());
        }
        let tree: &T = &*self.tree;
        tree.for_each_child(self.current(), &mut |index, child| {
            callback(tree, index, child)
        })
    }

    /// Adds `value` to the current node and notifies the trace.
    pub fn add(&mut self, value: impl Into<Value>) -> &mut Self {
        let value = value.into();
        self.delegate(move |tree, node| tree.add(node, value))
    }

    /// Replaces the current node's value and notifies the trace.
    pub fn replace(&mut self, value: impl Into<Value>) -> &mut Self {
        let value = value.into();
        self.delegate(move |tree, node| tree.replace(node, value))
    }

    /// Deletes the current node's value and notifies the trace.
    pub fn delete(&mut self) -> &mut Self {
        self.delegate(|tree, node| tree.delete(node))
    }

    /// Consumes the navigator, yielding the focused node or the recorded error.
    pub fn into_result(self) -> Result<NodeId> {
        let current = self.current();
        match self.err {
            Some(err) => Err(err),
            None => Ok(current),
        }
    }

    fn delegate<F>(&mut self, mutation: F) -> &mut Self
    where
        F: FnOnce(&mut T, NodeId) -> Result<Option<ChangeEvent>>,
    {
        if self.err.is_some() {
            return self;
        }
        let current = self.current();
        let outcome = mutation(&mut *self.tree, current).and_then(|event| match event {
            Some(event) => self.propagate(&event.to_events()),
            None => Ok(()),
        });
        if let Err(err) = outcome {
            self.err = Some(err);
        }
        self
    }

    /// Notifies every node on the trace, current first and source last. Stops
    /// at the first failure.
    fn propagate(&mut self, events: &Events) -> Result<()> {
        for &node in self.stack.iter().rev() {
            self.tree.notify(node, events)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use serde_json::json;

    /// Minimal tree: named nodes with ordered children, recording every
    /// notification it receives.
    #[derive(Default)]
    struct RecordingTree {
        names: Vec<String>,
        children: Vec<Vec<NodeId>>,
        values: Vec<Value>,
        notified: Vec<(NodeId, Events)>,
        mutations: usize,
        veto_at: Option<NodeId>,
        fail_mutations: bool,
    }

    impl RecordingTree {
        fn node(&mut self, parent: Option<NodeId>, name: &str) -> NodeId {
            let id = NodeId::try_from(self.names.len()).unwrap();
            self.names.push(name.to_string());
            self.children.push(Vec::new());
            self.values.push(Value::Null);
            if let Some(parent) = parent {
                self.children[parent.index()].push(id);
            }
            id
        }

        /// root -> a -> (b, c); root -> d
        fn sample() -> (RecordingTree, [NodeId; 5]) {
            let mut t = RecordingTree::default();
            let root = t.node(None, "root");
            let a = t.node(Some(root), "a");
            let b = t.node(Some(a), "b");
            let c = t.node(Some(a), "c");
            let d = t.node(Some(root), "d");
            (t, [root, a, b, c, d])
        }

        fn notified_nodes(&self) -> Vec<NodeId> {
            self.notified.iter().map(|(n, _)| *n).collect()
        }
    }

    impl PropertyTree for RecordingTree {
        fn root(&self) -> NodeId {
            NodeId(0)
        }

        fn path(&self, node: NodeId) -> String {
            self.names[node.index()].clone()
        }

        fn child_by_name(&self, node: NodeId, name: &str) -> Result<NodeId> {
            self.children[node.index()]
                .iter()
                .copied()
                .find(|c| self.names[c.index()].eq_ignore_ascii_case(name))
                .ok_or_else(|| PropError::InvalidPath {
                    name: name.to_string(),
                    path: self.path(node),
                })
        }

        fn child_at_index(&self, node: NodeId, index: usize) -> Result<NodeId> {
            self.children[node.index()]
                .get(index)
                .copied()
                .ok_or_else(|| PropError::NoTarget {
                    target: format!("at index '{index}'"),
                    path: self.path(node),
                })
        }

        fn find_child(
            &self,
            node: NodeId,
            criteria: &mut dyn FnMut(NodeId) -> bool,
        ) -> Option<NodeId> {
            self.children[node.index()].iter().copied().find(|c| criteria(*c))
        }

        fn for_each_child(
            &self,
            node: NodeId,
            callback: &mut dyn FnMut(usize, NodeId) -> Result<()>,
        ) -> Result<()> {
            for (i, c) in self.children[node.index()].iter().enumerate() {
                callback(i, *c)?;
            }
            Ok(())
        }

        fn add(&mut self, node: NodeId, value: Value) -> Result<Option<ChangeEvent>> {
            self.replace(node, value)
        }

        fn replace(&mut self, node: NodeId, value: Value) -> Result<Option<ChangeEvent>> {
            self.mutations += 1;
            if self.fail_mutations {
                return Err(PropError::InvalidValue("refused".into()));
            }
            if self.values[node.index()] == value {
                return Ok(None);
            }
            self.values[node.index()] = value.clone();
            let first = Event::assigned(node, self.path(node), value);
            let second = Event::assigned(node, self.path(node), json!("derived"));
            Ok(Some(ChangeEvent::Composite(vec![first.into(), second.into()])))
        }

        fn delete(&mut self, node: NodeId) -> Result<Option<ChangeEvent>> {
            self.mutations += 1;
            let previous = std::mem::take(&mut self.values[node.index()]);
            if previous.is_null() {
                return Ok(None);
            }
            Ok(Some(Event::unassigned(node, self.path(node), previous).into()))
        }

        fn notify(&mut self, node: NodeId, events: &Events) -> Result<()> {
            self.notified.push((node, events.clone()));
            if self.veto_at == Some(node) {
                return Err(PropError::Rejected {
                    path: self.path(node),
                    reason: "veto".into(),
                });
            }
            Ok(())
        }
    }

    #[test]
    fn test_new_navigator_is_at_source() {
        let (mut t, [root, ..]) = RecordingTree::sample();
        let nav = navigate(&mut t);
        assert_eq!(nav.depth(), 1);
        assert_eq!(nav.source(), root);
        assert_eq!(nav.current(), root);
        assert!(!nav.has_error());
        assert!(nav.error().is_none());
    }

    #[test]
    fn test_dot_is_case_insensitive() {
        let (mut t, [root, a, b, ..]) = RecordingTree::sample();
        let mut nav = navigate(&mut t);
        nav.dot("A").dot("b");
        assert!(!nav.has_error());
        assert_eq!(nav.depth(), 3);
        assert_eq!(nav.trace(), &[root, a, b]);
    }

    #[test]
    fn test_dot_missing_sets_invalid_path() {
        let (mut t, [root, a, ..]) = RecordingTree::sample();
        let mut nav = navigate(&mut t);
        nav.dot("a").dot("missing");
        assert_eq!(nav.depth(), 2);
        assert_eq!(nav.trace(), &[root, a]);
        assert_eq!(
            nav.error(),
            Some(&PropError::InvalidPath {
                name: "missing".into(),
                path: "a".into()
            })
        );
        assert!(nav.error().unwrap().is_invalid_path());
    }

    #[test]
    fn test_at_out_of_range_sets_no_target() {
        let (mut t, _) = RecordingTree::sample();
        let mut nav = navigate(&mut t);
        nav.dot("a").at(5);
        assert_eq!(nav.depth(), 2);
        let err = nav.error().unwrap();
        assert!(err.is_no_target());
        assert_eq!(err.to_string(), "no target: no target at index '5' from 'a'");
    }

    #[test]
    fn test_find_stops_at_first_match() {
        let (mut t, [_, a, b, c, d]) = RecordingTree::sample();
        let mut visited = Vec::new();
        let mut nav = navigate(&mut t);
        nav.find(|_, child| {
            visited.push(child);
            child == a || child == d
        });
        assert_eq!(nav.current(), a);
        assert_eq!(visited, vec![a]);

        let mut visited = Vec::new();
        nav.find(|tree, child| {
            visited.push(child);
            tree.path(child) == "c"
        });
        assert_eq!(nav.current(), c);
        assert_eq!(visited, vec![b, c]);
    }

    #[test]
    fn test_find_without_match_sets_no_target() {
        let (mut t, _) = RecordingTree::sample();
        let mut nav = navigate(&mut t);
        nav.find(|_, _| false);
        assert_eq!(nav.depth(), 1);
        assert_eq!(
            nav.error().map(ToString::to_string),
            Some("no target: no target meeting criteria from 'root'".to_string())
        );
    }

    #[test]
    fn test_retract() {
        let (mut t, [root, a, ..]) = RecordingTree::sample();
        let mut nav = navigate(&mut t);
        nav.retract();
        assert_eq!(nav.depth(), 1);
        assert_eq!(nav.current(), root);

        nav.dot("a").dot("b").retract();
        assert_eq!(nav.depth(), 2);
        assert_eq!(nav.current(), a);
        nav.retract().retract().retract();
        assert_eq!(nav.depth(), 1);
        assert_eq!(nav.source(), root);
    }

    #[test]
    fn test_retract_is_allowed_while_faulted() {
        let (mut t, [root, ..]) = RecordingTree::sample();
        let mut nav = navigate(&mut t);
        nav.dot("a").dot("missing");
        assert!(nav.has_error());
        nav.retract();
        assert_eq!(nav.depth(), 1);
        assert_eq!(nav.current(), root);
        assert!(nav.has_error());
    }

    #[test]
    fn test_faulted_navigator_is_inert() {
        let (mut t, [root, a, ..]) = RecordingTree::sample();
        let mut nav = navigate(&mut t);
        nav.dot("a").dot("missing");
        let err = nav.error().cloned();

        nav.dot("b").at(0).find(|_, _| true);
        nav.add(1).replace(2).delete();
        let mut calls = 0;
        let iterated = nav.for_each_child(|_, _, _| {
            calls += 1;
            Ok(())
        });

        assert_eq!(calls, 0);
        assert_eq!(iterated.err(), err);
        assert_eq!(nav.error().cloned(), err);
        assert_eq!(nav.trace(), &[root, a]);
        drop(nav);
        assert_eq!(t.mutations, 0);
        assert!(t.notified.is_empty());
    }

    #[test]
    fn test_clear_error_resumes_navigation() {
        let (mut t, [_, a, ..]) = RecordingTree::sample();
        let mut nav = navigate(&mut t);
        nav.dot("missing");
        nav.clear_error();
        assert!(!nav.has_error());
        nav.dot("a");
        assert!(!nav.has_error());
        assert_eq!(nav.current(), a);
    }

    #[test]
    fn test_replace_notifies_trace_leaf_to_root() {
        let (mut t, [root, a, b, ..]) = RecordingTree::sample();
        let mut nav = navigate(&mut t);
        nav.dot("a").dot("b").replace("x");
        assert!(!nav.has_error());
        drop(nav);

        assert_eq!(t.notified_nodes(), vec![b, a, root]);
        let first = &t.notified[0].1;
        assert_eq!(first.len(), 2);
        assert_eq!(first.as_slice()[0].value, json!("x"));
        assert_eq!(first.as_slice()[1].value, json!("derived"));
        assert!(t.notified.iter().all(|(_, events)| events == first));
    }

    #[test]
    fn test_no_event_means_no_notification() {
        let (mut t, _) = RecordingTree::sample();
        let mut nav = navigate(&mut t);
        nav.dot("a").delete();
        assert!(!nav.has_error());
        drop(nav);
        assert_eq!(t.mutations, 1);
        assert!(t.notified.is_empty());
    }

    #[test]
    fn test_veto_stops_propagation() {
        let (mut t, [_, a, b, ..]) = RecordingTree::sample();
        t.veto_at = Some(a);
        let mut nav = navigate(&mut t);
        nav.dot("a").dot("b").add("x");
        assert!(matches!(nav.error(), Some(PropError::Rejected { path, .. }) if path == "a"));
        assert_eq!(nav.depth(), 3);
        drop(nav);
        assert_eq!(t.notified_nodes(), vec![b, a]);
    }

    #[test]
    fn test_mutation_failure_is_stored_verbatim() {
        let (mut t, _) = RecordingTree::sample();
        t.fail_mutations = true;
        let mut nav = navigate(&mut t);
        nav.dot("d").replace(true);
        assert_eq!(
            nav.error(),
            Some(&PropError::InvalidValue("refused".into()))
        );
        nav.replace(false);
        drop(nav);
        assert_eq!(t.mutations, 1);
        assert!(t.notified.is_empty());
    }

    #[test]
    fn test_for_each_child_surfaces_callback_error() {
        let (mut t, [_, _, b, c, _]) = RecordingTree::sample();
        let mut nav = navigate(&mut t);
        nav.dot("a");

        let mut seen = Vec::new();
        nav.for_each_child(|_, i, child| {
            seen.push((i, child));
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, vec![(0, b), (1, c)]);

        let mut seen = Vec::new();
        let result = nav.for_each_child(|_, i, _| {
            seen.push(i);
            Err(PropError::InvalidValue("stop".into()))
        });
        assert_eq!(result, Err(PropError::InvalidValue("stop".into())));
        assert_eq!(seen, vec![0]);
        assert!(!nav.has_error());
    }

    #[test]
    fn test_into_result() {
        let (mut t, [_, a, ..]) = RecordingTree::sample();
        let mut nav = navigate(&mut t);
        nav.dot("a");
        assert_eq!(nav.into_result(), Ok(a));

        let mut nav = navigate(&mut t);
        nav.at(9);
        assert!(nav.into_result().unwrap_err().is_no_target());
    }

    #[test]
    fn test_navigator_from_inner_source() {
        let (mut t, [_, a, b, ..]) = RecordingTree::sample();
        let mut nav = Navigator::new(&mut t, a);
        nav.dot("b").replace(1);
        nav.retract().retract();
        assert_eq!(nav.source(), a);
        assert_eq!(nav.depth(), 1);
        drop(nav);
        assert_eq!(t.notified_nodes(), vec![b, a]);
    }
}
