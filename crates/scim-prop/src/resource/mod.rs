//! Arena-backed property tree.
//!
//! Every property lives in a `Vec` owned by the [`Resource`] and is addressed
//! by its [`NodeId`]. Three node shapes exist:
//!
//! - simple: holds one optional JSON value of the attribute's type,
//! - complex: ordered children, one per sub-attribute,
//! - multi-valued: ordered elements, created as values are added.
//!
//! Incoming values are checked against the schema before anything is
//! touched, so a rejected `add` or `replace` leaves the tree as it was.
//! Elements dropped from a collection return their slots to a free list,
//! and their handles may be handed out again to later elements.

mod subscriber;

use std::rc::Rc;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::trace;

use crate::attribute::{Attribute, AttributeKind};
use crate::event::{ChangeEvent, Event, Events};
use crate::tree::PropertyTree;
use crate::types::{NodeId, Result};
use crate::util::names_equal;
use crate::PropError;

pub use subscriber::{AutoCompact, ExclusivePrimary, FnSubscriber, Subscriber};

#[derive(Debug)]
enum Slot {
    Simple(Option<Value>),
    Complex(Vec<NodeId>),
    Multi {
        element: Arc<Attribute>,
        items: Vec<NodeId>,
    },
}

struct PropertyNode {
    attribute: Arc<Attribute>,
    slot: Slot,
    subscribers: Vec<Rc<dyn Subscriber>>,
}

pub struct Resource {
    nodes: Vec<PropertyNode>,
    free: Vec<NodeId>,
    root: NodeId,
}

impl Resource {
    /// Builds an empty tree shaped by `attribute`. Multi-valued properties get
    /// an [`AutoCompact`] subscriber, and an [`ExclusivePrimary`] one when
    /// their elements carry a boolean `primary`.
    ///
    /// Fails with [`PropError::Capacity`] when the schema needs more nodes
    /// than a [`NodeId`] can address.
    pub fn new(attribute: Arc<Attribute>) -> Result<Self> {
        let mut resource = Resource {
            nodes: Vec::new(),
            free: Vec::new(),
            root: NodeId(0),
        };
        resource.root = resource.alloc(attribute)?;
        Ok(resource)
    }

    fn alloc(&mut self, attribute: Arc<Attribute>) -> Result<NodeId> {
        let mut subscribers: Vec<Rc<dyn Subscriber>> = Vec::new();
        let slot = if attribute.multi_valued {
            subscribers.push(Rc::new(AutoCompact));
            if attribute.has_primary() {
                subscribers.push(Rc::new(ExclusivePrimary));
            }
            Slot::Multi {
                element: Arc::new(attribute.element()),
                items: Vec::new(),
            }
        } else if attribute.kind == AttributeKind::Complex {
            Slot::Complex(Vec::new())
        } else {
            Slot::Simple(None)
        };
        let node = PropertyNode {
            attribute: attribute.clone(),
            slot,
            subscribers,
        };

        let id = match self.free.pop() {
            Some(id) => {
                self.nodes[id.index()] = node;
                id
            }
            None => {
                let id = NodeId::try_from(self.nodes.len()).map_err(|_| {
                    PropError::Capacity(format!("no node left for '{}'", attribute.path))
                })?;
                self.nodes.push(node);
                id
            }
        };

        if matches!(self.nodes[id.index()].slot, Slot::Complex(_)) {
            let mut children = Vec::with_capacity(attribute.sub_attributes.len());
            for sub in &attribute.sub_attributes {
                children.push(self.alloc(sub.clone())?);
            }
            self.nodes[id.index()].slot = Slot::Complex(children);
        }
        Ok(id)
    }

    /// Returns a detached subtree to the free list.
    fn release(&mut self, node: NodeId) {
        let mut pending = vec![node];
        while let Some(id) = pending.pop() {
            let entry = &mut self.nodes[id.index()];
            match std::mem::replace(&mut entry.slot, Slot::Simple(None)) {
                Slot::Complex(children) | Slot::Multi { items: children, .. } => {
                    pending.extend(children)
                }
                Slot::Simple(_) => {}
            }
            entry.subscribers.clear();
            self.free.push(id);
        }
    }

    pub fn attribute(&self, node: NodeId) -> &Arc<Attribute> {
        &self.nodes[node.index()].attribute
    }

    /// Children of a complex node or elements of a multi-valued one.
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        match &self.nodes[node.index()].slot {
            Slot::Simple(_) => &[],
            Slot::Complex(children) => children.as_slice(),
            Slot::Multi { items, .. } => items.as_slice(),
        }
    }

    pub fn len(&self, node: NodeId) -> usize {
        self.children(node).len()
    }

    /// Number of nodes currently in use across the whole tree.
    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    pub fn is_unassigned(&self, node: NodeId) -> bool {
        match &self.nodes[node.index()].slot {
            Slot::Simple(value) => value.is_none(),
            Slot::Complex(children) => children.iter().all(|c| self.is_unassigned(*c)),
            Slot::Multi { items, .. } => items.iter().all(|c| self.is_unassigned(*c)),
        }
    }

    /// JSON rendering of `node`. Unassigned properties are left out of
    /// objects and arrays and render as `null` on their own.
    pub fn raw(&self, node: NodeId) -> Value {
        match &self.nodes[node.index()].slot {
            Slot::Simple(value) => value.clone().unwrap_or(Value::Null),
            Slot::Complex(children) => {
                let mut map = Map::new();
                for child in children {
                    if !self.is_unassigned(*child) {
                        map.insert(self.attribute(*child).name.clone(), self.raw(*child));
                    }
                }
                if map.is_empty() {
                    Value::Null
                } else {
                    Value::Object(map)
                }
            }
            Slot::Multi { items, .. } => {
                let values: Vec<Value> = items
                    .iter()
                    .filter(|c| !self.is_unassigned(**c))
                    .map(|c| self.raw(*c))
                    .collect();
                if values.is_empty() {
                    Value::Null
                } else {
                    Value::Array(values)
                }
            }
        }
    }

    /// Registers `subscriber` to run whenever `node` is notified.
    pub fn subscribe(&mut self, node: NodeId, subscriber: impl Subscriber + 'static) {
        self.nodes[node.index()].subscribers.push(Rc::new(subscriber));
    }

    /// Detaches unassigned elements of a multi-valued node. Returns how many
    /// were removed.
    pub fn compact(&mut self, node: NodeId) -> usize {
        let items = match &self.nodes[node.index()].slot {
            Slot::Multi { items, .. } => items.clone(),
            _ => return 0,
        };
        let (kept, dropped): (Vec<NodeId>, Vec<NodeId>) =
            items.iter().copied().partition(|c| !self.is_unassigned(*c));
        if let Slot::Multi { items, .. } = &mut self.nodes[node.index()].slot {
            *items = kept;
        }
        for element in &dropped {
            self.release(*element);
        }
        dropped.len()
    }

    /// Dispatches an already checked value by node shape.
    fn add_value(&mut self, node: NodeId, value: Value) -> Result<Option<ChangeEvent>> {
        match &self.nodes[node.index()].slot {
            Slot::Simple(_) => self.simple_replace(node, value),
            Slot::Complex(_) => self.complex_add(node, value),
            Slot::Multi { .. } => self.multi_add(node, value),
        }
    }

    fn replace_value(&mut self, node: NodeId, value: Value) -> Result<Option<ChangeEvent>> {
        match &self.nodes[node.index()].slot {
            Slot::Simple(_) => self.simple_replace(node, value),
            Slot::Complex(_) => self.complex_replace(node, value),
            Slot::Multi { .. } => self.multi_replace(node, value),
        }
    }

    fn simple_replace(&mut self, node: NodeId, value: Value) -> Result<Option<ChangeEvent>> {
        if value.is_null() {
            return self.simple_delete(node);
        }
        let attribute = self.attribute(node).clone();
        let Slot::Simple(slot) = &mut self.nodes[node.index()].slot else {
            return Ok(None);
        };
        if slot
            .as_ref()
            .is_some_and(|current| attribute.value_equals(current, &value))
        {
            return Ok(None);
        }
        *slot = Some(value.clone());
        Ok(Some(Event::assigned(node, attribute.path.clone(), value).into()))
    }

    fn simple_delete(&mut self, node: NodeId) -> Result<Option<ChangeEvent>> {
        let path = self.attribute(node).path.clone();
        let Slot::Simple(slot) = &mut self.nodes[node.index()].slot else {
            return Ok(None);
        };
        Ok(slot
            .take()
            .map(|previous| Event::unassigned(node, path, previous).into()))
    }

    fn complex_add(&mut self, node: NodeId, value: Value) -> Result<Option<ChangeEvent>> {
        let map = match value {
            Value::Null => return Ok(None),
            Value::Object(map) => map,
            other => return Err(self.attribute(node).type_error(&other)),
        };
        let mut targets = Vec::with_capacity(map.len());
        for (name, member) in map {
            targets.push((self.child_by_name(node, &name)?, member));
        }
        let mut parts = Vec::with_capacity(targets.len());
        for (child, member) in targets {
            parts.push(self.add_value(child, member)?);
        }
        Ok(ChangeEvent::compose(parts))
    }

    fn complex_replace(&mut self, node: NodeId, value: Value) -> Result<Option<ChangeEvent>> {
        if value.is_null() {
            return self.clear(node);
        }
        if self.attribute(node).value_equals(&self.raw(node), &value) {
            return Ok(None);
        }
        let cleared = self.clear(node)?;
        let added = self.complex_add(node, value)?;
        Ok(ChangeEvent::compose([cleared, added]))
    }

    fn multi_add(&mut self, node: NodeId, value: Value) -> Result<Option<ChangeEvent>> {
        match value {
            Value::Null => Ok(None),
            Value::Array(values) => {
                let mut parts = Vec::with_capacity(values.len());
                for item in values {
                    parts.push(self.multi_push(node, item)?);
                }
                Ok(ChangeEvent::compose(parts))
            }
            item => self.multi_push(node, item),
        }
    }

    /// Appends one element. Values equal to an existing element are skipped,
    /// and so are values that assign nothing.
    fn multi_push(&mut self, node: NodeId, item: Value) -> Result<Option<ChangeEvent>> {
        let element = match &self.nodes[node.index()].slot {
            Slot::Multi { element, .. } => element.clone(),
            _ => return Ok(None),
        };
        if item.is_null()
            || self
                .children(node)
                .iter()
                .any(|c| element.value_equals(&self.raw(*c), &item))
        {
            return Ok(None);
        }
        let child = self.alloc(element)?;
        let event = self.add_value(child, item)?;
        match event {
            Some(_) => {
                if let Slot::Multi { items, .. } = &mut self.nodes[node.index()].slot {
                    items.push(child);
                }
            }
            None => self.release(child),
        }
        Ok(event)
    }

    fn multi_replace(&mut self, node: NodeId, value: Value) -> Result<Option<ChangeEvent>> {
        let wanted = match value {
            Value::Null => return self.clear(node),
            Value::Array(values) => Value::Array(values),
            item => Value::Array(vec![item]),
        };
        if self.attribute(node).value_equals(&self.raw(node), &wanted) {
            return Ok(None);
        }
        let cleared = self.clear(node)?;
        let added = self.multi_add(node, wanted)?;
        Ok(ChangeEvent::compose([cleared, added]))
    }

    /// Unassigns every leaf under `node`; multi-valued nodes lose their
    /// elements, which go back to the free list.
    fn clear(&mut self, node: NodeId) -> Result<Option<ChangeEvent>> {
        let children = self.children(node).to_vec();
        let mut parts = Vec::with_capacity(children.len());
        for child in children {
            parts.push(self.delete(child)?);
        }
        let detached = match &mut self.nodes[node.index()].slot {
            Slot::Multi { items, .. } => std::mem::take(items),
            _ => Vec::new(),
        };
        for element in detached {
            self.release(element);
        }
        Ok(ChangeEvent::compose(parts))
    }
}

impl PropertyTree for Resource {
    fn root(&self) -> NodeId {
        self.root
    }

    fn path(&self, node: NodeId) -> String {
        self.attribute(node).path.clone()
    }

    fn child_by_name(&self, node: NodeId, name: &str) -> Result<NodeId> {
        let found = match &self.nodes[node.index()].slot {
            Slot::Complex(children) => children
                .iter()
                .copied()
                .find(|c| names_equal(&self.attribute(*c).name, name)),
            _ => None,
        };
        found.ok_or_else(|| PropError::InvalidPath {
            name: name.to_string(),
            path: self.path(node),
        })
    }

    fn child_at_index(&self, node: NodeId, index: usize) -> Result<NodeId> {
        self.children(node)
            .get(index)
            .copied()
            .ok_or_else(|| PropError::NoTarget {
                target: format!("at index '{index}'"),
                path: self.path(node),
            })
    }

    fn find_child(&self, node: NodeId, criteria: &mut dyn FnMut(NodeId) -> bool) -> Option<NodeId> {
        self.children(node).iter().copied().find(|c| criteria(*c))
    }

    fn for_each_child(
        &self,
        node: NodeId,
        callback: &mut dyn FnMut(usize, NodeId) -> Result<()>,
    ) -> Result<()> {
        for (index, child) in self.children(node).iter().enumerate() {
            callback(index, *child)?;
        }
        Ok(())
    }

    fn add(&mut self, node: NodeId, value: Value) -> Result<Option<ChangeEvent>> {
        self.attribute(node).check(&value)?;
        self.add_value(node, value)
    }

    fn replace(&mut self, node: NodeId, value: Value) -> Result<Option<ChangeEvent>> {
        self.attribute(node).check(&value)?;
        self.replace_value(node, value)
    }

    fn delete(&mut self, node: NodeId) -> Result<Option<ChangeEvent>> {
        match &self.nodes[node.index()].slot {
            Slot::Simple(_) => self.simple_delete(node),
            _ => self.clear(node),
        }
    }

    fn notify(&mut self, node: NodeId, events: &Events) -> Result<()> {
        let subscribers = self.nodes[node.index()].subscribers.clone();
        trace!(
            path = %self.attribute(node).path,
            events = events.len(),
            subscribers = subscribers.len(),
            "notify"
        );
        for subscriber in subscribers {
            subscriber.notify(self, node, events)?;
        }
        Ok(())
    }
}
