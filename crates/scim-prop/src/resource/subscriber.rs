//! Observers attached to resource nodes.
//!
//! Subscribers run when a node is notified of changes committed at or below
//! it. They may adjust the tree, or refuse the change by returning an error,
//! which stops the notification from travelling further up. Adjustments made
//! by a subscriber are not themselves propagated.

use serde_json::Value;
use tracing::debug;

use super::Resource;
use crate::event::{EventKind, Events};
use crate::tree::PropertyTree;
use crate::types::{NodeId, Result};
use crate::util::{is_child, is_path_equal, join_path};

pub trait Subscriber {
    fn notify(&self, resource: &mut Resource, node: NodeId, events: &Events) -> Result<()>;
}

/// Drops elements of a multi-valued property once they become unassigned.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoCompact;

impl Subscriber for AutoCompact {
    fn notify(&self, resource: &mut Resource, node: NodeId, events: &Events) -> Result<()> {
        let path = resource.path(node);
        let relevant = events
            .iter()
            .any(|e| e.kind == EventKind::Unassigned && events_touch(&path, &e.path));
        if !relevant {
            return Ok(());
        }
        let removed = resource.compact(node);
        if removed > 0 {
            debug!(path = %path, removed, "compacted unassigned elements");
        }
        Ok(())
    }
}

/// Keeps at most one element of a multi-valued complex property marked
/// `primary`. The most recently assigned one wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExclusivePrimary;

impl Subscriber for ExclusivePrimary {
    fn notify(&self, resource: &mut Resource, node: NodeId, events: &Events) -> Result<()> {
        let primary_path = join_path(&resource.path(node), "primary");
        let Some(winner) = events
            .at_path(&primary_path)
            .filter(|e| e.kind == EventKind::Assigned && e.value == Value::Bool(true))
            .map(|e| e.source)
            .last()
        else {
            return Ok(());
        };

        for element in resource.children(node).to_vec() {
            let Ok(flag) = resource.child_by_name(element, "primary") else {
                continue;
            };
            if flag != winner && resource.raw(flag) == Value::Bool(true) {
                debug!(path = %primary_path, element = %element, "clearing superseded primary");
                resource.replace(flag, Value::Bool(false))?;
            }
        }
        Ok(())
    }
}

/// Adapts a closure into a [`Subscriber`].
pub struct FnSubscriber<F>(pub F);

impl<F> Subscriber for FnSubscriber<F>
where
    F: Fn(&mut Resource, NodeId, &Events) -> Result<()>,
{
    fn notify(&self, resource: &mut Resource, node: NodeId, events: &Events) -> Result<()> {
        (self.0)(resource, node, events)
    }
}

fn events_touch(path: &str, event_path: &str) -> bool {
    is_path_equal(path, event_path) || is_child(path, event_path)
}
