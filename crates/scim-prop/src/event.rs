//! Change events produced by property mutations.

use serde_json::Value;

use crate::types::NodeId;
use crate::util::is_path_equal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A value was set or changed.
    Assigned,
    /// A value was cleared.
    Unassigned,
}

/// An atomic change to a single property.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    pub source: NodeId,
    /// Attribute path of the source property.
    pub path: String,
    /// New value for assignments, previous value for unassignments.
    pub value: Value,
}

impl Event {
    pub fn assigned(source: NodeId, path: impl Into<String>, value: Value) -> Self {
        Event {
            kind: EventKind::Assigned,
            source,
            path: path.into(),
            value,
        }
    }

    pub fn unassigned(source: NodeId, path: impl Into<String>, previous: Value) -> Self {
        Event {
            kind: EventKind::Unassigned,
            source,
            path: path.into(),
            value: previous,
        }
    }
}

/// Result of one mutation. May group several atomic changes, e.g. replacing a
/// collection both removes the old elements and adds the new ones.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    Atomic(Event),
    Composite(Vec<ChangeEvent>),
}

impl ChangeEvent {
    /// Groups child results, dropping absent ones. Returns `None` when nothing
    /// changed.
    pub fn compose(parts: impl IntoIterator<Item = Option<ChangeEvent>>) -> Option<ChangeEvent> {
        let parts: Vec<ChangeEvent> = parts.into_iter().flatten().collect();
        match parts.len() {
            0 => None,
            1 => parts.into_iter().next(),
            _ => Some(ChangeEvent::Composite(parts)),
        }
    }

    /// Flattens into the ordered sequence of atomic events, depth first.
    pub fn to_events(&self) -> Events {
        let mut out = Events::default();
        self.collect_into(&mut out.0);
        out
    }

    fn collect_into(&self, out: &mut Vec<Event>) {
        match self {
            ChangeEvent::Atomic(event) => out.push(event.clone()),
            ChangeEvent::Composite(parts) => {
                for part in parts {
                    part.collect_into(out);
                }
            }
        }
    }
}

impl From<Event> for ChangeEvent {
    fn from(event: Event) -> Self {
        ChangeEvent::Atomic(event)
    }
}

/// Ordered sequence of atomic events delivered to each ancestor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Events(Vec<Event>);

impl Events {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Event] {
        &self.0
    }

    /// Events whose source path equals `path` (ignoring case).
    pub fn at_path<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a Event> + 'a {
        self.0.iter().filter(move |e| is_path_equal(&e.path, path))
    }
}

impl From<Vec<Event>> for Events {
    fn from(events: Vec<Event>) -> Self {
        Events(events)
    }
}

impl<'a> IntoIterator for &'a Events {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
