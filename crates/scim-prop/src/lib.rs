//! Attribute-typed property trees and a navigator to traverse them.
//!
//! A [`Resource`] is an arena of properties shaped by an [`Attribute`] schema:
//! simple values, complex objects and multi-valued collections. The
//! [`Navigator`] walks such a tree through the [`PropertyTree`] capability,
//! remembers the path it took, and replays the change events of every
//! mutation to each node on that path, most specific first.
//!
//! # Example
//!
//! ```
//! use scim_prop::{navigate, Attribute, PropertyTree, Resource};
//! use serde_json::json;
//!
//! let schema = Attribute::from_json(r#"{
//!     "name": "User", "type": "complex", "subAttributes": [
//!         {"name": "userName", "type": "string"},
//!         {"name": "name", "type": "complex", "subAttributes": [
//!             {"name": "givenName", "type": "string"}
//!         ]}
//!     ]
//! }"#).unwrap();
//! let mut user = Resource::new(schema).unwrap();
//!
//! let mut nav = navigate(&mut user);
//! nav.dot("userName").replace("bjensen").retract();
//! nav.dot("name").dot("givenName").replace("Barbara");
//! assert!(!nav.has_error());
//!
//! assert_eq!(
//!     user.raw(user.root()),
//!     json!({"userName": "bjensen", "name": {"givenName": "Barbara"}})
//! );
//! ```

use thiserror::Error;

pub mod attribute;
pub mod event;
pub mod navigator;
pub mod resource;
pub mod tree;
pub mod types;
pub mod util;

pub use attribute::{Attribute, AttributeKind};
pub use event::{ChangeEvent, Event, EventKind, Events};
pub use navigator::{navigate, Navigator};
pub use resource::{AutoCompact, ExclusivePrimary, FnSubscriber, Resource, Subscriber};
pub use tree::PropertyTree;
pub use types::{NodeId, Result};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PropError {
    /// A named child could not be resolved.
    #[error("invalid path: no attribute named '{name}' from '{path}'")]
    InvalidPath { name: String, path: String },
    /// An indexed or predicate lookup found nothing.
    #[error("no target: no target {target} from '{path}'")]
    NoTarget { target: String, path: String },
    #[error("invalid value: {0}")]
    InvalidValue(String),
    /// A node refused a change during notification.
    #[error("rejected by '{path}': {reason}")]
    Rejected { path: String, reason: String },
    #[error("invalid schema: {0}")]
    Schema(String),
    /// The tree has no node handles left to allocate.
    #[error("capacity exceeded: {0}")]
    Capacity(String),
}

impl PropError {
    pub fn is_invalid_path(&self) -> bool {
        matches!(self, PropError::InvalidPath { .. })
    }

    pub fn is_no_target(&self) -> bool {
        matches!(self, PropError::NoTarget { .. })
    }
}
