//! Attribute metadata describing the shape of a property tree.
//!
//! Attributes are loaded from SCIM-style schema documents:
//!
//! ```
//! use scim_prop::{Attribute, AttributeKind};
//!
//! let attr = Attribute::from_json(r#"{
//!     "name": "User",
//!     "type": "complex",
//!     "subAttributes": [
//!         {"name": "userName", "type": "string"},
//!         {"name": "emails", "type": "complex", "multiValued": true, "subAttributes": [
//!             {"name": "value", "type": "string"}
//!         ]}
//!     ]
//! }"#).unwrap();
//!
//! let emails = attr.sub_attribute("EMAILS").unwrap();
//! assert!(emails.multi_valued);
//! assert_eq!(emails.sub_attribute("value").unwrap().path, "emails.value");
//! assert_eq!(emails.kind, AttributeKind::Complex);
//! ```

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::util::{join_path, names_equal};
use crate::{PropError, Result};

/// Data type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttributeKind {
    String,
    Integer,
    Decimal,
    Boolean,
    DateTime,
    Reference,
    Binary,
    Complex,
}

impl AttributeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Decimal => "decimal",
            Self::Boolean => "boolean",
            Self::DateTime => "dateTime",
            Self::Reference => "reference",
            Self::Binary => "binary",
            Self::Complex => "complex",
        }
    }

    /// Whether a non-null JSON value fits this type.
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String | Self::DateTime | Self::Reference | Self::Binary => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Decimal => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Complex => value.is_object(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttributeDef {
    name: String,
    #[serde(rename = "type")]
    kind: AttributeKind,
    #[serde(default)]
    multi_valued: bool,
    #[serde(default)]
    case_exact: bool,
    #[serde(default)]
    sub_attributes: Vec<AttributeDef>,
}

/// Schema metadata for one property.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub kind: AttributeKind,
    pub multi_valued: bool,
    pub case_exact: bool,
    /// Dotted path from the root attribute. Empty for the root itself.
    pub path: String,
    pub sub_attributes: Vec<Arc<Attribute>>,
}

impl Attribute {
    /// Loads a root attribute from a JSON schema document.
    pub fn from_json(json: &str) -> Result<Arc<Attribute>> {
        let def: AttributeDef =
            serde_json::from_str(json).map_err(|e| PropError::Schema(e.to_string()))?;
        Ok(Arc::new(Self::build(def, None)?))
    }

    /// Loads a root attribute from an already parsed JSON value.
    pub fn from_value(value: Value) -> Result<Arc<Attribute>> {
        let def: AttributeDef =
            serde_json::from_value(value).map_err(|e| PropError::Schema(e.to_string()))?;
        Ok(Arc::new(Self::build(def, None)?))
    }

    fn build(def: AttributeDef, parent: Option<&str>) -> Result<Attribute> {
        if def.name.is_empty() {
            return Err(PropError::Schema("attribute name must not be empty".into()));
        }
        let path = match parent {
            None => String::new(),
            Some(parent) => join_path(parent, &def.name),
        };
        if def.kind == AttributeKind::Complex && def.sub_attributes.is_empty() {
            return Err(PropError::Schema(format!(
                "complex attribute '{}' declares no sub-attributes",
                def.name
            )));
        }
        if def.kind != AttributeKind::Complex && !def.sub_attributes.is_empty() {
            return Err(PropError::Schema(format!(
                "{} attribute '{}' cannot declare sub-attributes",
                def.kind.as_str(),
                def.name
            )));
        }

        let mut sub_attributes: Vec<Arc<Attribute>> = Vec::with_capacity(def.sub_attributes.len());
        for sub in def.sub_attributes {
            if sub_attributes.iter().any(|a| names_equal(&a.name, &sub.name)) {
                return Err(PropError::Schema(format!(
                    "duplicate sub-attribute '{}' in '{}'",
                    sub.name, def.name
                )));
            }
            sub_attributes.push(Arc::new(Self::build(sub, Some(&path))?));
        }

        Ok(Attribute {
            name: def.name,
            kind: def.kind,
            multi_valued: def.multi_valued,
            case_exact: def.case_exact,
            path,
            sub_attributes,
        })
    }

    /// Finds a direct sub-attribute by name, ignoring case.
    pub fn sub_attribute(&self, name: &str) -> Option<&Arc<Attribute>> {
        self.sub_attributes.iter().find(|a| names_equal(&a.name, name))
    }

    /// Derives the attribute of a single element of this multi-valued attribute.
    pub fn element(&self) -> Attribute {
        Attribute {
            multi_valued: false,
            ..self.clone()
        }
    }

    /// Whether elements of this attribute carry a boolean `primary` flag.
    pub fn has_primary(&self) -> bool {
        self.kind == AttributeKind::Complex
            && self
                .sub_attribute("primary")
                .is_some_and(|a| a.kind == AttributeKind::Boolean && !a.multi_valued)
    }

    /// Checks that `value` could be stored under this attribute, without
    /// touching any tree. Member names of complex values must resolve and
    /// every nested value must fit its sub-attribute's type. `null` is
    /// accepted anywhere.
    ///
    /// # Example
    ///
    /// ```
    /// use scim_prop::Attribute;
    /// use serde_json::json;
    ///
    /// let attr = Attribute::from_value(json!({
    ///     "name": "emails", "type": "complex", "multiValued": true, "subAttributes": [
    ///         {"name": "value", "type": "string"}
    ///     ]
    /// })).unwrap();
    ///
    /// assert!(attr.check(&json!([{"value": "a@x.com"}, null])).is_ok());
    /// assert!(attr.check(&json!([{"value": 1}])).is_err());
    /// assert!(attr.check(&json!({"display": "x"})).unwrap_err().is_invalid_path());
    /// ```
    pub fn check(&self, value: &Value) -> Result<()> {
        match value {
            Value::Array(items) if self.multi_valued => {
                items.iter().try_for_each(|item| self.check_element(item))
            }
            _ => self.check_element(value),
        }
    }

    fn check_element(&self, value: &Value) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }
        if !self.kind.accepts(value) {
            return Err(self.type_error(value));
        }
        if let Value::Object(members) = value {
            for (name, member) in members {
                let sub = self
                    .sub_attribute(name)
                    .ok_or_else(|| PropError::InvalidPath {
                        name: name.clone(),
                        path: self.path.clone(),
                    })?;
                sub.check(member)?;
            }
        }
        Ok(())
    }

    pub(crate) fn type_error(&self, value: &Value) -> PropError {
        PropError::InvalidValue(format!(
            "'{}' expects a {} value, got {}",
            self.path,
            self.kind.as_str(),
            value
        ))
    }

    /// Compares two values stored under this attribute.
    ///
    /// Strings of string and reference attributes that are not `caseExact`
    /// compare without regard to case. Complex members are matched by name
    /// ignoring case, and a missing member equals `null`.
    pub fn value_equals(&self, a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Array(x), Value::Array(y)) if self.multi_valued => {
                x.len() == y.len() && x.iter().zip(y).all(|(x, y)| self.element_equals(x, y))
            }
            _ => self.element_equals(a, b),
        }
    }

    fn element_equals(&self, a: &Value, b: &Value) -> bool {
        match (self.kind, a, b) {
            (AttributeKind::Complex, Value::Object(x), Value::Object(y)) => {
                self.sub_attributes.iter().all(|sub| {
                    sub.value_equals(member(x, &sub.name), member(y, &sub.name))
                })
            }
            (AttributeKind::String | AttributeKind::Reference, Value::String(x), Value::String(y))
                if !self.case_exact =>
            {
                x.to_lowercase() == y.to_lowercase()
            }
            _ => a == b,
        }
    }
}

static NULL: Value = Value::Null;

fn member<'a>(members: &'a Map<String, Value>, name: &str) -> &'a Value {
    members
        .iter()
        .find(|(key, _)| names_equal(key, name))
        .map_or(&NULL, |(_, value)| value)
}
