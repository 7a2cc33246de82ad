//! Normalized entity representation shared by parsers and creators.
//!
//! # Design
//! Parsers turn wire payloads into `ParsedEntity` values: a type name plus a
//! flat attribute bag that always carries an `id`. Attribute bags stay as
//! `serde_json::Map` because their shape is decided by caller-supplied
//! mappers, not by this crate. `Data<T>` models the "one or many" payload
//! slot used both for parsed entities and for the objects stores create.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A flat key-value bag as it arrives from (or goes to) the wire.
pub type Serialization = Map<String, Value>;

/// Attribute bag of a parsed entity. Contains `id` once parsing completes.
pub type EntityAttributes = Map<String, Value>;

/// Query parameters for a request. Nested objects and arrays are encoded
/// with bracket notation.
pub type Params = Map<String, Value>;

/// Identifier of a resource, numeric or string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    Int(i64),
    Str(String),
}

impl EntityId {
    /// True for the empty string id, which resolves to the collection path.
    pub fn is_empty(&self) -> bool {
        matches!(self, EntityId::Str(s) if s.is_empty())
    }

    pub fn into_value(self) -> Value {
        match self {
            EntityId::Int(n) => Value::from(n),
            EntityId::Str(s) => Value::String(s),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Int(n) => write!(f, "{n}"),
            EntityId::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for EntityId {
    fn from(id: i64) -> Self {
        EntityId::Int(id)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        EntityId::Str(id.to_string())
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        EntityId::Str(id)
    }
}

/// A single normalized entity: its type and its mapped attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedEntity {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub attributes: EntityAttributes,
}

impl ParsedEntity {
    pub fn new(entity_type: impl Into<String>, attributes: EntityAttributes) -> Self {
        Self {
            entity_type: entity_type.into(),
            attributes,
        }
    }

    pub fn id(&self) -> Option<&Value> {
        self.attributes.get("id")
    }
}

/// Either a single item or a list of items.
///
/// Serializes untagged, so a `One` looks like the bare item and a `Many`
/// like a JSON array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Data<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> Data<T> {
    pub fn as_one(&self) -> Option<&T> {
        match self {
            Data::One(item) => Some(item),
            Data::Many(_) => None,
        }
    }

    pub fn as_many(&self) -> Option<&[T]> {
        match self {
            Data::One(_) => None,
            Data::Many(items) => Some(items),
        }
    }

    pub fn into_one(self) -> Option<T> {
        match self {
            Data::One(item) => Some(item),
            Data::Many(_) => None,
        }
    }

    pub fn into_many(self) -> Option<Vec<T>> {
        match self {
            Data::One(_) => None,
            Data::Many(items) => Some(items),
        }
    }
}

/// Output of a `ResponseParser`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedResponse {
    pub data: Data<ParsedEntity>,
    #[serde(default)]
    pub included: Vec<ParsedEntity>,
    #[serde(default)]
    pub meta: Option<Value>,
}
