//! Attribute remapping applied to every parsed entity.
//!
//! A mapper is either a key-to-key dictionary (rename and allow-list) or an
//! arbitrary transform function. Dictionary mappers can be loaded from
//! configuration; function mappers only exist in code.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::types::Serialization;

/// Signature of a function mapper.
pub type MapperFn = dyn Fn(&Serialization) -> Serialization + Send + Sync;

/// How the raw attribute bag of one entity type becomes its entity bag.
#[derive(Clone)]
pub enum AttributesMapper {
    /// `source key -> target key`. Keys missing from the dictionary are
    /// dropped from the result.
    Dictionary(BTreeMap<String, String>),
    /// Receives the full bag (relationship ids included) and returns the
    /// result verbatim.
    Function(Arc<MapperFn>),
}

impl AttributesMapper {
    pub fn dictionary<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        AttributesMapper::Dictionary(
            pairs
                .into_iter()
                .map(|(source, target)| (source.into(), target.into()))
                .collect(),
        )
    }

    pub fn function<F>(transform: F) -> Self
    where
        F: Fn(&Serialization) -> Serialization + Send + Sync + 'static,
    {
        AttributesMapper::Function(Arc::new(transform))
    }

    pub fn map(&self, serialization: &Serialization) -> Serialization {
        map_attributes(self, serialization)
    }
}

/// Apply `mapper` to `serialization`.
///
/// A dictionary slot whose source key is absent is filled with `null`.
pub fn map_attributes(mapper: &AttributesMapper, serialization: &Serialization) -> Serialization {
    match mapper {
        AttributesMapper::Function(transform) => transform(serialization),
        AttributesMapper::Dictionary(pairs) => pairs
            .iter()
            .map(|(source, target)| {
                let value = serialization.get(source).cloned().unwrap_or(Value::Null);
                (target.clone(), value)
            })
            .collect(),
    }
}

impl fmt::Debug for AttributesMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributesMapper::Dictionary(pairs) => f.debug_tuple("Dictionary").field(pairs).finish(),
            AttributesMapper::Function(_) => f.write_str("Function(..)"),
        }
    }
}

impl<'de> Deserialize<'de> for AttributesMapper {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        BTreeMap::<String, String>::deserialize(deserializer).map(AttributesMapper::Dictionary)
    }
}

impl Serialize for AttributesMapper {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            AttributesMapper::Dictionary(pairs) => pairs.serialize(serializer),
            AttributesMapper::Function(_) => Err(serde::ser::Error::custom(
                "function mappers cannot be serialized",
            )),
        }
    }
}
