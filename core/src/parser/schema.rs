//! Parser for arbitrary nested JSON driven by a `SchemaEntity` tree.
//!
//! # Design
//! The schema says, for every nesting level, which type to assign and which
//! keys hold related objects. Related objects are parsed recursively with
//! their own schema node, replaced on the parent by `{name}_id` or
//! `{name}_ids`, and collected into a `ParsedEntitySet` so that the same
//! `(type, id)` reached through several paths is included once.
//!
//! Relations are walked in declaration order. When several paths reach the
//! same `(type, id)`, the entity found last wins.
//!
//! Schemas are plain owned configuration. A node reused at several places
//! (every user has a `state`, so does every city) is simply cloned into
//! each position.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::error::ParseError;
use crate::mapper::AttributesMapper;
use crate::parser::entity_set::ParsedEntitySet;
use crate::parser::ids::IdPolicy;
use crate::parser::ResponseParser;
use crate::types::{Data, EntityAttributes, ParsedEntity, ParsedResponse, Serialization};

/// Describes one level of a nested response.
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaEntity {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub mapper: AttributesMapper,
    #[serde(default, deserialize_with = "relations_in_order")]
    pub relations: Vec<(String, SchemaEntity)>,
}

impl SchemaEntity {
    pub fn new(entity_type: impl Into<String>, mapper: AttributesMapper) -> Self {
        Self {
            entity_type: entity_type.into(),
            mapper,
            relations: Vec::new(),
        }
    }

    /// Declare that key `name` holds objects described by `schema`.
    ///
    /// Redeclaring a name moves it to the end.
    pub fn relation(mut self, name: impl Into<String>, schema: SchemaEntity) -> Self {
        push_relation(&mut self.relations, name.into(), schema);
        self
    }

    pub fn map(&self, serialization: &Serialization) -> Serialization {
        self.mapper.map(serialization)
    }
}

fn push_relation(relations: &mut Vec<(String, SchemaEntity)>, name: String, schema: SchemaEntity) {
    relations.retain(|(existing, _)| *existing != name);
    relations.push((name, schema));
}

/// Keeps relations in the order the deserializer yields their keys.
fn relations_in_order<'de, D>(deserializer: D) -> Result<Vec<(String, SchemaEntity)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct RelationsVisitor;

    impl<'de> Visitor<'de> for RelationsVisitor {
        type Value = Vec<(String, SchemaEntity)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of relation names to schemas")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut relations = Vec::new();
            while let Some((name, schema)) = map.next_entry::<String, SchemaEntity>()? {
                push_relation(&mut relations, name, schema);
            }
            Ok(relations)
        }
    }

    deserializer.deserialize_map(RelationsVisitor)
}

/// Configuration of a `SchemaParser`, loadable from JSON.
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaParserConfig {
    pub schema: SchemaEntity,
    #[serde(default)]
    pub data_key: Option<String>,
    #[serde(default)]
    pub meta_key: Option<String>,
    #[serde(flatten)]
    pub ids: IdPolicy,
}

#[derive(Debug, Clone)]
pub struct SchemaParser {
    schema: SchemaEntity,
    data_key: Option<String>,
    meta_key: Option<String>,
    ids: IdPolicy,
}

struct ParsedItem {
    data: ParsedEntity,
    included: ParsedEntitySet,
}

struct ParsedRelations {
    related: Serialization,
    included: ParsedEntitySet,
}

impl SchemaParser {
    pub fn new(schema: SchemaEntity) -> Self {
        Self {
            schema,
            data_key: None,
            meta_key: None,
            ids: IdPolicy::default(),
        }
    }

    pub fn from_config(config: SchemaParserConfig) -> Self {
        Self {
            schema: config.schema,
            data_key: config.data_key,
            meta_key: config.meta_key,
            ids: config.ids,
        }
    }

    /// Read the payload from `key` instead of the response root.
    pub fn with_data_key(mut self, key: impl Into<String>) -> Self {
        self.data_key = Some(key.into());
        self
    }

    /// Read metadata from `key` on the response root.
    pub fn with_meta_key(mut self, key: impl Into<String>) -> Self {
        self.meta_key = Some(key.into());
        self
    }

    pub fn with_id_policy(mut self, ids: IdPolicy) -> Self {
        self.ids = ids;
        self
    }

    fn response_data<'a>(&self, response: &'a Value) -> Result<&'a Value, ParseError> {
        match &self.data_key {
            None => Ok(response),
            Some(key) => response
                .get(key)
                .ok_or_else(|| ParseError::Malformed(format!("response has no '{key}' key"))),
        }
    }

    fn meta(&self, response: &Value) -> Option<Value> {
        let key = self.meta_key.as_ref()?;
        response.get(key).filter(|meta| !meta.is_null()).cloned()
    }

    fn parse_items(&self, items: &[Value], schema: &SchemaEntity) -> Result<(Vec<ParsedEntity>, ParsedEntitySet), ParseError> {
        let mut data = Vec::with_capacity(items.len());
        let mut included = ParsedEntitySet::new();

        for item in items {
            let parsed = self.parse_item(as_object(item, schema)?, schema)?;
            data.push(parsed.data);
            included.merge(parsed.included);
        }

        Ok((data, included))
    }

    fn parse_item(&self, raw: &Map<String, Value>, schema: &SchemaEntity) -> Result<ParsedItem, ParseError> {
        let ParsedRelations { related, included } = self.parse_relations(raw, schema)?;

        let mut serialization = raw.clone();
        serialization.extend(related);

        let mut attributes: EntityAttributes = schema.map(&serialization);
        let id = self.ids.resolve(&schema.entity_type, raw.get("id"))?;
        attributes.insert("id".to_string(), id);

        Ok(ParsedItem {
            data: ParsedEntity::new(schema.entity_type.clone(), attributes),
            included,
        })
    }

    fn parse_relations(&self, raw: &Map<String, Value>, schema: &SchemaEntity) -> Result<ParsedRelations, ParseError> {
        let mut result = ParsedRelations {
            related: Serialization::new(),
            included: ParsedEntitySet::new(),
        };

        for (name, child) in &schema.relations {
            let relation = match raw.get(name) {
                None => continue,
                Some(value) if is_absent(value) => continue,
                Some(Value::Array(items)) => self.parse_related_items(name, items, child)?,
                Some(item) => self.parse_related_item(name, as_object(item, child)?, child)?,
            };

            result.related.extend(relation.related);
            result.included.merge(relation.included);
        }

        Ok(result)
    }

    fn parse_related_items(&self, name: &str, items: &[Value], schema: &SchemaEntity) -> Result<ParsedRelations, ParseError> {
        let mut ids: Vec<Value> = Vec::with_capacity(items.len());
        let mut included = ParsedEntitySet::new();

        for item in items {
            let parsed = self.parse_item(as_object(item, schema)?, schema)?;
            let id = parsed.data.attributes["id"].clone();
            if !ids.contains(&id) {
                ids.push(id);
            }
            included.add(parsed.data).merge(parsed.included);
        }

        let mut related = Serialization::new();
        related.insert(format!("{name}_ids"), Value::Array(ids));
        Ok(ParsedRelations { related, included })
    }

    fn parse_related_item(&self, name: &str, item: &Map<String, Value>, schema: &SchemaEntity) -> Result<ParsedRelations, ParseError> {
        let ParsedItem { data, mut included } = self.parse_item(item, schema)?;

        let mut related = Serialization::new();
        related.insert(format!("{name}_id"), data.attributes["id"].clone());
        included.add(data);

        Ok(ParsedRelations { related, included })
    }
}

impl ResponseParser for SchemaParser {
    fn parse(&self, response: &Value) -> Result<ParsedResponse, ParseError> {
        let (data, included) = match self.response_data(response)? {
            Value::Array(items) => {
                let (data, included) = self.parse_items(items, &self.schema)?;
                (Data::Many(data), included)
            }
            item => {
                let parsed = self.parse_item(as_object(item, &self.schema)?, &self.schema)?;
                (Data::One(parsed.data), parsed.included)
            }
        };

        Ok(ParsedResponse {
            data,
            included: included.into_values(),
            meta: self.meta(response),
        })
    }
}

/// `null`, `false`, `0` and `""` stand for a missing relation.
fn is_absent(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(number) => number.as_f64() == Some(0.0),
        Value::String(text) => text.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

fn as_object<'a>(value: &'a Value, schema: &SchemaEntity) -> Result<&'a Map<String, Value>, ParseError> {
    value.as_object().ok_or_else(|| {
        ParseError::Malformed(format!(
            "expected an object for entity of type '{}', got {value}",
            schema.entity_type
        ))
    })
}
