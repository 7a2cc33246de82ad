//! Parser for JSON:API documents.
//!
//! # Design
//! Relationships only carry sibling identifiers here, so they flatten to
//! `{name}_id` / `{name}_ids` attributes without recursion. Full related
//! objects arrive in the document's `included` array and go through the
//! same per-type mapper lookup. The server is trusted to have
//! de-duplicated `included` already.

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;
use serde_json::Value;

use crate::error::ParseError;
use crate::mapper::AttributesMapper;
use crate::parser::ids::IdPolicy;
use crate::parser::ResponseParser;
use crate::types::{Data, ParsedEntity, ParsedResponse, Serialization};

/// Top-level JSON:API document.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonApiDocument {
    pub data: Data<ResourceObject>,
    #[serde(default)]
    pub included: Option<Vec<ResourceObject>>,
    #[serde(default)]
    pub meta: Option<Value>,
}

/// A JSON:API resource object.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceObject {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub attributes: Option<Serialization>,
    #[serde(default)]
    pub relationships: Option<BTreeMap<String, Relationship>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Relationship {
    #[serde(default)]
    pub data: Option<Data<ResourceIdentifier>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceIdentifier {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(rename = "type", default)]
    pub resource_type: Option<String>,
}

/// Configuration of a `JsonApiParser`, loadable from JSON.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JsonApiParserConfig {
    pub mappers: HashMap<String, AttributesMapper>,
    #[serde(flatten)]
    pub ids: IdPolicy,
}

/// Parses JSON:API documents using one mapper per resource type.
#[derive(Debug, Clone, Default)]
pub struct JsonApiParser {
    mappers: HashMap<String, AttributesMapper>,
    ids: IdPolicy,
}

impl JsonApiParser {
    pub fn new(mappers: HashMap<String, AttributesMapper>) -> Self {
        Self {
            mappers,
            ids: IdPolicy::default(),
        }
    }

    pub fn from_config(config: JsonApiParserConfig) -> Self {
        Self {
            mappers: config.mappers,
            ids: config.ids,
        }
    }

    pub fn with_id_policy(mut self, ids: IdPolicy) -> Self {
        self.ids = ids;
        self
    }

    pub fn parse_document(&self, document: JsonApiDocument) -> Result<ParsedResponse, ParseError> {
        let data = match document.data {
            Data::One(resource) => Data::One(self.parse_entity(resource)?),
            Data::Many(resources) => Data::Many(
                resources
                    .into_iter()
                    .map(|resource| self.parse_entity(resource))
                    .collect::<Result<_, _>>()?,
            ),
        };

        let included = document
            .included
            .unwrap_or_default()
            .into_iter()
            .map(|resource| self.parse_entity(resource))
            .collect::<Result<_, _>>()?;

        Ok(ParsedResponse {
            data,
            included,
            meta: document.meta,
        })
    }

    fn parse_entity(&self, resource: ResourceObject) -> Result<ParsedEntity, ParseError> {
        let ResourceObject {
            id,
            resource_type,
            attributes,
            relationships,
        } = resource;

        let mapper = self
            .mappers
            .get(&resource_type)
            .ok_or_else(|| ParseError::MissingMapper(resource_type.clone()))?;

        let mut serialization = attributes.unwrap_or_default();
        serialization.extend(self.parse_relationships(relationships.unwrap_or_default())?);

        let mut attributes = mapper.map(&serialization);
        let id = self.ids.resolve(&resource_type, id.as_ref())?;
        attributes.insert("id".to_string(), id);

        Ok(ParsedEntity::new(resource_type, attributes))
    }

    fn parse_relationships(
        &self,
        relationships: BTreeMap<String, Relationship>,
    ) -> Result<Serialization, ParseError> {
        let mut related = Serialization::new();

        for (name, relationship) in relationships {
            match relationship.data {
                None => {}
                Some(Data::One(identifier)) => {
                    let id = self.identifier_id(&name, &identifier)?;
                    related.insert(format!("{name}_id"), id);
                }
                Some(Data::Many(identifiers)) => {
                    let ids = identifiers
                        .iter()
                        .map(|identifier| self.identifier_id(&name, identifier))
                        .collect::<Result<Vec<_>, _>>()?;
                    related.insert(format!("{name}_ids"), Value::Array(ids));
                }
            }
        }

        Ok(related)
    }

    fn identifier_id(&self, name: &str, identifier: &ResourceIdentifier) -> Result<Value, ParseError> {
        let entity_type = identifier.resource_type.as_deref().unwrap_or(name);
        self.ids.resolve(entity_type, identifier.id.as_ref())
    }
}

impl ResponseParser for JsonApiParser {
    fn parse(&self, response: &Value) -> Result<ParsedResponse, ParseError> {
        let document = JsonApiDocument::deserialize(response)?;
        self.parse_document(document)
    }
}
