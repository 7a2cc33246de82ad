//! Response parsers: raw response body in, `ParsedResponse` out.
//!
//! Two strategies are provided. `JsonApiParser` reads JSON:API documents,
//! `SchemaParser` reads arbitrary nested JSON guided by a `SchemaEntity`
//! tree. Both are pure and hold only configuration.

pub mod entity_set;
pub mod ids;
pub mod json_api;
pub mod schema;

use serde_json::Value;

use crate::error::ParseError;
use crate::types::ParsedResponse;

pub use entity_set::ParsedEntitySet;
pub use ids::IdPolicy;
pub use json_api::{JsonApiParser, JsonApiParserConfig};
pub use schema::{SchemaEntity, SchemaParser, SchemaParserConfig};

/// Turns a raw response body into normalized entities.
pub trait ResponseParser: Send + Sync {
    fn parse(&self, response: &Value) -> Result<ParsedResponse, ParseError>;
}
