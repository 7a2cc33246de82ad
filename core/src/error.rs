//! Error types for parsing, transport and API error translation.
//!
//! # Design
//! `TransportError` is whatever the transport raised. The service never
//! hands it to callers directly: it goes through an `ErrorParser` first,
//! which turns recognized API error shapes into the `NotAllowed`,
//! `EntityNotFound` and `UnprocessableEntity` variants of `ApiError` and
//! wraps everything else in `ApiError::Transport` untouched.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Failures while turning a raw response into a `ParsedResponse`.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The JSON:API parser has no mapper for a resource type. This is a
    /// configuration bug on the caller's side.
    #[error("No mapper found for entity with type: {0}!")]
    MissingMapper(String),

    #[error("entity of type '{entity_type}' has no id")]
    MissingId { entity_type: String },

    #[error("entity of type '{entity_type}' has an id that is not an integer: {id}")]
    InvalidId { entity_type: String, id: Value },

    /// The payload does not have the shape the parser expects.
    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("invalid JSON:API document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by a `Transport` implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The server answered with a non-success status. `data` is the
    /// response body when it was JSON.
    #[error("request failed with status {status}")]
    Status { status: u16, data: Option<Value> },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            TransportError::Http(err) => err.status().map(|s| s.as_u16()),
            TransportError::Other(_) => None,
        }
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            TransportError::Status { data, .. } => data.as_ref(),
            _ => None,
        }
    }
}

/// Error reported for a single attribute of an unprocessable entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeError {
    pub code: String,
    pub detail: String,
}

/// A leaf attribute error or a nested group of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldError {
    Attribute(AttributeError),
    Nested(FieldErrors),
}

/// Attribute errors keyed by attribute name, nested along the error's
/// source pointer (`/photo/url` lands at `photo -> url`).
pub type FieldErrors = BTreeMap<String, FieldError>;

/// Errors observed by callers of `EntityService`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The API answered 403.
    #[error("{0}")]
    NotAllowed(String),

    /// The API answered 404.
    #[error("{0}")]
    EntityNotFound(String),

    /// The API answered 422; `errors` holds the per-attribute details.
    #[error("There was an error trying to process the entity")]
    UnprocessableEntity { errors: FieldErrors },

    /// A transport error the error parser did not recognize.
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl ApiError {
    /// Stable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::NotAllowed(_) => "NotAllowedError",
            ApiError::EntityNotFound(_) => "EntityNotFoundError",
            ApiError::UnprocessableEntity { .. } => "UnprocessableEntityError",
            ApiError::Transport(_) => "TransportError",
            ApiError::Parse(_) => "ParseError",
        }
    }

    pub fn errors(&self) -> Option<&FieldErrors> {
        match self {
            ApiError::UnprocessableEntity { errors } => Some(errors),
            _ => None,
        }
    }
}
