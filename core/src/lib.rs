//! Client-side data access core for JSON APIs.
//!
//! # Overview
//! Turns HTTP responses into application domain objects. A response body
//! flows one way: `ResponseParser` normalizes it into a `ParsedResponse`,
//! `EntityCreator` hands each normalized entity to the store registered for
//! its type. Failures flow the other way: a `TransportError` goes through an
//! `ErrorParser` and reaches the caller as an `ApiError`.
//!
//! # Design
//! - `EntityService` builds inert `ApiRequest` values (`build_*`) and sends
//!   them through an injected `Transport`, the only code doing I/O.
//! - Parsers are pure and hold configuration only: attribute mappers, a
//!   schema tree, an id conversion policy.
//! - Stores are caller-owned. This crate never caches entities across calls.

pub mod config;
pub mod creator;
pub mod encoding;
pub mod error;
pub mod error_parser;
pub mod http;
pub mod mapper;
pub mod parser;
pub mod service;
pub mod transport;
pub mod types;

pub use config::{ServiceConfig, ServicePaths};
pub use creator::{Creator, EntityCreator, EntityStore, StoreRegistry, Stores};
pub use error::{ApiError, AttributeError, FieldError, FieldErrors, ParseError, TransportError};
pub use error_parser::{ErrorParser, JsonApiErrorParser, NullErrorParser};
pub use http::{ApiRequest, FormData, HttpMethod, RequestBody, TransportResponse};
pub use mapper::{map_attributes, AttributesMapper};
pub use parser::{IdPolicy, JsonApiParser, ResponseParser, SchemaEntity, SchemaParser};
pub use service::{EntityResponse, EntityService, RequestOptions};
pub use transport::{ReqwestTransport, Transport};
pub use types::{Data, EntityAttributes, EntityId, Params, ParsedEntity, ParsedResponse, Serialization};
