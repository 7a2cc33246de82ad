//! CRUD operations for one resource type.
//!
//! # Design
//! `EntityService` owns no network code. Each operation is split into a
//! `build_*` method producing an inert `ApiRequest` and the shared
//! `request` routine, which hands the request to the injected `Transport`
//! and then runs the body through the parser and the creator. The only
//! suspension point is the transport call; parsing and creation are
//! synchronous.
//!
//! Transport failures are always passed through the configured
//! `ErrorParser`, so callers see either a result or a translated
//! `ApiError`. A missing or `null` response body (e.g. after a delete) is
//! not an error and yields `Ok(None)` without touching parser or creator.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::config::{ServiceConfig, ID_PLACEHOLDER};
use crate::creator::Creator;
use crate::error::ApiError;
use crate::error_parser::{ErrorParser, JsonApiErrorParser};
use crate::http::{ApiRequest, HttpMethod};
use crate::parser::ResponseParser;
use crate::transport::Transport;
use crate::types::{Data, EntityId, Params, Serialization};

/// Options for body-bearing operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Send the attributes as multipart form data instead of JSON.
    pub includes_files: bool,
}

impl RequestOptions {
    pub fn with_files() -> Self {
        Self { includes_files: true }
    }
}

/// Created domain objects plus the response's `meta` block.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityResponse<T> {
    pub data: Option<Data<T>>,
    pub meta: Option<Value>,
}

pub struct EntityService<T> {
    transport: Arc<dyn Transport>,
    config: ServiceConfig,
    parser: Arc<dyn ResponseParser>,
    creator: Arc<dyn Creator<T>>,
    error_parser: Arc<dyn ErrorParser>,
}

impl<T> Clone for EntityService<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            config: self.config.clone(),
            parser: Arc::clone(&self.parser),
            creator: Arc::clone(&self.creator),
            error_parser: Arc::clone(&self.error_parser),
        }
    }
}

impl<T> fmt::Debug for EntityService<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<T: 'static> EntityService<T> {
    /// A service translating errors with `JsonApiErrorParser`.
    pub fn new<P, C>(transport: Arc<dyn Transport>, config: ServiceConfig, parser: P, creator: C) -> Self
    where
        P: ResponseParser + 'static,
        C: Creator<T> + 'static,
    {
        Self {
            transport,
            config,
            parser: Arc::new(parser),
            creator: Arc::new(creator),
            error_parser: Arc::new(JsonApiErrorParser::new()),
        }
    }

    pub fn with_error_parser<E>(mut self, error_parser: E) -> Self
    where
        E: ErrorParser + 'static,
    {
        self.error_parser = Arc::new(error_parser);
        self
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    // --- request builders ---

    pub fn build_create(&self, attributes: Serialization, params: Params, options: RequestOptions) -> ApiRequest {
        ApiRequest::with_body(
            HttpMethod::Post,
            self.create_path(),
            params,
            attributes,
            options.includes_files,
        )
    }

    pub fn build_update(
        &self,
        id: impl Into<EntityId>,
        attributes: Serialization,
        params: Params,
        options: RequestOptions,
    ) -> ApiRequest {
        let path = self.resource_path(path_override(&self.config.paths.update), &id.into());
        ApiRequest::with_body(HttpMethod::Patch, path, params, attributes, options.includes_files)
    }

    pub fn build_fetch(&self, id: impl Into<EntityId>, params: Params) -> ApiRequest {
        let path = self.resource_path(path_override(&self.config.paths.fetch), &id.into());
        ApiRequest::new(HttpMethod::Get, path, params)
    }

    pub fn build_fetch_all(&self, params: Params) -> ApiRequest {
        ApiRequest::new(HttpMethod::Get, self.list_path(), params)
    }

    pub fn build_delete(&self, id: impl Into<EntityId>, params: Params) -> ApiRequest {
        let path = self.resource_path(path_override(&self.config.paths.delete), &id.into());
        ApiRequest::new(HttpMethod::Delete, path, params)
    }

    // --- operations ---

    pub async fn create(
        &self,
        attributes: Serialization,
        params: Params,
        options: RequestOptions,
    ) -> Result<Option<EntityResponse<T>>, ApiError> {
        self.request(self.build_create(attributes, params, options)).await
    }

    pub async fn update(
        &self,
        id: impl Into<EntityId>,
        attributes: Serialization,
        params: Params,
        options: RequestOptions,
    ) -> Result<Option<EntityResponse<T>>, ApiError> {
        self.request(self.build_update(id, attributes, params, options)).await
    }

    pub async fn fetch(&self, id: impl Into<EntityId>, params: Params) -> Result<Option<EntityResponse<T>>, ApiError> {
        self.request(self.build_fetch(id, params)).await
    }

    pub async fn fetch_all(&self, params: Params) -> Result<Option<EntityResponse<T>>, ApiError> {
        self.request(self.build_fetch_all(params)).await
    }

    pub async fn delete(&self, id: impl Into<EntityId>, params: Params) -> Result<Option<EntityResponse<T>>, ApiError> {
        self.request(self.build_delete(id, params)).await
    }

    /// Send `request` and turn the response into domain objects.
    pub async fn request(&self, request: ApiRequest) -> Result<Option<EntityResponse<T>>, ApiError> {
        debug!(
            method = %request.method,
            path = %request.path,
            form_data = request.send_as_form_data,
            "sending request"
        );

        let response = match self.transport.request(&request).await {
            Ok(response) => response,
            Err(error) => {
                let error = self.error_parser.parse(error);
                debug!(kind = error.kind(), %error, "request failed");
                return Err(error);
            }
        };

        let body = match response.data {
            None | Some(Value::Null) => {
                debug!(status = response.status, "response has no body");
                return Ok(None);
            }
            Some(body) => body,
        };

        let parsed = self.parser.parse(&body)?;
        let data = self.creator.create(&parsed);
        debug!(
            status = response.status,
            included = parsed.included.len(),
            "request completed"
        );
        Ok(Some(EntityResponse {
            data,
            meta: parsed.meta,
        }))
    }

    // --- paths ---

    fn create_path(&self) -> String {
        path_override(&self.config.paths.create)
            .unwrap_or(&self.config.base_path)
            .to_string()
    }

    fn list_path(&self) -> String {
        path_override(&self.config.paths.list)
            .unwrap_or(&self.config.base_path)
            .to_string()
    }

    fn resource_path(&self, override_path: Option<&str>, id: &EntityId) -> String {
        match override_path {
            Some(path) => path.replace(ID_PLACEHOLDER, &id.to_string()),
            None => self.default_resource_path(id),
        }
    }

    fn default_resource_path(&self, id: &EntityId) -> String {
        if id.is_empty() {
            return self.config.base_path.clone();
        }
        format!("{}/{id}", self.config.base_path.trim_end_matches('/'))
    }
}

/// Empty overrides count as unset.
fn path_override(path: &Option<String>) -> Option<&str> {
    path.as_deref().filter(|path| !path.is_empty())
}
