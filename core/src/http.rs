//! HTTP request and response types exchanged with a `Transport`.
//!
//! # Design
//! These types describe a request as plain data. `EntityService` builds an
//! `ApiRequest` for every operation and hands it to the transport, which is
//! the only code that touches the network. Keeping the request inert makes
//! every `build_*` method testable without I/O.

use std::fmt;

use serde_json::Value;

use crate::encoding;
use crate::types::{Params, Serialization};

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Whether requests with this method carry a body.
    pub fn has_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Patch | HttpMethod::Put)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request described as plain data.
///
/// `data` holds the attributes exactly as the caller passed them; `body()`
/// encodes them according to `send_as_form_data`.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub path: String,
    pub params: Params,
    pub headers: Vec<(String, String)>,
    pub data: Option<Serialization>,
    pub send_as_form_data: bool,
}

impl ApiRequest {
    /// A bodyless request.
    pub fn new(method: HttpMethod, path: impl Into<String>, params: Params) -> Self {
        Self {
            method,
            path: path.into(),
            params,
            headers: Vec::new(),
            data: None,
            send_as_form_data: false,
        }
    }

    /// A request carrying `data`, encoded as multipart form data when
    /// `send_as_form_data` is set and as JSON otherwise.
    pub fn with_body(
        method: HttpMethod,
        path: impl Into<String>,
        params: Params,
        data: Serialization,
        send_as_form_data: bool,
    ) -> Self {
        Self {
            method,
            path: path.into(),
            params,
            headers: vec![(
                "content-type".to_string(),
                encoding::content_type(send_as_form_data).to_string(),
            )],
            data: Some(data),
            send_as_form_data,
        }
    }

    /// Path followed by the bracket-encoded query string, if any.
    pub fn url(&self) -> String {
        let query = encoding::to_query_string(&self.params);
        if query.is_empty() {
            return self.path.clone();
        }
        let separator = if self.path.contains('?') { '&' } else { '?' };
        format!("{}{separator}{query}", self.path)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn body(&self) -> Option<RequestBody> {
        self.data
            .as_ref()
            .map(|data| encoding::encode_body(data, self.send_as_form_data))
    }
}

/// Encoded request body.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(String),
    Form(FormData),
}

/// Multipart text fields in insertion order. A key may repeat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    pub fields: Vec<(String, String)>,
}

impl FormData {
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    /// All values appended under `name`.
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
            .collect()
    }
}

/// Successful transport result. `data` is `None` when the response had no
/// body (e.g. `204 No Content`).
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub data: Option<Value>,
}
