//! The network boundary.
//!
//! `Transport` is the single capability `EntityService` uses to perform I/O.
//! Retries, timeouts and cancellation belong to implementations, not to the
//! service. `ReqwestTransport` is the stock implementation.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::Form;
use reqwest::Method;
use serde_json::Value;

use crate::error::TransportError;
use crate::http::{ApiRequest, FormData, HttpMethod, RequestBody, TransportResponse};

/// Performs an `ApiRequest`.
///
/// Non-success statuses must be reported as `TransportError::Status` with
/// the response body as `data`, so error parsers can recognize them.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, request: &ApiRequest) -> Result<TransportResponse, TransportError>;
}

/// `Transport` backed by a `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, request: &ApiRequest) -> String {
        format!("{}/{}", self.base_url, request.url().trim_start_matches('/'))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn request(&self, request: &ApiRequest) -> Result<TransportResponse, TransportError> {
        let mut builder = self.client.request(method_for(request.method), self.url_for(request));

        let body = request.body();
        for (name, value) in &request.headers {
            // reqwest writes the multipart content type with its boundary.
            if matches!(body, Some(RequestBody::Form(_))) && name.eq_ignore_ascii_case(CONTENT_TYPE.as_str()) {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match body {
            Some(RequestBody::Json(json)) => builder.body(json),
            Some(RequestBody::Form(form)) => builder.multipart(multipart_form(form)),
            None => builder,
        };

        let response = builder.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                data: Some(error_body(&bytes)),
            });
        }

        let data = if bytes.is_empty() {
            None
        } else {
            let value = serde_json::from_slice(&bytes)
                .map_err(|e| TransportError::Other(format!("response body is not JSON: {e}")))?;
            Some(value)
        };

        Ok(TransportResponse {
            status: status.as_u16(),
            data,
        })
    }
}

/// Error bodies are kept even when they are not JSON; an empty body becomes
/// an empty string.
fn error_body(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

fn method_for(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
    }
}

fn multipart_form(form: FormData) -> Form {
    form.fields
        .into_iter()
        .fold(Form::new(), |multipart, (name, value)| multipart.text(name, value))
}
