//! Translation of transport errors into domain errors.
//!
//! # Design
//! An error counts as an API error only when it carries both a numeric
//! status and a response body. Recognized statuses are dispatched through a
//! static handler table; every other error passes through untouched inside
//! `ApiError::Transport`. Parsing never fails: a body that does not look
//! like a JSON:API error document is treated as one with no error items,
//! and each item is read on its own.

use serde_json::Value;
use tracing::debug;

use crate::error::{ApiError, AttributeError, FieldError, FieldErrors, TransportError};

/// Converts a transport failure into the error callers observe.
pub trait ErrorParser: Send + Sync {
    fn parse(&self, error: TransportError) -> ApiError;
}

/// Passes every error through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullErrorParser;

impl ErrorParser for NullErrorParser {
    fn parse(&self, error: TransportError) -> ApiError {
        ApiError::Transport(error)
    }
}

/// JSON:API error document (`{ "errors": [...] }`).
///
/// Items are read one by one, so a single malformed item never hides the
/// others.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JsonApiErrorBody {
    pub errors: Vec<JsonApiErrorItem>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct JsonApiErrorItem {
    pub title: Option<String>,
    pub code: Option<String>,
    pub detail: Option<String>,
    pub pointer: Option<String>,
}

impl JsonApiErrorBody {
    /// Anything without an `errors` array reads as a body with no items.
    pub fn from_value(data: &Value) -> Self {
        let errors = data
            .get("errors")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(JsonApiErrorItem::from_value).collect())
            .unwrap_or_default();
        Self { errors }
    }
}

impl JsonApiErrorItem {
    pub fn from_value(item: &Value) -> Self {
        Self {
            title: item.get("title").and_then(scalar_text),
            code: item.get("code").and_then(scalar_text),
            detail: item.get("detail").and_then(scalar_text),
            pointer: item
                .pointer("/source/pointer")
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }
}

/// Strings as is, other scalars in their JSON form.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Bool(_) | Value::Number(_) => Some(value.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

type Handler = fn(&JsonApiErrorBody) -> ApiError;

const HANDLERS: &[(u16, Handler)] = &[
    (403, not_allowed_error_for),
    (404, not_found_error_for),
    (422, unprocessable_error_for),
];

/// Recognizes 403, 404 and 422 JSON:API error responses.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonApiErrorParser;

impl JsonApiErrorParser {
    pub fn new() -> Self {
        Self
    }
}

impl ErrorParser for JsonApiErrorParser {
    fn parse(&self, error: TransportError) -> ApiError {
        let (status, data) = match api_error_parts(&error) {
            Some(parts) => parts,
            None => return ApiError::Transport(error),
        };
        let handler = match handler_for(status) {
            Some(handler) => handler,
            None => return ApiError::Transport(error),
        };

        let body = JsonApiErrorBody::from_value(data);
        let translated = handler(&body);
        debug!(status, kind = translated.kind(), "translated API error");
        translated
    }
}

/// Status and body of `error` if it has the API error shape.
fn api_error_parts(error: &TransportError) -> Option<(u16, &Value)> {
    match error {
        TransportError::Status {
            status,
            data: Some(data),
        } => Some((*status, data)),
        _ => None,
    }
}

fn handler_for(status: u16) -> Option<Handler> {
    HANDLERS
        .iter()
        .find(|(handled, _)| *handled == status)
        .map(|(_, handler)| *handler)
}

fn not_allowed_error_for(body: &JsonApiErrorBody) -> ApiError {
    ApiError::NotAllowed(detail_for(body))
}

fn not_found_error_for(body: &JsonApiErrorBody) -> ApiError {
    ApiError::EntityNotFound(detail_for(body))
}

fn unprocessable_error_for(body: &JsonApiErrorBody) -> ApiError {
    ApiError::UnprocessableEntity {
        errors: errors_map_for(body),
    }
}

fn detail_for(body: &JsonApiErrorBody) -> String {
    body.errors
        .first()
        .and_then(|item| item.detail.clone())
        .unwrap_or_default()
}

fn errors_map_for(body: &JsonApiErrorBody) -> FieldErrors {
    let mut errors = FieldErrors::new();

    for item in &body.errors {
        let Some(pointer) = item.pointer.as_deref() else {
            debug!(code = ?item.code, "skipping error item without a readable source pointer");
            continue;
        };
        let path = path_for_pointer(pointer);
        let error = AttributeError {
            code: item.code.clone().unwrap_or_default(),
            detail: item.detail.clone().unwrap_or_default(),
        };
        deep_set(&mut errors, &path, error);
    }

    errors
}

/// `/photo/url` -> `["photo", "url"]`. Only the leading slash is dropped.
fn path_for_pointer(pointer: &str) -> Vec<&str> {
    pointer.strip_prefix('/').unwrap_or(pointer).split('/').collect()
}

fn deep_set(errors: &mut FieldErrors, path: &[&str], error: AttributeError) {
    match path {
        [] => {}
        [last] => {
            errors.insert(last.to_string(), FieldError::Attribute(error));
        }
        [head, rest @ ..] => {
            let node = errors
                .entry(head.to_string())
                .or_insert_with(|| FieldError::Nested(FieldErrors::new()));
            if let FieldError::Attribute(_) = node {
                *node = FieldError::Nested(FieldErrors::new());
            }
            if let FieldError::Nested(children) = node {
                deep_set(children, rest, error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn api_error(status: u16, data: Value) -> TransportError {
        TransportError::Status {
            status,
            data: Some(data),
        }
    }

    #[test]
    fn forbidden_becomes_not_allowed_with_first_detail() {
        let error = api_error(
            403,
            json!({
                "errors": [{
                    "title": "Forbidden Error",
                    "code": "forbidden.album",
                    "detail": "The item 123 does not belong to current user",
                    "source": { "pointer": null }
                }]
            }),
        );

        let parsed = JsonApiErrorParser::new().parse(error);
        assert_eq!(parsed.kind(), "NotAllowedError");
        assert_eq!(parsed.to_string(), "The item 123 does not belong to current user");
    }

    #[test]
    fn not_found_becomes_entity_not_found() {
        let error = api_error(
            404,
            json!({
                "errors": [{
                    "title": "Not Found Error",
                    "code": "not_found",
                    "detail": "Couldn't find User with 'id'=133",
                    "source": { "pointer": "/User/id" }
                }]
            }),
        );

        let parsed = JsonApiErrorParser::new().parse(error);
        assert_eq!(parsed.kind(), "EntityNotFoundError");
        assert_eq!(parsed.to_string(), "Couldn't find User with 'id'=133");
    }

    #[test]
    fn missing_error_items_give_empty_detail() {
        let parsed = JsonApiErrorParser::new().parse(api_error(404, json!({})));
        assert!(matches!(parsed, ApiError::EntityNotFound(ref detail) if detail.is_empty()));

        let parsed = JsonApiErrorParser::new().parse(api_error(403, json!("Forbidden")));
        assert!(matches!(parsed, ApiError::NotAllowed(ref detail) if detail.is_empty()));
    }

    #[test]
    fn unprocessable_builds_nested_errors_by_pointer() {
        let error = api_error(
            422,
            json!({
                "errors": [
                    {
                        "status": 422,
                        "title": "Unprocessable entity",
                        "detail": "Email taken",
                        "code": "invalid.email_taken",
                        "source": { "pointer": "/email" }
                    },
                    {
                        "status": 422,
                        "title": "Unprocessable entity",
                        "code": "invalid.blank",
                        "detail": "Can't be blank",
                        "source": { "pointer": "/content" }
                    },
                    {
                        "status": 422,
                        "title": "Unprocessable entity",
                        "code": "invalid.invalid_format",
                        "detail": "URL format is not valid",
                        "source": { "pointer": "/photo/url" }
                    }
                ]
            }),
        );

        let parsed = JsonApiErrorParser::new().parse(error);
        assert_eq!(parsed.kind(), "UnprocessableEntityError");
        assert_eq!(
            serde_json::to_value(parsed.errors().unwrap()).unwrap(),
            json!({
                "email": { "code": "invalid.email_taken", "detail": "Email taken" },
                "content": { "code": "invalid.blank", "detail": "Can't be blank" },
                "photo": { "url": { "code": "invalid.invalid_format", "detail": "URL format is not valid" } }
            })
        );
    }

    #[test]
    fn single_unprocessable_item() {
        let error = api_error(
            422,
            json!({ "errors": [{ "source": { "pointer": "/email" }, "code": "invalid.email_taken", "detail": "Email taken" }] }),
        );

        let parsed = JsonApiErrorParser::new().parse(error);
        let mut expected = FieldErrors::new();
        expected.insert(
            "email".to_string(),
            FieldError::Attribute(AttributeError {
                code: "invalid.email_taken".to_string(),
                detail: "Email taken".to_string(),
            }),
        );
        assert_eq!(parsed.errors(), Some(&expected));
    }

    #[test]
    fn badly_typed_items_do_not_hide_valid_ones() {
        let error = api_error(
            422,
            json!({ "errors": [
                { "source": { "pointer": "/email" }, "code": "invalid.email_taken", "detail": "Email taken" },
                { "source": { "pointer": "/age" }, "code": 42, "detail": ["not", "text"] },
                { "source": { "pointer": 7 }, "code": "invalid.blank" },
                "not an object"
            ] }),
        );

        let parsed = JsonApiErrorParser::new().parse(error);
        assert_eq!(
            serde_json::to_value(parsed.errors().unwrap()).unwrap(),
            json!({
                "email": { "code": "invalid.email_taken", "detail": "Email taken" },
                "age": { "code": "42", "detail": "" }
            })
        );
    }

    #[test]
    fn badly_typed_sibling_keeps_the_first_detail() {
        let error = api_error(
            404,
            json!({ "errors": [
                { "detail": "Couldn't find User with 'id'=9", "code": "not_found" },
                { "detail": "Other", "code": { "nested": true } }
            ] }),
        );

        let parsed = JsonApiErrorParser::new().parse(error);
        assert!(matches!(parsed, ApiError::EntityNotFound(ref d) if d == "Couldn't find User with 'id'=9"));
    }

    #[test]
    fn text_bodies_translate_with_empty_detail() {
        let parsed = JsonApiErrorParser::new().parse(api_error(404, json!("")));
        assert!(matches!(parsed, ApiError::EntityNotFound(ref detail) if detail.is_empty()));
    }

    #[test]
    fn unprocessable_without_items_has_no_errors() {
        let parsed = JsonApiErrorParser::new().parse(api_error(422, json!({})));
        assert_eq!(parsed.errors(), Some(&FieldErrors::new()));
    }

    #[test]
    fn deeper_pointer_replaces_a_leaf() {
        let error = api_error(
            422,
            json!({ "errors": [
                { "source": { "pointer": "/photo" }, "code": "a", "detail": "A" },
                { "source": { "pointer": "/photo/url" }, "code": "b", "detail": "B" }
            ] }),
        );

        let parsed = JsonApiErrorParser::new().parse(error);
        assert_eq!(
            serde_json::to_value(parsed.errors().unwrap()).unwrap(),
            json!({ "photo": { "url": { "code": "b", "detail": "B" } } })
        );
    }

    #[test]
    fn unhandled_status_passes_through() {
        let parsed = JsonApiErrorParser::new().parse(api_error(500, json!({ "errors": [] })));
        assert!(matches!(
            parsed,
            ApiError::Transport(TransportError::Status { status: 500, .. })
        ));
    }

    #[test]
    fn errors_without_api_shape_pass_through() {
        let parsed = JsonApiErrorParser::new().parse(TransportError::Other("Something went wrong".to_string()));
        assert!(matches!(parsed, ApiError::Transport(TransportError::Other(ref m)) if m == "Something went wrong"));

        let parsed = JsonApiErrorParser::new().parse(TransportError::Status { status: 404, data: None });
        assert!(matches!(parsed, ApiError::Transport(TransportError::Status { status: 404, data: None })));
    }

    #[test]
    fn null_parser_passes_everything_through() {
        let parsed = NullErrorParser.parse(api_error(404, json!({ "errors": [] })));
        assert!(matches!(parsed, ApiError::Transport(TransportError::Status { status: 404, .. })));
    }

    #[test]
    fn pointer_paths() {
        assert_eq!(path_for_pointer("/email"), vec!["email"]);
        assert_eq!(path_for_pointer("/photo/url"), vec!["photo", "url"]);
        assert_eq!(path_for_pointer("email"), vec!["email"]);
    }
}
