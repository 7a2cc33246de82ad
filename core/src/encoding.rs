//! Query-string and request body encoding.

use serde_json::Value;
use url::form_urlencoded::byte_serialize;

use crate::http::{FormData, RequestBody};
use crate::types::{Params, Serialization};

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const FORM_DATA_CONTENT_TYPE: &str = "multipart/form-data";

pub fn content_type(send_as_form_data: bool) -> &'static str {
    if send_as_form_data {
        FORM_DATA_CONTENT_TYPE
    } else {
        JSON_CONTENT_TYPE
    }
}

/// Encode `params` with bracket notation: `page[size]=5`, `ids[0]=1`.
///
/// Keys and values are percent-encoded; brackets are kept literal. Empty
/// arrays and objects contribute nothing, `null` encodes as an empty value.
pub fn to_query_string(params: &Params) -> String {
    let mut pairs = Vec::new();
    for (key, value) in params {
        append_query_pairs(encode(key), value, &mut pairs);
    }

    pairs
        .into_iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn append_query_pairs(key: String, value: &Value, pairs: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (child, value) in map {
                append_query_pairs(format!("{key}[{}]", encode(child)), value, pairs);
            }
        }
        Value::Array(items) => {
            for (index, value) in items.iter().enumerate() {
                append_query_pairs(format!("{key}[{index}]"), value, pairs);
            }
        }
        Value::Null => pairs.push((key, String::new())),
        Value::String(s) => pairs.push((key, encode(s))),
        other => pairs.push((key, encode(&other.to_string()))),
    }
}

fn encode(s: &str) -> String {
    byte_serialize(s.as_bytes()).collect()
}

/// Flatten attributes into multipart text fields.
///
/// `null` attributes are omitted and arrays become one `key[]` field per
/// item.
pub fn form_data(attributes: &Serialization) -> FormData {
    let mut form = FormData::default();

    for (key, value) in attributes {
        match value {
            Value::Null => {}
            Value::Array(items) => {
                for item in items {
                    form.append(format!("{key}[]"), field_text(item));
                }
            }
            other => form.append(key.clone(), field_text(other)),
        }
    }

    form
}

fn field_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn encode_body(data: &Serialization, send_as_form_data: bool) -> RequestBody {
    if send_as_form_data {
        RequestBody::Form(form_data(data))
    } else {
        RequestBody::Json(Value::Object(data.clone()).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Serialization {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn empty_params_encode_to_nothing() {
        assert_eq!(to_query_string(&Params::new()), "");
    }

    #[test]
    fn nested_params_use_brackets() {
        let query = to_query_string(&map(json!({ "ids": [1, 2], "page": { "size": 5 } })));
        assert_eq!(query, "ids[0]=1&ids[1]=2&page[size]=5");
    }

    #[test]
    fn deeply_nested_params() {
        let query = to_query_string(&map(json!({ "filter": { "owner": { "id": 3 }, "tags": ["a", "b"] } })));
        assert_eq!(query, "filter[owner][id]=3&filter[tags][0]=a&filter[tags][1]=b");
    }

    #[test]
    fn values_and_keys_are_percent_encoded() {
        let query = to_query_string(&map(json!({ "include": ["city"], "search": "A text & more" })));
        assert_eq!(query, "include[0]=city&search=A+text+%26+more");
    }

    #[test]
    fn null_and_empty_containers() {
        let query = to_query_string(&map(json!({ "a": null, "b": [], "c": {}, "d": true })));
        assert_eq!(query, "a=&d=true");
    }

    #[test]
    fn form_data_repeats_arrays_and_skips_nulls() {
        let form = form_data(&map(json!({
            "firstName": "John",
            "age": 33,
            "friendsIds": [3, 5],
            "relation": null
        })));

        assert_eq!(form.get_all("firstName"), vec!["John"]);
        assert_eq!(form.get_all("age"), vec!["33"]);
        assert_eq!(form.get_all("friendsIds[]"), vec!["3", "5"]);
        assert!(form.get_all("relation").is_empty());
        assert_eq!(form.fields.len(), 4);
    }

    #[test]
    fn json_body_keeps_nulls() {
        let RequestBody::Json(body) = encode_body(&map(json!({ "a": null, "b": [1] })), false) else {
            panic!("expected a JSON body");
        };
        assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), json!({ "a": null, "b": [1] }));
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type(true), "multipart/form-data");
        assert_eq!(content_type(false), "application/json");
    }
}
