//! In-memory API server used by the integration tests.
//!
//! # Design
//! Serves three surfaces over one seeded store:
//! - `/1/users`: JSON:API `user` documents with `city` and `state`
//!   resources in `included`. Writes accept JSON or multipart form data.
//! - `/2/users`: the same users as plain nested JSON.
//! - `/notes`: JSON:API `note` documents with UUID string ids.
//!
//! Failures are JSON:API error documents (`{ "errors": [...] }`) with a
//! `source.pointer` on every item.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::Arc,
};

use axum::{
    extract::{FromRequest, Multipart, Path, Query, Request, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub age: Option<i64>,
    pub avatar_url: Option<String>,
    pub city_id: Option<i64>,
    pub friend_ids: Vec<i64>,
    /// Protected users cannot be deleted.
    #[serde(default)]
    pub protected: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub id: i64,
    pub name: String,
    pub state_id: i64,
}

/// A `state` resource. Named to stay clear of axum's `State` extractor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub id: i64,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub title: String,
    pub body: String,
}

/// Payload for creating or updating a user. Every field is optional so
/// PATCH can send a subset; creation validates what is required.
#[derive(Debug, Default, Deserialize)]
pub struct UserInput {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub age: Option<i64>,
    pub avatar_url: Option<String>,
    pub city_id: Option<i64>,
    pub friend_ids: Option<Vec<i64>>,
}

impl UserInput {
    /// Apply one multipart text field. Array fields arrive as `name[]`.
    pub fn set_form_field(&mut self, name: &str, value: String) -> Result<(), ErrorResponse> {
        match name {
            "first_name" => self.first_name = Some(value),
            "last_name" => self.last_name = Some(value),
            "email" => self.email = Some(value),
            "avatar_url" => self.avatar_url = Some(value),
            "age" => self.age = Some(parse_form_int(name, &value)?),
            "city_id" => self.city_id = Some(parse_form_int(name, &value)?),
            "friend_ids[]" => self
                .friend_ids
                .get_or_insert_with(Vec::new)
                .push(parse_form_int(name, &value)?),
            _ => debug!(field = name, "ignoring unknown form field"),
        }
        Ok(())
    }

    fn apply_to(self, user: &mut User) {
        if let Some(first_name) = self.first_name {
            user.first_name = first_name;
        }
        if self.last_name.is_some() {
            user.last_name = self.last_name;
        }
        if self.email.is_some() {
            user.email = self.email;
        }
        if self.age.is_some() {
            user.age = self.age;
        }
        if self.avatar_url.is_some() {
            user.avatar_url = self.avatar_url;
        }
        if self.city_id.is_some() {
            user.city_id = self.city_id;
        }
        if let Some(friend_ids) = self.friend_ids {
            user.friend_ids = friend_ids;
        }
    }
}

fn parse_form_int(name: &str, value: &str) -> Result<i64, ErrorResponse> {
    value
        .parse()
        .map_err(|_| ErrorResponse::bad_request(format!("field '{name}' is not an integer: {value}")))
}

#[derive(Debug, Deserialize)]
pub struct CreateNote {
    pub title: String,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug)]
pub struct Store {
    pub users: BTreeMap<i64, User>,
    pub cities: BTreeMap<i64, City>,
    pub regions: BTreeMap<i64, Region>,
    pub notes: BTreeMap<Uuid, Note>,
    next_user_id: i64,
}

impl Store {
    /// Two states, two cities and one protected user with id 1.
    pub fn seeded() -> Self {
        let regions = [(5, "State 5"), (6, "State 6")]
            .into_iter()
            .map(|(id, name)| (id, Region { id, name: name.to_string() }))
            .collect();
        let cities = [(3, "City 3", 5), (4, "City 4", 6)]
            .into_iter()
            .map(|(id, name, state_id)| {
                let city = City {
                    id,
                    name: name.to_string(),
                    state_id,
                };
                (id, city)
            })
            .collect();
        let admin = User {
            id: 1,
            first_name: "Admin".to_string(),
            last_name: None,
            email: Some("admin@example.com".to_string()),
            age: None,
            avatar_url: None,
            city_id: Some(3),
            friend_ids: Vec::new(),
            protected: true,
        };

        Self {
            users: BTreeMap::from([(admin.id, admin)]),
            cities,
            regions,
            notes: BTreeMap::new(),
            next_user_id: 2,
        }
    }
}

pub type Db = Arc<RwLock<Store>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::seeded()));
    Router::new()
        .route("/1/users", get(list_users).post(create_user))
        .route("/1/users/{id}", get(get_user).patch(update_user).delete(delete_user))
        .route("/2/users", get(list_nested_users))
        .route("/2/users/{id}", get(get_nested_user))
        .route("/notes", get(list_notes).post(create_note))
        .route("/notes/{id}", get(get_note).delete(delete_note))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

// --- errors ---

/// A JSON:API error document with its HTTP status.
#[derive(Debug)]
pub struct ErrorResponse {
    pub status: StatusCode,
    pub errors: Vec<Value>,
}

impl ErrorResponse {
    pub fn not_found(resource: &str, id: &str) -> Self {
        let status = StatusCode::NOT_FOUND;
        Self {
            status,
            errors: vec![error_item(
                status,
                "not_found",
                &format!("Couldn't find {resource} with 'id'={id}"),
                Some(format!("/{resource}/id")),
            )],
        }
    }

    pub fn forbidden(code: &str, detail: &str) -> Self {
        let status = StatusCode::FORBIDDEN;
        Self {
            status,
            errors: vec![error_item(status, code, detail, None)],
        }
    }

    pub fn bad_request(detail: String) -> Self {
        let status = StatusCode::BAD_REQUEST;
        Self {
            status,
            errors: vec![error_item(status, "bad_request", &detail, None)],
        }
    }

    pub fn unprocessable(errors: Vec<Value>) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            errors,
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "errors": self.errors }))).into_response()
    }
}

fn error_item(status: StatusCode, code: &str, detail: &str, pointer: Option<String>) -> Value {
    json!({
        "status": status.as_u16(),
        "title": status.canonical_reason().unwrap_or_default(),
        "code": code,
        "detail": detail,
        "source": { "pointer": pointer }
    })
}

fn invalid(pointer: &str, code: &str, detail: &str) -> Value {
    error_item(
        StatusCode::UNPROCESSABLE_ENTITY,
        code,
        detail,
        Some(pointer.to_string()),
    )
}

/// Field-level checks for a user about to be stored.
pub fn validate_user(store: &Store, user: &User) -> Result<(), ErrorResponse> {
    let mut errors = Vec::new();

    if user.first_name.trim().is_empty() {
        errors.push(invalid("/first_name", "invalid.blank", "Can't be blank"));
    }
    if let Some(email) = &user.email {
        let taken = store
            .users
            .values()
            .any(|other| other.id != user.id && other.email.as_ref() == Some(email));
        if taken {
            errors.push(invalid("/email", "invalid.email_taken", "Email taken"));
        }
    }
    if let Some(url) = &user.avatar_url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            errors.push(invalid("/avatar/url", "invalid.invalid_format", "URL format is not valid"));
        }
    }
    if let Some(city_id) = user.city_id {
        if !store.cities.contains_key(&city_id) {
            errors.push(invalid("/city", "invalid.not_found", "City does not exist"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ErrorResponse::unprocessable(errors))
    }
}

// --- JSON:API documents ---

fn identifier(resource_type: &str, id: i64) -> Value {
    json!({ "id": id.to_string(), "type": resource_type })
}

fn user_resource(user: &User) -> Value {
    json!({
        "id": user.id.to_string(),
        "type": "user",
        "attributes": {
            "first_name": user.first_name,
            "last_name": user.last_name,
            "email": user.email,
            "age": user.age,
            "avatar_url": user.avatar_url
        },
        "relationships": {
            "city": { "data": user.city_id.map(|id| identifier("city", id)) },
            "friends": {
                "data": user.friend_ids.iter().map(|id| identifier("user", *id)).collect::<Vec<_>>()
            }
        }
    })
}

fn city_resource(city: &City) -> Value {
    json!({
        "id": city.id.to_string(),
        "type": "city",
        "attributes": { "name": city.name },
        "relationships": {
            "state": { "data": identifier("state", city.state_id) }
        }
    })
}

fn region_resource(region: &Region) -> Value {
    json!({
        "id": region.id.to_string(),
        "type": "state",
        "attributes": { "name": region.name }
    })
}

/// Cities referenced by `users`, then their states. Each appears once.
pub fn included_for(store: &Store, users: &[User]) -> Vec<Value> {
    let city_ids: BTreeSet<i64> = users.iter().filter_map(|user| user.city_id).collect();
    let cities: Vec<&City> = city_ids.iter().filter_map(|id| store.cities.get(id)).collect();
    let region_ids: BTreeSet<i64> = cities.iter().map(|city| city.state_id).collect();

    cities
        .iter()
        .map(|city| city_resource(city))
        .chain(
            region_ids
                .iter()
                .filter_map(|id| store.regions.get(id))
                .map(region_resource),
        )
        .collect()
}

fn user_document(store: &Store, user: &User) -> Value {
    json!({
        "data": user_resource(user),
        "included": included_for(store, std::slice::from_ref(user))
    })
}

fn parse_user_id(raw: &str) -> Result<i64, ErrorResponse> {
    raw.parse().map_err(|_| ErrorResponse::not_found("User", raw))
}

// --- /1/users ---

async fn list_users(
    State(db): State<Db>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ErrorResponse> {
    let store = db.read().await;
    let size = match params.get("page[size]") {
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| ErrorResponse::bad_request(format!("invalid page[size]: {raw}")))?,
        None => store.users.len(),
    };

    let users: Vec<User> = store.users.values().take(size).cloned().collect();
    Ok(Json(json!({
        "data": users.iter().map(user_resource).collect::<Vec<_>>(),
        "included": included_for(&store, &users),
        "meta": { "total": store.users.len(), "size": users.len() }
    })))
}

async fn get_user(State(db): State<Db>, Path(id): Path<String>) -> Result<Json<Value>, ErrorResponse> {
    let user_id = parse_user_id(&id)?;
    let store = db.read().await;
    let user = store
        .users
        .get(&user_id)
        .ok_or_else(|| ErrorResponse::not_found("User", &id))?;
    Ok(Json(user_document(&store, user)))
}

async fn create_user(State(db): State<Db>, request: Request) -> Result<(StatusCode, Json<Value>), ErrorResponse> {
    let input = read_user_input(request).await?;
    let mut store = db.write().await;

    let mut user = User {
        id: store.next_user_id,
        first_name: String::new(),
        last_name: None,
        email: None,
        age: None,
        avatar_url: None,
        city_id: None,
        friend_ids: Vec::new(),
        protected: false,
    };
    input.apply_to(&mut user);
    validate_user(&store, &user)?;

    store.next_user_id += 1;
    store.users.insert(user.id, user.clone());
    debug!(id = user.id, "created user");
    Ok((StatusCode::CREATED, Json(user_document(&store, &user))))
}

async fn update_user(
    State(db): State<Db>,
    Path(id): Path<String>,
    request: Request,
) -> Result<Json<Value>, ErrorResponse> {
    let user_id = parse_user_id(&id)?;
    let input = read_user_input(request).await?;
    let mut store = db.write().await;

    let mut user = store
        .users
        .get(&user_id)
        .cloned()
        .ok_or_else(|| ErrorResponse::not_found("User", &id))?;
    input.apply_to(&mut user);
    validate_user(&store, &user)?;

    store.users.insert(user.id, user.clone());
    debug!(id = user.id, "updated user");
    Ok(Json(user_document(&store, &user)))
}

async fn delete_user(State(db): State<Db>, Path(id): Path<String>) -> Result<StatusCode, ErrorResponse> {
    let user_id = parse_user_id(&id)?;
    let mut store = db.write().await;

    match store.users.get(&user_id) {
        None => return Err(ErrorResponse::not_found("User", &id)),
        Some(user) if user.protected => {
            return Err(ErrorResponse::forbidden(
                "forbidden.user",
                &format!("The user {user_id} can not be deleted"),
            ))
        }
        Some(_) => {}
    }

    store.users.remove(&user_id);
    debug!(id = user_id, "deleted user");
    Ok(StatusCode::NO_CONTENT)
}

/// Read a user payload from a JSON or multipart request body.
async fn read_user_input(request: Request) -> Result<UserInput, ErrorResponse> {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"));

    if !is_multipart {
        let Json(input) = Json::<UserInput>::from_request(request, &())
            .await
            .map_err(|e| ErrorResponse::bad_request(e.to_string()))?;
        return Ok(input);
    }

    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| ErrorResponse::bad_request(e.to_string()))?;
    let mut input = UserInput::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ErrorResponse::bad_request(format!("Multipart error: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let value = field
            .text()
            .await
            .map_err(|e| ErrorResponse::bad_request(format!("Multipart error: {e}")))?;
        input.set_form_field(&name, value)?;
    }
    Ok(input)
}

// --- /2/users ---

fn nested_city(store: &Store, city: &City) -> Value {
    json!({
        "id": city.id,
        "name": city.name,
        "state": store.regions.get(&city.state_id).map(|region| json!({ "id": region.id, "name": region.name }))
    })
}

/// A user with its city, state and friends embedded.
pub fn nested_user(store: &Store, user: &User) -> Value {
    let friends: Vec<Value> = user
        .friend_ids
        .iter()
        .filter_map(|id| store.users.get(id))
        .map(|friend| json!({ "id": friend.id, "first_name": friend.first_name, "last_name": friend.last_name }))
        .collect();

    json!({
        "id": user.id,
        "first_name": user.first_name,
        "last_name": user.last_name,
        "age": user.age,
        "city": user.city_id.and_then(|id| store.cities.get(&id)).map(|city| nested_city(store, city)),
        "friends": friends
    })
}

async fn list_nested_users(State(db): State<Db>) -> Json<Value> {
    let store = db.read().await;
    let users: Vec<Value> = store.users.values().map(|user| nested_user(&store, user)).collect();
    Json(json!({
        "users": users,
        "pagination": { "total": store.users.len() }
    }))
}

async fn get_nested_user(State(db): State<Db>, Path(id): Path<String>) -> Result<Json<Value>, ErrorResponse> {
    let user_id = parse_user_id(&id)?;
    let store = db.read().await;
    let user = store
        .users
        .get(&user_id)
        .ok_or_else(|| ErrorResponse::not_found("User", &id))?;
    Ok(Json(nested_user(&store, user)))
}

// --- /notes ---

fn note_resource(note: &Note) -> Value {
    json!({
        "id": note.id.to_string(),
        "type": "note",
        "attributes": { "title": note.title, "body": note.body }
    })
}

fn parse_note_id(raw: &str) -> Result<Uuid, ErrorResponse> {
    raw.parse().map_err(|_| ErrorResponse::not_found("Note", raw))
}

async fn list_notes(State(db): State<Db>) -> Json<Value> {
    let store = db.read().await;
    Json(json!({
        "data": store.notes.values().map(note_resource).collect::<Vec<_>>(),
        "meta": { "total": store.notes.len() }
    }))
}

async fn create_note(State(db): State<Db>, Json(input): Json<CreateNote>) -> (StatusCode, Json<Value>) {
    let note = Note {
        id: Uuid::new_v4(),
        title: input.title,
        body: input.body,
    };
    db.write().await.notes.insert(note.id, note.clone());
    (StatusCode::CREATED, Json(json!({ "data": note_resource(&note) })))
}

async fn get_note(State(db): State<Db>, Path(id): Path<String>) -> Result<Json<Value>, ErrorResponse> {
    let note_id = parse_note_id(&id)?;
    let store = db.read().await;
    let note = store
        .notes
        .get(&note_id)
        .ok_or_else(|| ErrorResponse::not_found("Note", &id))?;
    Ok(Json(json!({ "data": note_resource(note) })))
}

async fn delete_note(State(db): State<Db>, Path(id): Path<String>) -> Result<StatusCode, ErrorResponse> {
    let note_id = parse_note_id(&id)?;
    db.write()
        .await
        .notes
        .remove(&note_id)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or_else(|| ErrorResponse::not_found("Note", &id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64, first_name: &str) -> User {
        User {
            id,
            first_name: first_name.to_string(),
            last_name: None,
            email: None,
            age: None,
            avatar_url: None,
            city_id: None,
            friend_ids: Vec::new(),
            protected: false,
        }
    }

    #[test]
    fn user_resource_has_string_ids_and_relationships() {
        let mut john = user(2, "John");
        john.city_id = Some(3);
        john.friend_ids = vec![1];

        let resource = user_resource(&john);
        assert_eq!(resource["id"], "2");
        assert_eq!(resource["type"], "user");
        assert_eq!(resource["relationships"]["city"]["data"], json!({ "id": "3", "type": "city" }));
        assert_eq!(resource["relationships"]["friends"]["data"], json!([{ "id": "1", "type": "user" }]));
    }

    #[test]
    fn user_without_city_has_null_relationship() {
        let resource = user_resource(&user(2, "John"));
        assert!(resource["relationships"]["city"]["data"].is_null());
    }

    #[test]
    fn included_lists_each_city_and_state_once() {
        let store = Store::seeded();
        let mut a = user(2, "A");
        a.city_id = Some(3);
        let mut b = user(3, "B");
        b.city_id = Some(3);

        let included = included_for(&store, &[a, b]);
        let types: Vec<&str> = included.iter().map(|r| r["type"].as_str().unwrap()).collect();
        assert_eq!(types, vec!["city", "state"]);
        assert_eq!(included[1]["id"], "5");
    }

    #[test]
    fn validation_collects_every_failure() {
        let store = Store::seeded();
        let mut invalid_user = user(2, " ");
        invalid_user.email = Some("admin@example.com".to_string());
        invalid_user.avatar_url = Some("not-a-url".to_string());

        let error = validate_user(&store, &invalid_user).unwrap_err();
        assert_eq!(error.status, StatusCode::UNPROCESSABLE_ENTITY);
        let pointers: Vec<&str> = error
            .errors
            .iter()
            .map(|e| e["source"]["pointer"].as_str().unwrap())
            .collect();
        assert_eq!(pointers, vec!["/first_name", "/email", "/avatar/url"]);
    }

    #[test]
    fn a_user_keeps_its_own_email() {
        let store = Store::seeded();
        let admin = store.users[&1].clone();
        assert!(validate_user(&store, &admin).is_ok());
    }

    #[test]
    fn form_fields_fill_the_input() {
        let mut input = UserInput::default();
        input.set_form_field("first_name", "John".to_string()).unwrap();
        input.set_form_field("age", "33".to_string()).unwrap();
        input.set_form_field("friend_ids[]", "1".to_string()).unwrap();
        input.set_form_field("friend_ids[]", "4".to_string()).unwrap();
        input.set_form_field("unknown", "x".to_string()).unwrap();

        assert_eq!(input.first_name.as_deref(), Some("John"));
        assert_eq!(input.age, Some(33));
        assert_eq!(input.friend_ids, Some(vec![1, 4]));
    }

    #[test]
    fn non_numeric_form_field_is_rejected() {
        let mut input = UserInput::default();
        let error = input.set_form_field("age", "old".to_string()).unwrap_err();
        assert_eq!(error.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn nested_user_embeds_city_and_state() {
        let store = Store::seeded();
        let nested = nested_user(&store, &store.users[&1]);
        assert_eq!(nested["city"]["name"], "City 3");
        assert_eq!(nested["city"]["state"], json!({ "id": 5, "name": "State 5" }));
        assert_eq!(nested["friends"], json!([]));
    }
}
