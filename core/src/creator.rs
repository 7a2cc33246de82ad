//! Dispatch of parsed entities to per-type stores.
//!
//! # Design
//! This layer knows nothing about what a store produces: it looks the store
//! up by entity type, hands it the attribute bag and returns whatever comes
//! back. Types with no registered store are skipped, which lets a schema
//! describe more of the response than the application cares to keep.
//! Included entities are created before `data` so stores can resolve
//! relationship ids against them.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use crate::types::{Data, EntityAttributes, ParsedEntity, ParsedResponse};

/// Turns an attribute bag into a domain object of type `T`.
///
/// Stores may use creation as an upsert into their own storage, so
/// `create` takes `&self` and implementations use interior mutability.
pub trait EntityStore<T>: Send + Sync {
    fn create(&self, attributes: &EntityAttributes) -> T;
}

impl<T, F> EntityStore<T> for F
where
    F: Fn(&EntityAttributes) -> T + Send + Sync,
{
    fn create(&self, attributes: &EntityAttributes) -> T {
        self(attributes)
    }
}

/// Looks up the store responsible for an entity type.
pub trait StoreRegistry<T>: Send + Sync {
    fn get_store(&self, entity_type: &str) -> Option<&dyn EntityStore<T>>;
}

impl<T, R> StoreRegistry<T> for Arc<R>
where
    R: StoreRegistry<T> + ?Sized,
{
    fn get_store(&self, entity_type: &str) -> Option<&dyn EntityStore<T>> {
        (**self).get_store(entity_type)
    }
}

/// A `StoreRegistry` backed by a map from entity type to store.
pub struct Stores<T> {
    stores: HashMap<String, Box<dyn EntityStore<T>>>,
}

impl<T> Stores<T> {
    pub fn new() -> Self {
        Self {
            stores: HashMap::new(),
        }
    }

    pub fn register<S>(mut self, entity_type: impl Into<String>, store: S) -> Self
    where
        S: EntityStore<T> + 'static,
    {
        self.insert(entity_type, store);
        self
    }

    pub fn insert<S>(&mut self, entity_type: impl Into<String>, store: S)
    where
        S: EntityStore<T> + 'static,
    {
        self.stores.insert(entity_type.into(), Box::new(store));
    }
}

impl<T> Default for Stores<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> StoreRegistry<T> for Stores<T> {
    fn get_store(&self, entity_type: &str) -> Option<&dyn EntityStore<T>> {
        self.stores.get(entity_type).map(|store| store.as_ref())
    }
}

/// Creates domain objects from a `ParsedResponse`.
pub trait Creator<T>: Send + Sync {
    /// Returns `None` when `data` is a single entity without a store. A
    /// collection always yields `Some(Data::Many(..))`, possibly empty.
    fn create(&self, parsed: &ParsedResponse) -> Option<Data<T>>;
}

/// The default `Creator`, dispatching through a `StoreRegistry`.
pub struct EntityCreator<R> {
    registry: R,
}

impl<R> EntityCreator<R> {
    pub fn new(registry: R) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    fn create_entity<T>(&self, entity: &ParsedEntity) -> Option<T>
    where
        R: StoreRegistry<T>,
    {
        match self.registry.get_store(&entity.entity_type) {
            Some(store) => Some(store.create(&entity.attributes)),
            None => {
                trace!(entity_type = %entity.entity_type, "no store registered, skipping entity");
                None
            }
        }
    }
}

impl<T, R> Creator<T> for EntityCreator<R>
where
    R: StoreRegistry<T>,
{
    fn create(&self, parsed: &ParsedResponse) -> Option<Data<T>> {
        for entity in &parsed.included {
            let _: Option<T> = self.create_entity(entity);
        }

        match &parsed.data {
            Data::One(entity) => self.create_entity(entity).map(Data::One),
            Data::Many(entities) => Some(Data::Many(
                entities
                    .iter()
                    .filter_map(|entity| self.create_entity(entity))
                    .collect(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Model {
        User(String),
        City,
        State,
    }

    fn entity(entity_type: &str, attributes: Value) -> ParsedEntity {
        ParsedEntity::new(entity_type, attributes.as_object().cloned().unwrap())
    }

    fn user(id: i64) -> ParsedEntity {
        entity("user", json!({ "id": id, "firstName": "John", "cityId": 3 }))
    }

    fn included() -> Vec<ParsedEntity> {
        vec![
            entity("city", json!({ "id": 3, "name": "City 3", "stateId": 5 })),
            entity("state", json!({ "id": 5, "name": "State 5" })),
        ]
    }

    fn stores(log: Arc<Mutex<Vec<String>>>) -> Stores<Model> {
        let users = Arc::clone(&log);
        let cities = Arc::clone(&log);
        let states = log;
        Stores::new()
            .register("user", move |attributes: &EntityAttributes| {
                users.lock().unwrap().push("user".to_string());
                Model::User(format!("User {}", attributes["id"]))
            })
            .register("city", move |_: &EntityAttributes| {
                cities.lock().unwrap().push("city".to_string());
                Model::City
            })
            .register("state", move |_: &EntityAttributes| {
                states.lock().unwrap().push("state".to_string());
                Model::State
            })
    }

    #[test]
    fn creates_single_item_after_included() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let creator = EntityCreator::new(stores(Arc::clone(&log)));
        let parsed = ParsedResponse {
            data: Data::One(user(1)),
            included: included(),
            meta: None,
        };

        let created = creator.create(&parsed);

        assert_eq!(created, Some(Data::One(Model::User("User 1".to_string()))));
        assert_eq!(*log.lock().unwrap(), vec!["city", "state", "user"]);
    }

    #[test]
    fn passes_exact_attributes_to_the_store() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let creator = EntityCreator::new(Stores::new().register("city", move |attributes: &EntityAttributes| {
            sink.lock().unwrap().push(attributes.clone());
        }));
        let parsed = ParsedResponse {
            data: Data::Many(vec![]),
            included: included(),
            meta: None,
        };

        let _: Option<Data<()>> = creator.create(&parsed);

        assert_eq!(*seen.lock().unwrap(), vec![included()[0].attributes.clone()]);
    }

    #[test]
    fn creates_collections() {
        let creator = EntityCreator::new(stores(Arc::new(Mutex::new(Vec::new()))));
        let parsed = ParsedResponse {
            data: Data::Many(vec![user(1), user(2)]),
            included: vec![],
            meta: None,
        };

        let created = creator.create(&parsed).and_then(Data::into_many).unwrap();
        assert_eq!(
            created,
            vec![Model::User("User 1".to_string()), Model::User("User 2".to_string())]
        );
    }

    #[test]
    fn single_item_without_store_is_none() {
        let creator = EntityCreator::new(stores(Arc::new(Mutex::new(Vec::new()))));
        let parsed = ParsedResponse {
            data: Data::One(entity("album", json!({ "id": 1 }))),
            included: vec![],
            meta: None,
        };

        assert_eq!(creator.create(&parsed), None);
    }

    #[test]
    fn collection_drops_items_without_store() {
        let creator = EntityCreator::new(stores(Arc::new(Mutex::new(Vec::new()))));
        let parsed = ParsedResponse {
            data: Data::Many(vec![entity("album", json!({ "id": 1 })), user(2)]),
            included: vec![entity("photo", json!({ "id": 4 }))],
            meta: None,
        };

        let created = creator.create(&parsed).and_then(Data::into_many).unwrap();
        assert_eq!(created, vec![Model::User("User 2".to_string())]);
    }

    #[test]
    fn collection_of_only_unknown_types_is_empty() {
        let creator = EntityCreator::new(Stores::<Model>::new());
        let parsed = ParsedResponse {
            data: Data::Many(vec![entity("album", json!({ "id": 1 }))]),
            included: vec![],
            meta: None,
        };

        assert_eq!(creator.create(&parsed), Some(Data::Many(vec![])));
    }

    #[test]
    fn shared_registry_through_arc() {
        let registry = Arc::new(stores(Arc::new(Mutex::new(Vec::new()))));
        let creator = EntityCreator::new(Arc::clone(&registry));
        let parsed = ParsedResponse {
            data: Data::One(user(7)),
            included: vec![],
            meta: None,
        };

        assert_eq!(creator.create(&parsed), Some(Data::One(Model::User("User 7".to_string()))));
        assert!(registry.get_store("state").is_some());
    }
}
