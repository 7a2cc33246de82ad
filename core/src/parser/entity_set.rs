//! Insertion-ordered set of parsed entities keyed by `(type, id)`.

use std::collections::HashMap;

use serde_json::Value;

use crate::types::ParsedEntity;

/// Collects related entities while walking a nested response.
///
/// Adding an entity whose `(type, id)` is already present replaces the
/// stored one in place, so the last write wins and no duplicate appears.
#[derive(Debug, Clone, Default)]
pub struct ParsedEntitySet {
    entities: Vec<ParsedEntity>,
    index: HashMap<(String, String), usize>,
}

impl ParsedEntitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, entity: ParsedEntity) -> &mut Self {
        let key = key_for(&entity);
        match self.index.get(&key) {
            Some(&position) => self.entities[position] = entity,
            None => {
                self.index.insert(key, self.entities.len());
                self.entities.push(entity);
            }
        }
        self
    }

    pub fn merge(&mut self, other: ParsedEntitySet) -> &mut Self {
        for entity in other.entities {
            self.add(entity);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn into_values(self) -> Vec<ParsedEntity> {
        self.entities
    }
}

// "5" and 5 share a key.
fn key_for(entity: &ParsedEntity) -> (String, String) {
    let id = match entity.id() {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    };
    (entity.entity_type.clone(), id)
}
