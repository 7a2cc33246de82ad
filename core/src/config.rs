//! Path configuration for an `EntityService`.
//!
//! A service has a `base_path` (e.g. `1/users`) and optional per-operation
//! overrides. Overrides for single-resource operations may contain an
//! `{id}` placeholder; an override without one is used verbatim.

use serde::{Deserialize, Serialize};

/// Placeholder replaced by the resource id in path overrides.
pub const ID_PLACEHOLDER: &str = "{id}";

/// Per-operation path overrides. Unset entries fall back to the defaults
/// derived from `ServiceConfig::base_path`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicePaths {
    pub create: Option<String>,
    pub list: Option<String>,
    pub fetch: Option<String>,
    pub update: Option<String>,
    pub delete: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub base_path: String,
    #[serde(default)]
    pub paths: ServicePaths,
}

impl ServiceConfig {
    pub fn new(base_path: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            paths: ServicePaths::default(),
        }
    }

    pub fn with_paths(mut self, paths: ServicePaths) -> Self {
        self.paths = paths;
        self
    }

    /// Load from JSON such as
    /// `{ "base_path": "1/users", "paths": { "update": "1/users/{id}/profile" } }`.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_has_no_overrides() {
        let config = ServiceConfig::new("1/users");
        assert_eq!(config.base_path, "1/users");
        assert_eq!(config.paths, ServicePaths::default());
    }

    #[test]
    fn loads_from_json() {
        let config = ServiceConfig::from_json_str(
            r#"{ "base_path": "1/users", "paths": { "update": "1/users/{id}/profile", "list": "1/people" } }"#,
        )
        .unwrap();

        assert_eq!(config.paths.update.as_deref(), Some("1/users/{id}/profile"));
        assert_eq!(config.paths.list.as_deref(), Some("1/people"));
        assert!(config.paths.create.is_none());
        assert!(config.paths.delete.is_none());
    }

    #[test]
    fn paths_are_optional_in_json() {
        let config = ServiceConfig::from_json_str(r#"{ "base_path": "notes" }"#).unwrap();
        assert_eq!(config, ServiceConfig::new("notes"));
    }

    #[test]
    fn base_path_is_required() {
        assert!(ServiceConfig::from_json_str(r#"{ "paths": {} }"#).is_err());
    }
}
