//! Variable store
//!
//! Name to value map backing placeholder expansion, kept in definition order.

use indexmap::IndexMap;
use modlink_config::Config;

/// Variable bound to the package name of the application being processed
pub const PACKAGE_VARIABLE: &str = "Package";

/// Variables available to path templates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableStore {
    vars: IndexMap<String, String>,
}

impl VariableStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Populate from `library_path` followed by `RollBacks`
    pub fn from_config(config: &Config) -> Self {
        Self {
            vars: config.variables(),
        }
    }

    /// Look up a variable
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Whether a variable is defined
    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Define or replace a variable, returning the previous value
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.vars.insert(name.into(), value.into())
    }

    /// Remove a variable, returning its value
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.vars.shift_remove(name)
    }

    /// Number of defined variables
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Whether no variables are defined
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Variable names, sorted
    pub fn names_sorted(&self) -> Vec<String> {
        let mut names: Vec<String> = self.vars.keys().cloned().collect();
        names.sort();
        names
    }

    /// Iterate in definition order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The underlying map
    pub fn as_map(&self) -> &IndexMap<String, String> {
        &self.vars
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for VariableStore {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_from_config_merges_rollbacks() {
        let config = Config::from_toml_str(
            r#"
[library_path]
base_path_library = "/lib"

[RollBacks]
base_path_rollbacks = "/rb"
"#,
        )
        .unwrap();
        let store = VariableStore::from_config(&config);
        assert_eq!(store.get("base_path_library"), Some("/lib"));
        assert_eq!(store.get("base_path_rollbacks"), Some("/rb"));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_insert_and_remove_round_trip() {
        let mut store: VariableStore = [("b", "2"), ("a", "1")].into_iter().collect();
        assert_eq!(store.insert(PACKAGE_VARIABLE, "pkg"), None);
        assert!(store.contains(PACKAGE_VARIABLE));
        assert_eq!(store.remove(PACKAGE_VARIABLE).as_deref(), Some("pkg"));
        assert!(!store.contains(PACKAGE_VARIABLE));

        // Definition order survives removal
        let order: Vec<_> = store.iter().map(|(k, _)| k).collect();
        assert_eq!(order, vec!["b", "a"]);
        assert_eq!(store.names_sorted(), vec!["a", "b"]);
    }
}
