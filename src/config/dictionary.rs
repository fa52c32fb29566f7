//! Dictionary schema: named word dictionaries referenced by indexes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SegmergeError};

/// A named dictionary definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictionaryConfig {
    /// Dictionary name, unique within a schema.
    pub name: String,
    /// Dictionary words, in configuration order.
    #[serde(default)]
    pub content: Vec<String>,
}

impl DictionaryConfig {
    /// Create a new dictionary config.
    pub fn new<S: Into<String>>(name: S, content: Vec<String>) -> Self {
        DictionaryConfig {
            name: name.into(),
            content,
        }
    }

    /// Compare with another config, naming the first differing attribute.
    pub fn check_equal(&self, other: &DictionaryConfig) -> Result<()> {
        if self.name != other.name {
            return Err(SegmergeError::mismatch(
                "dictionary.name",
                format!("'{}' vs '{}'", self.name, other.name),
            ));
        }
        if self.content != other.content {
            return Err(SegmergeError::mismatch(
                format!("dictionary[{}].content", self.name),
                format!(
                    "{} words vs {} words",
                    self.content.len(),
                    other.content.len()
                ),
            ));
        }
        Ok(())
    }
}

/// Mapping from dictionary name to [`DictionaryConfig`].
///
/// Iteration follows insertion order.
#[derive(Debug, Clone, Default)]
pub struct DictionarySchema {
    configs: HashMap<String, DictionaryConfig>,
    names: Vec<String>,
}

impl DictionarySchema {
    /// Create an empty dictionary schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON array of dictionary configs.
    pub fn from_json(json: &str) -> Result<Self> {
        let configs: Vec<DictionaryConfig> = serde_json::from_str(json)?;
        let mut schema = DictionarySchema::new();
        for config in configs {
            schema.add_dictionary_config(config)?;
        }
        Ok(schema)
    }

    /// Serialize to a JSON array in iteration order.
    pub fn to_json(&self) -> Result<String> {
        let configs: Vec<_> = self.iter().collect();
        Ok(serde_json::to_string_pretty(&configs)?)
    }

    /// Insert a dictionary. A name that is already present is rejected.
    pub fn add_dictionary_config(&mut self, config: DictionaryConfig) -> Result<()> {
        if config.name.is_empty() {
            return Err(SegmergeError::schema("Dictionary name cannot be empty"));
        }
        if self.configs.contains_key(&config.name) {
            return Err(SegmergeError::schema(format!(
                "Duplicate dictionary '{}'",
                config.name
            )));
        }

        self.names.push(config.name.clone());
        self.configs.insert(config.name.clone(), config);
        Ok(())
    }

    /// Look up a dictionary by name.
    pub fn dictionary_config(&self, name: &str) -> Option<&DictionaryConfig> {
        self.configs.get(name)
    }

    /// Iterate dictionaries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &DictionaryConfig> {
        self.names.iter().filter_map(|name| self.configs.get(name))
    }

    /// Number of dictionaries.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Check if there are no dictionaries.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Require both schemas to hold exactly the same dictionaries.
    pub fn assert_equal(&self, other: &DictionarySchema) -> Result<()> {
        if self.len() != other.len() {
            return Err(SegmergeError::mismatch(
                "dictionaries.count",
                format!("{} vs {}", self.len(), other.len()),
            ));
        }
        self.assert_contained_in(other)
    }

    /// Require every dictionary here to exist unchanged in `other`.
    ///
    /// `other` may add new dictionaries.
    pub fn assert_compatible(&self, other: &DictionarySchema) -> Result<()> {
        if self.len() > other.len() {
            return Err(SegmergeError::mismatch(
                "dictionaries.count",
                format!(
                    "{} dictionaries cannot be narrowed to {}",
                    self.len(),
                    other.len()
                ),
            ));
        }
        self.assert_contained_in(other)
    }

    fn assert_contained_in(&self, other: &DictionarySchema) -> Result<()> {
        for config in self.iter() {
            match other.dictionary_config(&config.name) {
                Some(other_config) => config.check_equal(other_config)?,
                None => {
                    return Err(SegmergeError::mismatch(
                        format!("dictionary[{}]", config.name),
                        "missing from other schema",
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(|w| w.to_string()).collect()
    }

    fn schema_with(dicts: &[(&str, &[&str])]) -> DictionarySchema {
        let mut schema = DictionarySchema::new();
        for (name, content) in dicts {
            schema
                .add_dictionary_config(DictionaryConfig::new(*name, words(content)))
                .unwrap();
        }
        schema
    }

    #[test]
    fn test_add_and_get() {
        let schema = schema_with(&[("stop", &["a", "the"]), ("brand", &["acme"])]);

        assert_eq!(schema.len(), 2);
        assert_eq!(
            schema.dictionary_config("brand").unwrap().content,
            words(&["acme"])
        );
        assert!(schema.dictionary_config("unknown").is_none());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut schema = schema_with(&[("stop", &["a"])]);
        let result = schema.add_dictionary_config(DictionaryConfig::new("stop", words(&["b"])));

        assert!(matches!(result, Err(SegmergeError::Schema(_))));
        // The original entry is untouched.
        assert_eq!(
            schema.dictionary_config("stop").unwrap().content,
            words(&["a"])
        );
        assert_eq!(schema.len(), 1);
    }

    #[test]
    fn test_iteration_in_insertion_order() {
        let schema = schema_with(&[("zeta", &[]), ("alpha", &[]), ("mid", &[])]);
        let names: Vec<_> = schema.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_assert_equal() {
        let a = schema_with(&[("stop", &["a"]), ("brand", &["acme"])]);
        let b = schema_with(&[("brand", &["acme"]), ("stop", &["a"])]);
        a.assert_equal(&b).unwrap();

        let c = schema_with(&[("stop", &["a", "an"]), ("brand", &["acme"])]);
        match a.assert_equal(&c) {
            Err(SegmergeError::SchemaMismatch { field, .. }) => {
                assert_eq!(field, "dictionary[stop].content")
            }
            other => panic!("unexpected result: {other:?}"),
        }

        let d = schema_with(&[("stop", &["a"])]);
        assert!(a.assert_equal(&d).is_err());
    }

    #[test]
    fn test_assert_compatible_allows_additions() {
        let old = schema_with(&[("stop", &["a"])]);
        let new = schema_with(&[("stop", &["a"]), ("brand", &["acme"])]);

        old.assert_compatible(&new).unwrap();
        assert!(new.assert_compatible(&old).is_err());

        let changed = schema_with(&[("stop", &["b"]), ("brand", &[])]);
        assert!(old.assert_compatible(&changed).is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let json = r#"[
            {"name": "stop", "content": ["a", "the"]},
            {"name": "brand"}
        ]"#;
        let schema = DictionarySchema::from_json(json).unwrap();
        assert_eq!(schema.len(), 2);
        assert!(schema.dictionary_config("brand").unwrap().content.is_empty());

        let reloaded = DictionarySchema::from_json(&schema.to_json().unwrap()).unwrap();
        schema.assert_equal(&reloaded).unwrap();

        let duplicated = r#"[{"name": "x"}, {"name": "x"}]"#;
        assert!(DictionarySchema::from_json(duplicated).is_err());
    }
}
