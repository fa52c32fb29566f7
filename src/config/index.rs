//! Index configuration: which indexes a segment carries and their kind.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SegmergeError};
use crate::index::geohash::GEO_STEP_MAX;

/// Kind of an index and its kind-specific settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IndexType {
    /// Term postings.
    Text,
    /// Geohash cell postings at a fixed step (bits per axis).
    Spatial { resolution: u8 },
}

/// Configuration of one index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    pub name: String,
    #[serde(flatten)]
    pub index_type: IndexType,
}

impl IndexConfig {
    pub fn text<S: Into<String>>(name: S) -> Self {
        IndexConfig {
            name: name.into(),
            index_type: IndexType::Text,
        }
    }

    pub fn spatial<S: Into<String>>(name: S, resolution: u8) -> Self {
        IndexConfig {
            name: name.into(),
            index_type: IndexType::Spatial { resolution },
        }
    }

    pub fn check(&self) -> Result<()> {
        if self.name.is_empty() || self.name.contains('/') {
            return Err(SegmergeError::schema(format!(
                "Invalid index name '{}'",
                self.name
            )));
        }
        match self.index_type {
            IndexType::Spatial { resolution }
                if !(1..=GEO_STEP_MAX).contains(&(resolution as usize)) =>
            {
                Err(SegmergeError::schema(format!(
                    "Spatial index '{}' resolution {resolution} not in 1..={GEO_STEP_MAX}",
                    self.name
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Ordered set of index configs with unique names.
#[derive(Debug, Clone, Default)]
pub struct IndexSchema {
    indexes: Vec<IndexConfig>,
    by_name: HashMap<String, usize>,
}

impl IndexSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON array, validating every entry.
    pub fn from_json(json: &str) -> Result<Self> {
        let configs: Vec<IndexConfig> = serde_json::from_str(json)?;
        let mut schema = IndexSchema::new();
        for config in configs {
            schema.add_index(config)?;
        }
        Ok(schema)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.indexes)?)
    }

    pub fn add_index(&mut self, config: IndexConfig) -> Result<()> {
        config.check()?;
        if self.by_name.contains_key(&config.name) {
            return Err(SegmergeError::schema(format!(
                "Duplicate index '{}'",
                config.name
            )));
        }

        self.by_name.insert(config.name.clone(), self.indexes.len());
        self.indexes.push(config);
        Ok(())
    }

    pub fn index(&self, name: &str) -> Option<&IndexConfig> {
        self.by_name.get(name).map(|&i| &self.indexes[i])
    }

    pub fn indexes(&self) -> &[IndexConfig] {
        &self.indexes
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }
}
