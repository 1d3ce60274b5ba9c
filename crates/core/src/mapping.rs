//! Static category → item-code table.
//!
//! Parsed from TOML:
//!
//! ```toml
//! fallback = "misc"
//!
//! [categories.important]
//! codes = ["app-perftracker:neuro-tasks"]
//! ordering = 1
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ShelfError;

/// Codes belonging to one category and its position key in the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryConfig {
    #[serde(default)]
    pub codes: Vec<String>,
    pub ordering: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MappingFile {
    #[serde(default = "default_fallback")]
    fallback: String,
    #[serde(default)]
    categories: BTreeMap<String, CategoryConfig>,
}

fn default_fallback() -> String {
    "misc".into()
}

/// Read-only mapping shared by one scheduler for its whole lifetime.
#[derive(Debug, Clone)]
pub struct CategoryMapping {
    categories: BTreeMap<String, CategoryConfig>,
    fallback: String,
    code_index: HashMap<String, String>,
}

impl CategoryMapping {
    /// Build and validate a mapping.
    ///
    /// A code may belong to at most one category, and no configured
    /// category may share the fallback's name.
    pub fn new(
        categories: BTreeMap<String, CategoryConfig>,
        fallback: impl Into<String>,
    ) -> Result<Self, ShelfError> {
        let fallback = fallback.into();
        if fallback.trim().is_empty() {
            return Err(ShelfError::Validation("fallback category name is empty".into()));
        }
        if categories.contains_key(&fallback) {
            return Err(ShelfError::Validation(format!(
                "category '{fallback}' collides with the fallback category"
            )));
        }

        let mut code_index = HashMap::new();
        for (name, config) in &categories {
            for code in &config.codes {
                if let Some(previous) = code_index.insert(code.clone(), name.clone()) {
                    return Err(ShelfError::Validation(format!(
                        "code '{code}' is mapped to both '{previous}' and '{name}'"
                    )));
                }
            }
        }

        Ok(Self {
            categories,
            fallback,
            code_index,
        })
    }

    /// Parse a mapping from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ShelfError> {
        let file: MappingFile = toml::from_str(toml_str)?;
        Self::new(file.categories, file.fallback)
    }

    /// Load a mapping from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ShelfError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Category owning `code`, if any.
    pub fn category_of(&self, code: &str) -> Option<&str> {
        self.code_index.get(code).map(String::as_str)
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    /// Configured names by ascending ordering key; ties by ascending name.
    pub fn ordered_names(&self) -> Vec<String> {
        let mut names: Vec<(&i64, &String)> = self
            .categories
            .iter()
            .map(|(name, config)| (&config.ordering, name))
            .collect();
        names.sort();
        names.into_iter().map(|(_, name)| name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}
