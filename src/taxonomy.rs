//! Category taxonomy reference data
//!
//! The taxonomy is maintained outside this crate (an editor writes it as
//! YAML). Here it is only read: rendered into the classification prompt and
//! consulted to count labels the model invented.

use crate::error::ClassifierError;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::Path};

/// Category → subcategories, plus the allowed sentiment type labels
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Taxonomy {
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_categories")]
    pub categories: BTreeMap<String, Vec<String>>,
}

/// Both layouts the category editor has written over time
#[derive(Deserialize)]
#[serde(untagged)]
enum CategoryEntry {
    List(Vec<String>),
    Nested {
        #[serde(default)]
        subcategories: Vec<String>,
    },
}

fn deserialize_categories<'de, D>(deserializer: D) -> Result<BTreeMap<String, Vec<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: BTreeMap<String, Option<CategoryEntry>> = BTreeMap::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(name, entry)| {
            let subcategories = match entry {
                Some(CategoryEntry::List(list)) => list,
                Some(CategoryEntry::Nested { subcategories }) => subcategories,
                None => Vec::new(),
            };
            (name, subcategories)
        })
        .collect())
}

impl Taxonomy {
    /// Parse taxonomy YAML
    pub fn from_yaml(content: &str) -> Result<Self, ClassifierError> {
        let taxonomy: Taxonomy = serde_yaml::from_str(content).map_err(|e| {
            ClassifierError::Configuration(format!("Failed to parse taxonomy: {e}"))
        })?;
        taxonomy.validate()?;
        Ok(taxonomy)
    }

    /// Load taxonomy from a YAML file
    ///
    /// A missing or empty taxonomy is a fatal configuration error: without it
    /// the model has no label vocabulary to choose from.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ClassifierError::Configuration(format!(
                "Failed to read taxonomy file '{}': {e}",
                path.display()
            ))
        })?;
        let taxonomy = Self::from_yaml(&content)?;
        log::debug!(
            "Loaded taxonomy from {}: {} categories, {} subcategories, {} types",
            path.display(),
            taxonomy.categories.len(),
            taxonomy.subcategory_count(),
            taxonomy.types.len()
        );
        Ok(taxonomy)
    }

    fn validate(&self) -> Result<(), ClassifierError> {
        if self.categories.is_empty() {
            return Err(ClassifierError::Configuration(
                "Taxonomy defines no categories".to_string(),
            ));
        }
        if self.types.is_empty() {
            return Err(ClassifierError::Configuration(
                "Taxonomy defines no sentiment types".to_string(),
            ));
        }
        Ok(())
    }

    pub fn subcategory_count(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }

    /// Whether the category (and subcategory, when non-empty) appear in the taxonomy
    pub fn contains(&self, category: &str, subcategory: &str) -> bool {
        match self.categories.get(category) {
            Some(subs) => subcategory.is_empty() || subs.iter().any(|s| s == subcategory),
            None => false,
        }
    }

    /// Plain-text listing embedded in the system prompt
    pub fn render_reference(&self) -> String {
        let mut out = String::from("Allowed types: ");
        out.push_str(&self.types.join(", "));
        out.push_str("\n\nCategories and subcategories:\n");
        for (category, subcategories) in &self.categories {
            out.push_str("- ");
            out.push_str(category);
            out.push_str(": ");
            out.push_str(&subcategories.join(", "));
            out.push('\n');
        }
        out
    }
}
