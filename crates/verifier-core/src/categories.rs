//! Civic issue categories and the keywords that count as evidence for each.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{VerifyError, VerifyResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Category {
    Pothole,
    Garbage,
    Streetlight,
    Flood,
    Traffic,
    Vandalism,
    Other,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Pothole,
        Category::Garbage,
        Category::Streetlight,
        Category::Flood,
        Category::Traffic,
        Category::Vandalism,
        Category::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Pothole => "POTHOLE",
            Category::Garbage => "GARBAGE",
            Category::Streetlight => "STREETLIGHT",
            Category::Flood => "FLOOD",
            Category::Traffic => "TRAFFIC",
            Category::Vandalism => "VANDALISM",
            Category::Other => "OTHER",
        }
    }

    /// Canonicalize a free-text label: trimmed, uppercased. `None` if not in the closed set.
    pub fn parse(label: &str) -> Option<Category> {
        let canonical = label.trim().to_uppercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == canonical)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::parse(s).ok_or_else(|| format!("Unknown category: {s}"))
    }
}

/// Immutable category → keyword mapping, built once and shared read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryVocabulary {
    keywords: HashMap<Category, Vec<String>>,
}

impl CategoryVocabulary {
    pub fn builtin() -> Self {
        let table: [(Category, &[&str]); 7] = [
            (
                Category::Pothole,
                &["pothole", "road", "asphalt", "street", "pavement", "crack"],
            ),
            (
                Category::Garbage,
                &["garbage", "trash", "waste", "litter", "bin", "refuse"],
            ),
            (
                Category::Streetlight,
                &["streetlight", "lamp", "light", "pole", "illumination"],
            ),
            (
                Category::Flood,
                &["flood", "water", "puddle", "rain", "drainage"],
            ),
            (
                Category::Traffic,
                &["traffic", "sign", "signal", "car", "vehicle", "road"],
            ),
            (
                Category::Vandalism,
                &["graffiti", "damage", "broken", "vandalism"],
            ),
            (Category::Other, &["other", "miscellaneous", "general"]),
        ];

        let keywords = table
            .into_iter()
            .map(|(cat, words)| (cat, words.iter().map(|w| w.to_string()).collect()))
            .collect();
        Self { keywords }
    }

    /// Build from an explicit mapping. Keywords are trimmed and lowercased; blanks dropped.
    pub fn from_map(map: HashMap<Category, Vec<String>>) -> Self {
        let keywords = map
            .into_iter()
            .map(|(cat, words)| {
                let words = words
                    .iter()
                    .map(|w| w.trim().to_lowercase())
                    .filter(|w| !w.is_empty())
                    .collect();
                (cat, words)
            })
            .collect();
        Self { keywords }
    }

    /// Keywords for a category; empty when the mapping has none.
    pub fn keywords(&self, category: Category) -> &[String] {
        self.keywords
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn contains(&self, category: Category) -> bool {
        self.keywords.contains_key(&category)
    }

    /// Categories present in this vocabulary, in declaration order.
    pub fn categories(&self) -> Vec<Category> {
        Category::ALL
            .into_iter()
            .filter(|c| self.keywords.contains_key(c))
            .collect()
    }
}

impl Default for CategoryVocabulary {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Serialize for CategoryVocabulary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let categories = self.categories();
        let mut map = serializer.serialize_map(Some(categories.len()))?;
        for cat in categories {
            map.serialize_entry(cat.as_str(), self.keywords(cat))?;
        }
        map.end()
    }
}

/// Load a vocabulary from a JSON object of `"CATEGORY": ["keyword", ...]`.
pub fn load_vocabulary(path: &Path) -> VerifyResult<CategoryVocabulary> {
    let data = fs::read_to_string(path)?;
    let map: HashMap<Category, Vec<String>> = serde_json::from_str(&data)
        .map_err(|e| VerifyError::Config(format!("{}: {e}", path.display())))?;
    Ok(CategoryVocabulary::from_map(map))
}
