//! Domain models for the category tree.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::nested_set::NodeRange;

/// Per-locale text (`locale -> text`), stored as a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalizedText(BTreeMap<String, String>);

impl LocalizedText {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Text for a single locale.
    pub fn single(locale: impl Into<String>, text: impl Into<String>) -> Self {
        let mut map = BTreeMap::new();
        map.insert(locale.into(), text.into());
        Self(map)
    }

    pub fn insert(&mut self, locale: impl Into<String>, text: impl Into<String>) {
        self.0.insert(locale.into(), text.into());
    }

    pub fn get(&self, locale: &str) -> Option<&str> {
        self.0.get(locale).map(String::as_str)
    }

    /// Text in `locale`, falling back to `fallback_locale`, then to the first stored locale.
    pub fn translate(&self, locale: &str, fallback_locale: &str) -> Option<&str> {
        self.get(locale)
            .or_else(|| self.get(fallback_locale))
            .or_else(|| self.0.values().next().map(String::as_str))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn map_values(self, mut f: impl FnMut(String) -> String) -> Self {
        Self(self.0.into_iter().map(|(k, v)| (k, f(v))).collect())
    }
}

impl FromIterator<(String, String)> for LocalizedText {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A node of the category tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i64,
    pub slug: String,
    pub name: LocalizedText,
    pub description: Option<LocalizedText>,
    pub left: i64,
    pub right: i64,
    pub parent_id: Option<i64>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub deleted_at: Option<NaiveDateTime>,
}

impl Category {
    pub fn range(&self) -> NodeRange {
        NodeRange::new(self.left, self.right)
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_leaf(&self) -> bool {
        self.right - self.left == 1
    }

    pub fn is_trashed(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Number of descendants, live or trashed, derived from the range width.
    pub fn descendant_count(&self) -> i64 {
        self.range().descendant_count()
    }

    pub fn name_in(&self, locale: &str, fallback_locale: &str) -> Option<&str> {
        self.name.translate(locale, fallback_locale)
    }
}

/// Data for creating a new category node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCategory {
    pub parent_id: Option<i64>,
    pub name: LocalizedText,
    pub description: Option<LocalizedText>,
    /// Explicit slug; derived from the name when absent.
    pub slug: Option<String>,
}

impl NewCategory {
    pub fn named(locale: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: LocalizedText::single(locale, name),
            ..Default::default()
        }
    }

    pub fn with_parent(mut self, parent_id: i64) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    pub fn with_description(mut self, description: LocalizedText) -> Self {
        self.description = Some(description);
        self
    }
}

/// How the slug of a new node was obtained.
///
/// Derived slugs get a numeric suffix when taken; explicit slugs fail instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlugRequest {
    Explicit(String),
    /// Suffixed slugs are shortened to stay within `max_length` characters.
    Derived { base: String, max_length: usize },
}

impl SlugRequest {
    pub fn as_str(&self) -> &str {
        match self {
            SlugRequest::Explicit(s) | SlugRequest::Derived { base: s, .. } => s,
        }
    }
}

/// A validated node ready for insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryInsert {
    pub parent_id: Option<i64>,
    pub name: LocalizedText,
    pub description: Option<LocalizedText>,
    pub slug: SlugRequest,
}

/// Rename data. `None` fields are left untouched; an empty description clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryUpdate {
    pub name: Option<LocalizedText>,
    pub description: Option<LocalizedText>,
    pub slug: Option<String>,
}

/// A materialized subtree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTreeNode {
    pub category: Category,
    pub children: Vec<CategoryTreeNode>,
}

impl CategoryTreeNode {
    pub fn leaf(category: Category) -> Self {
        Self {
            category,
            children: Vec::new(),
        }
    }

    /// Total number of nodes in this subtree, including this one.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(CategoryTreeNode::size).sum::<usize>()
    }
}
