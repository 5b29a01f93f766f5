//! Models for category associations of polymorphic entities.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::categories::Category;

/// The owning side of an association: an entity id within an entity type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRef {
    pub id: String,
    pub entity_type: String,
}

impl EntityRef {
    pub fn new(id: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            entity_type: entity_type.into(),
        }
    }
}

/// Anything that carries a category id.
pub trait HasCategoryId {
    fn category_id(&self) -> i64;
}

impl HasCategoryId for Category {
    fn category_id(&self) -> i64 {
        self.id
    }
}

/// A category reference as supplied by callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CategoryRef {
    Id(i64),
    Slug(String),
    /// An already loaded model, identified by its id.
    Model(i64),
    List(Vec<CategoryRef>),
}

impl CategoryRef {
    pub fn model<T: HasCategoryId>(model: &T) -> Self {
        CategoryRef::Model(model.category_id())
    }

    pub fn empty() -> Self {
        CategoryRef::List(Vec::new())
    }

    pub fn ids(ids: impl IntoIterator<Item = i64>) -> Self {
        CategoryRef::List(ids.into_iter().map(CategoryRef::Id).collect())
    }

    pub fn slugs<S: Into<String>>(slugs: impl IntoIterator<Item = S>) -> Self {
        CategoryRef::List(slugs.into_iter().map(|s| CategoryRef::Slug(s.into())).collect())
    }

    pub fn models<'a, T: HasCategoryId + 'a>(models: impl IntoIterator<Item = &'a T>) -> Self {
        CategoryRef::List(models.into_iter().map(CategoryRef::model).collect())
    }

    /// Element kind name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            CategoryRef::Id(_) => "id",
            CategoryRef::Slug(_) => "slug",
            CategoryRef::Model(_) => "model",
            CategoryRef::List(_) => "list",
        }
    }
}

impl From<i64> for CategoryRef {
    fn from(id: i64) -> Self {
        CategoryRef::Id(id)
    }
}

impl From<&str> for CategoryRef {
    fn from(slug: &str) -> Self {
        CategoryRef::Slug(slug.to_string())
    }
}

impl From<String> for CategoryRef {
    fn from(slug: String) -> Self {
        CategoryRef::Slug(slug)
    }
}

impl From<&Category> for CategoryRef {
    fn from(category: &Category) -> Self {
        CategoryRef::model(category)
    }
}

impl From<Vec<i64>> for CategoryRef {
    fn from(ids: Vec<i64>) -> Self {
        CategoryRef::ids(ids)
    }
}

impl From<Vec<&str>> for CategoryRef {
    fn from(slugs: Vec<&str>) -> Self {
        CategoryRef::slugs(slugs)
    }
}

impl From<Vec<String>> for CategoryRef {
    fn from(slugs: Vec<String>) -> Self {
        CategoryRef::slugs(slugs)
    }
}

/// Attach/detach outcome of a sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncDelta {
    pub added: Vec<i64>,
    pub removed: Vec<i64>,
}

impl SyncDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// How `has_category` compares the requested set with the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// At least one requested category is attached.
    Any,
    /// Every requested category is attached.
    All,
    /// The attached set is exactly the requested set.
    Exact,
}

/// Scope over the candidate entities of one type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "categoryIds", rename_all = "snake_case")]
pub enum CategorizableFilter {
    /// Attached to every listed category.
    WithAll(Vec<i64>),
    /// Attached to at least one listed category.
    WithAny(Vec<i64>),
    /// Attached to none of the listed categories.
    Without(Vec<i64>),
    /// Not attached to any live category.
    WithoutAny,
}

impl CategorizableFilter {
    pub fn category_ids(&self) -> &[i64] {
        match self {
            CategorizableFilter::WithAll(ids)
            | CategorizableFilter::WithAny(ids)
            | CategorizableFilter::Without(ids) => ids,
            CategorizableFilter::WithoutAny => &[],
        }
    }

    /// Result for an empty id list, where no sub-query is needed.
    ///
    /// `WithAll([])` and `Without([])` keep every candidate, `WithAny([])`
    /// keeps none. `WithoutAny` always needs the store.
    pub fn empty_outcome(&self) -> Option<bool> {
        match self {
            CategorizableFilter::WithAll(ids) | CategorizableFilter::Without(ids)
                if ids.is_empty() =>
            {
                Some(true)
            }
            CategorizableFilter::WithAny(ids) if ids.is_empty() => Some(false),
            _ => None,
        }
    }

    /// Evaluates the filter against one entity's attached ids.
    pub fn matches(&self, attached: &HashSet<i64>) -> bool {
        if let Some(outcome) = self.empty_outcome() {
            return outcome;
        }
        match self {
            CategorizableFilter::WithAll(ids) => ids.iter().all(|id| attached.contains(id)),
            CategorizableFilter::WithAny(ids) => ids.iter().any(|id| attached.contains(id)),
            CategorizableFilter::Without(ids) => !ids.iter().any(|id| attached.contains(id)),
            CategorizableFilter::WithoutAny => attached.is_empty(),
        }
    }
}

/// Attach/detach delta between the current ids and the requested ids.
///
/// `added` keeps the order of `requested`; `removed` keeps the order of
/// `current` and is empty unless `detaching`.
pub fn compute_sync_delta(current: &[i64], requested: &[i64], detaching: bool) -> SyncDelta {
    let current_set: HashSet<i64> = current.iter().copied().collect();
    let requested_set: HashSet<i64> = requested.iter().copied().collect();

    let mut seen = HashSet::new();
    let added = requested
        .iter()
        .copied()
        .filter(|id| !current_set.contains(id) && seen.insert(*id))
        .collect();
    let removed = if detaching {
        current
            .iter()
            .copied()
            .filter(|id| !requested_set.contains(id))
            .collect()
    } else {
        Vec::new()
    };

    SyncDelta { added, removed }
}

/// Compares `requested` with `current` under `mode`.
///
/// An empty request matches nothing in `Any` mode and everything in `All`
/// mode; in `Exact` mode it matches an entity without categories.
pub fn matches_categories(current: &[i64], requested: &[i64], mode: MatchMode) -> bool {
    let current: HashSet<i64> = current.iter().copied().collect();
    let requested: HashSet<i64> = requested.iter().copied().collect();
    match mode {
        MatchMode::Any => !requested.is_disjoint(&current),
        MatchMode::All => requested.is_subset(&current),
        MatchMode::Exact => requested == current,
    }
}
