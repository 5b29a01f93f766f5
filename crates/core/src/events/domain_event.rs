//! Domain event types.

use serde::{Deserialize, Serialize};

use crate::categorizables::EntityRef;

/// Domain events emitted by the services around mutations.
///
/// Tree events are emitted after a successful commit. Association mutations
/// emit a before/after pair: the `*ing` event carries the requested ids, the
/// `*ed` event carries the ids that actually changed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A category node was created.
    CategoryCreated {
        category_id: i64,
        parent_id: Option<i64>,
    },

    /// Name, description or slug of a category changed.
    CategoryUpdated { category_id: i64 },

    /// A subtree was moved under another parent (or to the top level).
    CategoryMoved {
        category_id: i64,
        old_parent_id: Option<i64>,
        new_parent_id: Option<i64>,
    },

    /// Categories were removed for good.
    CategoriesDeleted { category_ids: Vec<i64> },

    /// Categories were soft-deleted.
    CategoriesTrashed { category_ids: Vec<i64> },

    /// Soft-deleted categories were brought back.
    CategoriesRestored { category_ids: Vec<i64> },

    /// About to attach categories to an entity.
    Associating {
        entity: EntityRef,
        category_ids: Vec<i64>,
    },

    /// Categories were attached to an entity.
    Associated {
        entity: EntityRef,
        category_ids: Vec<i64>,
    },

    /// About to detach categories from an entity. `None` means all of them.
    Detaching {
        entity: EntityRef,
        category_ids: Option<Vec<i64>>,
    },

    /// Categories were detached from an entity.
    Detached {
        entity: EntityRef,
        category_ids: Vec<i64>,
    },
}

impl DomainEvent {
    pub fn category_created(category_id: i64, parent_id: Option<i64>) -> Self {
        Self::CategoryCreated {
            category_id,
            parent_id,
        }
    }

    pub fn category_updated(category_id: i64) -> Self {
        Self::CategoryUpdated { category_id }
    }

    pub fn category_moved(
        category_id: i64,
        old_parent_id: Option<i64>,
        new_parent_id: Option<i64>,
    ) -> Self {
        Self::CategoryMoved {
            category_id,
            old_parent_id,
            new_parent_id,
        }
    }

    pub fn categories_deleted(category_ids: Vec<i64>) -> Self {
        Self::CategoriesDeleted { category_ids }
    }

    pub fn categories_trashed(category_ids: Vec<i64>) -> Self {
        Self::CategoriesTrashed { category_ids }
    }

    pub fn categories_restored(category_ids: Vec<i64>) -> Self {
        Self::CategoriesRestored { category_ids }
    }

    pub fn associating(entity: EntityRef, category_ids: Vec<i64>) -> Self {
        Self::Associating {
            entity,
            category_ids,
        }
    }

    pub fn associated(entity: EntityRef, category_ids: Vec<i64>) -> Self {
        Self::Associated {
            entity,
            category_ids,
        }
    }

    pub fn detaching(entity: EntityRef, category_ids: Option<Vec<i64>>) -> Self {
        Self::Detaching {
            entity,
            category_ids,
        }
    }

    pub fn detached(entity: EntityRef, category_ids: Vec<i64>) -> Self {
        Self::Detached {
            entity,
            category_ids,
        }
    }

    /// Dotted event name, e.g. `category.created`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CategoryCreated { .. } => "category.created",
            Self::CategoryUpdated { .. } => "category.updated",
            Self::CategoryMoved { .. } => "category.moved",
            Self::CategoriesDeleted { .. } => "category.deleted",
            Self::CategoriesTrashed { .. } => "category.trashed",
            Self::CategoriesRestored { .. } => "category.restored",
            Self::Associating { .. } => "categorizable.associating",
            Self::Associated { .. } => "categorizable.associated",
            Self::Detaching { .. } => "categorizable.detaching",
            Self::Detached { .. } => "categorizable.detached",
        }
    }
}
