use thiserror::Error;

/// Domain errors raised by the category tree and the association engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CategoryError {
    /// A referenced category (or entity) does not exist or is soft-deleted.
    #[error("Category not found: {0}")]
    NotFound(String),

    /// Identifier input that cannot be resolved (mixed element kinds, nested lists).
    #[error("Invalid category reference: {0}")]
    InvalidReference(String),

    /// Moving `node_id` under `target_id` would make the node its own ancestor.
    #[error("Cannot move category {node_id} under {target_id}: target is the node itself or one of its descendants")]
    Cycle { node_id: i64, target_id: i64 },

    /// The slug is already used by another category.
    #[error("Slug '{0}' is already taken")]
    DuplicateSlug(String),

    /// Range arithmetic would overflow the 64-bit numbering space.
    #[error("Nested set capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// The storage engine refused the transaction because of a concurrent writer.
    #[error("Concurrent modification conflict: {0}")]
    ConcurrencyConflict(String),

    /// A soft-deleted category cannot be restored while its parent is still deleted.
    #[error("Cannot restore category {0}: its parent is deleted")]
    ParentDeleted(i64),
}

impl CategoryError {
    pub fn not_found(id: i64) -> Self {
        CategoryError::NotFound(format!("id {}", id))
    }
}
