//! Traits for the association store and the categorization service.

use async_trait::async_trait;

use crate::categories::Category;
use crate::Result;

use super::{CategorizableFilter, CategoryRef, EntityRef, MatchMode, SyncDelta};

/// Persistence of the category ↔ entity join table.
///
/// Associations pointing at soft-deleted categories are kept but never
/// reported by the reads.
#[async_trait]
pub trait CategorizableRepositoryTrait: Send + Sync {
    /// Ids of the live categories attached to `entity`, in tree order.
    fn category_ids_of(&self, entity: &EntityRef) -> Result<Vec<i64>>;
    /// Live categories attached to `entity`, in `left` order.
    fn categories_of(&self, entity: &EntityRef) -> Result<Vec<Category>>;
    /// Ids of the entities of `entity_type` attached to `category_id`.
    fn entities_in(&self, category_id: i64, entity_type: &str) -> Result<Vec<String>>;
    /// The subset of `candidates` matching `filter`, in candidate order.
    fn scope_entities(
        &self,
        entity_type: &str,
        candidates: &[String],
        filter: &CategorizableFilter,
    ) -> Result<Vec<String>>;

    /// Inserts the missing rows. Returns the ids actually attached.
    ///
    /// Fails with `NotFound` and writes nothing if an id is not a live category.
    async fn attach(&self, entity: &EntityRef, category_ids: &[i64]) -> Result<Vec<i64>>;
    /// Removes the given rows, or every row of the entity when `None`.
    /// Returns the ids actually detached.
    async fn detach(&self, entity: &EntityRef, category_ids: Option<&[i64]>) -> Result<Vec<i64>>;
    /// Applies the delta between the current live ids and `category_ids`
    /// in one transaction.
    async fn sync(
        &self,
        entity: &EntityRef,
        category_ids: &[i64],
        detaching: bool,
    ) -> Result<SyncDelta>;

    async fn sync_without_detaching(
        &self,
        entity: &EntityRef,
        category_ids: &[i64],
    ) -> Result<SyncDelta> {
        self.sync(entity, category_ids, false).await
    }
}

/// Public categorization operations on entities.
#[async_trait]
pub trait CategorizationServiceTrait: Send + Sync {
    fn resolve(&self, reference: &CategoryRef) -> Result<Vec<i64>>;
    fn category_ids_of(&self, entity: &EntityRef) -> Result<Vec<i64>>;
    fn categories_of(&self, entity: &EntityRef) -> Result<Vec<Category>>;
    fn entities_in(&self, category_id: i64, entity_type: &str) -> Result<Vec<String>>;
    fn has_category(
        &self,
        entity: &EntityRef,
        reference: &CategoryRef,
        mode: MatchMode,
    ) -> Result<bool>;
    /// Filters `candidates` (ids of `entity_type`) through `filter`.
    fn scope_filter(
        &self,
        entity_type: &str,
        candidates: &[String],
        filter: &CategorizableFilter,
    ) -> Result<Vec<String>>;

    /// Adds categories, keeping the existing ones.
    async fn categorize(&self, entity: &EntityRef, reference: &CategoryRef) -> Result<SyncDelta>;
    /// Replaces the categories; an empty reference clears them.
    async fn recategorize(&self, entity: &EntityRef, reference: &CategoryRef)
        -> Result<SyncDelta>;
    async fn uncategorize(&self, entity: &EntityRef, reference: &CategoryRef)
        -> Result<Vec<i64>>;
    /// Drops every association of the entity.
    async fn uncategorize_all(&self, entity: &EntityRef) -> Result<Vec<i64>>;

    fn with_all_categories(
        &self,
        entity_type: &str,
        candidates: &[String],
        reference: &CategoryRef,
    ) -> Result<Vec<String>> {
        let ids = self.resolve(reference)?;
        self.scope_filter(entity_type, candidates, &CategorizableFilter::WithAll(ids))
    }

    fn with_any_categories(
        &self,
        entity_type: &str,
        candidates: &[String],
        reference: &CategoryRef,
    ) -> Result<Vec<String>> {
        let ids = self.resolve(reference)?;
        self.scope_filter(entity_type, candidates, &CategorizableFilter::WithAny(ids))
    }

    fn without_categories(
        &self,
        entity_type: &str,
        candidates: &[String],
        reference: &CategoryRef,
    ) -> Result<Vec<String>> {
        let ids = self.resolve(reference)?;
        self.scope_filter(entity_type, candidates, &CategorizableFilter::Without(ids))
    }

    fn without_any_categories(
        &self,
        entity_type: &str,
        candidates: &[String],
    ) -> Result<Vec<String>> {
        self.scope_filter(entity_type, candidates, &CategorizableFilter::WithoutAny)
    }
}
