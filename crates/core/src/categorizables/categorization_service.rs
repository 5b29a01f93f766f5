use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::{cached, CacheKey, CacheNamespace, NoOpQueryCache, QueryCache};
use crate::categories::Category;
use crate::config::CategorizableConfig;
use crate::events::{DomainEvent, DomainEventSink, NoOpDomainEventSink};
use crate::Result;

use super::{
    compute_sync_delta, matches_categories, CategorizableFilter, CategorizableRepositoryTrait,
    CategorizationServiceTrait, CategoryRef, EntityRef, IdentifierResolver, MatchMode, SlugLookup,
    SyncDelta,
};

/// Orchestrates reference resolution and association writes for entities.
pub struct CategorizationService {
    repository: Arc<dyn CategorizableRepositoryTrait>,
    resolver: IdentifierResolver,
    config: CategorizableConfig,
    cache: Arc<dyn QueryCache>,
    event_sink: Arc<dyn DomainEventSink>,
}

impl CategorizationService {
    pub fn new(
        repository: Arc<dyn CategorizableRepositoryTrait>,
        slug_lookup: Arc<dyn SlugLookup>,
    ) -> Self {
        Self::with_config(repository, slug_lookup, CategorizableConfig::default())
    }

    pub fn with_config(
        repository: Arc<dyn CategorizableRepositoryTrait>,
        slug_lookup: Arc<dyn SlugLookup>,
        config: CategorizableConfig,
    ) -> Self {
        Self {
            repository,
            resolver: IdentifierResolver::new(slug_lookup).strict(config.strict_slug_resolution),
            config,
            cache: Arc::new(NoOpQueryCache),
            event_sink: Arc::new(NoOpDomainEventSink),
        }
    }

    /// Sets the domain event sink for this service.
    pub fn with_event_sink(mut self, event_sink: Arc<dyn DomainEventSink>) -> Self {
        self.event_sink = event_sink;
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn QueryCache>) -> Self {
        self.cache = cache;
        self
    }

    fn read_through<T, A, F>(&self, operation: &str, args: &A, load: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        A: Serialize + ?Sized,
        F: FnOnce() -> Result<T>,
    {
        if !self.config.cache_enabled {
            return load();
        }
        let key = CacheKey::new(CacheNamespace::Categorizables, operation, args);
        cached(self.cache.as_ref(), key, load)
    }

    fn invalidate(&self) {
        self.cache
            .invalidate_namespace(CacheNamespace::Categorizables);
    }
}

#[async_trait]
impl CategorizationServiceTrait for CategorizationService {
    fn resolve(&self, reference: &CategoryRef) -> Result<Vec<i64>> {
        self.resolver.resolve(reference)
    }

    fn category_ids_of(&self, entity: &EntityRef) -> Result<Vec<i64>> {
        self.read_through("category_ids_of", entity, || {
            self.repository.category_ids_of(entity)
        })
    }

    fn categories_of(&self, entity: &EntityRef) -> Result<Vec<Category>> {
        self.read_through("categories_of", entity, || {
            self.repository.categories_of(entity)
        })
    }

    fn entities_in(&self, category_id: i64, entity_type: &str) -> Result<Vec<String>> {
        self.read_through("entities_in", &(category_id, entity_type), || {
            self.repository.entities_in(category_id, entity_type)
        })
    }

    fn has_category(
        &self,
        entity: &EntityRef,
        reference: &CategoryRef,
        mode: MatchMode,
    ) -> Result<bool> {
        let requested = self.resolve(reference)?;
        let current = self.category_ids_of(entity)?;
        Ok(matches_categories(&current, &requested, mode))
    }

    fn scope_filter(
        &self,
        entity_type: &str,
        candidates: &[String],
        filter: &CategorizableFilter,
    ) -> Result<Vec<String>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        match filter.empty_outcome() {
            Some(true) => Ok(candidates.to_vec()),
            Some(false) => Ok(Vec::new()),
            None => self
                .repository
                .scope_entities(entity_type, candidates, filter),
        }
    }

    async fn categorize(&self, entity: &EntityRef, reference: &CategoryRef) -> Result<SyncDelta> {
        let ids = self.resolve(reference)?;
        if ids.is_empty() {
            debug!("Nothing to categorize for {:?}", entity);
            return Ok(SyncDelta::default());
        }

        self.event_sink
            .emit(DomainEvent::associating(entity.clone(), ids.clone()));
        let delta = self.repository.sync_without_detaching(entity, &ids).await?;
        self.invalidate();
        self.event_sink
            .emit(DomainEvent::associated(entity.clone(), delta.added.clone()));
        Ok(delta)
    }

    async fn recategorize(
        &self,
        entity: &EntityRef,
        reference: &CategoryRef,
    ) -> Result<SyncDelta> {
        let ids = self.resolve(reference)?;
        let current = self.repository.category_ids_of(entity)?;
        let planned = compute_sync_delta(&current, &ids, true);

        self.event_sink.emit_batch(vec![
            DomainEvent::associating(entity.clone(), ids.clone()),
            DomainEvent::detaching(entity.clone(), Some(planned.removed)),
        ]);
        let delta = self.repository.sync(entity, &ids, true).await?;
        self.invalidate();
        self.event_sink.emit_batch(vec![
            DomainEvent::associated(entity.clone(), delta.added.clone()),
            DomainEvent::detached(entity.clone(), delta.removed.clone()),
        ]);
        Ok(delta)
    }

    async fn uncategorize(
        &self,
        entity: &EntityRef,
        reference: &CategoryRef,
    ) -> Result<Vec<i64>> {
        let ids = self.resolve(reference)?;
        if ids.is_empty() {
            debug!("Nothing to uncategorize for {:?}", entity);
            return Ok(Vec::new());
        }

        self.event_sink
            .emit(DomainEvent::detaching(entity.clone(), Some(ids.clone())));
        let removed = self.repository.detach(entity, Some(&ids)).await?;
        self.invalidate();
        self.event_sink
            .emit(DomainEvent::detached(entity.clone(), removed.clone()));
        Ok(removed)
    }

    async fn uncategorize_all(&self, entity: &EntityRef) -> Result<Vec<i64>> {
        self.event_sink
            .emit(DomainEvent::detaching(entity.clone(), None));
        let removed = self.repository.detach(entity, None).await?;
        self.invalidate();
        self.event_sink
            .emit(DomainEvent::detached(entity.clone(), removed.clone()));
        Ok(removed)
    }
}
