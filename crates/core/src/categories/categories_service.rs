//! Category tree service implementation.

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::{cached, CacheKey, CacheNamespace, NoOpQueryCache, QueryCache};
use crate::config::CategorizableConfig;
use crate::constants::{MAX_DESCRIPTION_LENGTH, MAX_NAME_LENGTH};
use crate::errors::ValidationError;
use crate::events::{DomainEvent, DomainEventSink, NoOpDomainEventSink};
use crate::Result;

use super::nested_set::{build_forest, check_integrity, TreeIntegrityReport};
use super::slug_policy::{is_valid_slug, strip_tags, DefaultSlugPolicy, SlugPolicy};
use super::{
    Category, CategoryError, CategoryInsert, CategoryRepositoryTrait, CategoryServiceTrait,
    CategoryTreeNode, CategoryUpdate, FixedLocale, LocaleProvider, LocalizedText, NewCategory,
    SlugRequest,
};

pub struct CategoryService {
    repository: Arc<dyn CategoryRepositoryTrait>,
    config: CategorizableConfig,
    slug_policy: Arc<dyn SlugPolicy>,
    locale: Arc<dyn LocaleProvider>,
    cache: Arc<dyn QueryCache>,
    event_sink: Arc<dyn DomainEventSink>,
}

impl CategoryService {
    pub fn new(repository: Arc<dyn CategoryRepositoryTrait>) -> Self {
        Self::with_config(repository, CategorizableConfig::default())
    }

    pub fn with_config(
        repository: Arc<dyn CategoryRepositoryTrait>,
        config: CategorizableConfig,
    ) -> Self {
        Self {
            repository,
            slug_policy: Arc::new(DefaultSlugPolicy::new(config.slug_max_length)),
            locale: Arc::new(FixedLocale::new(config.default_locale.clone())),
            cache: Arc::new(NoOpQueryCache),
            event_sink: Arc::new(NoOpDomainEventSink),
            config,
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

    pub fn with_slug_policy(mut self, slug_policy: Arc<dyn SlugPolicy>) -> Self {
        self.slug_policy = slug_policy;
        self
    }

    pub fn with_locale_provider(mut self, locale: Arc<dyn LocaleProvider>) -> Self {
        self.locale = locale;
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
        let key = CacheKey::new(CacheNamespace::Categories, operation, args);
        cached(self.cache.as_ref(), key, load)
    }

    /// Structural changes can hide or reveal categories in association reads too.
    fn invalidate(&self) {
        self.cache.invalidate_all();
    }

    fn resolve_locale(&self, locale: Option<&str>) -> String {
        match locale.map(str::trim) {
            Some(l) if !l.is_empty() => l.to_string(),
            _ => self.locale.current_locale(),
        }
    }

    fn require_live(&self, id: i64) -> Result<Category> {
        match self.repository.get_category(id)? {
            Some(category) if !category.is_trashed() => Ok(category),
            _ => Err(CategoryError::not_found(id).into()),
        }
    }

    fn normalize_name(&self, name: LocalizedText) -> Result<LocalizedText> {
        if name.is_empty() {
            return Err(invalid("name requires at least one locale"));
        }
        let mut cleaned = LocalizedText::new();
        for (locale, text) in name.iter() {
            if locale.trim().is_empty() {
                return Err(invalid("name has an empty locale key"));
            }
            let text = strip_tags(text).trim().to_string();
            if text.is_empty() {
                return Err(invalid(&format!("name for locale '{}' is empty", locale)));
            }
            if text.chars().count() > MAX_NAME_LENGTH {
                return Err(invalid(&format!(
                    "name for locale '{}' exceeds {} characters",
                    locale, MAX_NAME_LENGTH
                )));
            }
            cleaned.insert(locale.trim(), text);
        }
        Ok(cleaned)
    }

    fn normalize_description(
        &self,
        description: Option<LocalizedText>,
    ) -> Result<Option<LocalizedText>> {
        let Some(description) = description else {
            return Ok(None);
        };
        if description.is_empty() {
            return Ok(None);
        }
        for (locale, text) in description.iter() {
            if locale.trim().is_empty() {
                return Err(invalid("description has an empty locale key"));
            }
            if text.chars().count() > MAX_DESCRIPTION_LENGTH {
                return Err(invalid(&format!(
                    "description for locale '{}' exceeds {} characters",
                    locale, MAX_DESCRIPTION_LENGTH
                )));
            }
        }
        Ok(Some(description))
    }

    fn normalize_explicit_slug(&self, slug: &str) -> Result<String> {
        let normalized = self.slug_policy.slugify(slug);
        if !is_valid_slug(&normalized) {
            return Err(invalid(&format!("slug '{}' is not usable", slug)));
        }
        if normalized.chars().count() > self.config.slug_max_length {
            return Err(invalid(&format!(
                "slug exceeds {} characters",
                self.config.slug_max_length
            )));
        }
        Ok(normalized)
    }

    fn slug_request(&self, explicit: Option<&str>, name: &LocalizedText) -> Result<SlugRequest> {
        if let Some(slug) = explicit.filter(|s| !s.trim().is_empty()) {
            return self.normalize_explicit_slug(slug).map(SlugRequest::Explicit);
        }
        let source = name
            .translate(&self.locale.current_locale(), &self.locale.fallback_locale())
            .unwrap_or_default();
        let derived = self.slug_policy.slugify(source);
        if !is_valid_slug(&derived) {
            return Err(invalid("name does not produce a usable slug; set one explicitly"));
        }
        Ok(SlugRequest::Derived {
            base: derived,
            max_length: self.config.slug_max_length,
        })
    }
}

fn invalid(message: &str) -> crate::Error {
    ValidationError::InvalidInput(message.to_string()).into()
}

#[async_trait]
impl CategoryServiceTrait for CategoryService {
    fn get_category(&self, id: i64) -> Result<Option<Category>> {
        self.read_through("get", &id, || {
            Ok(self
                .repository
                .get_category(id)?
                .filter(|c| !c.is_trashed()))
        })
    }

    fn get_category_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        let slug = slug.trim().to_lowercase();
        self.read_through("get_by_slug", &slug, || {
            self.repository.get_category_by_slug(&slug)
        })
    }

    fn list_categories(&self) -> Result<Vec<Category>> {
        self.read_through("list", &(), || self.repository.list_categories())
    }

    fn children_of(&self, id: i64) -> Result<Vec<Category>> {
        self.read_through("children", &id, || {
            self.require_live(id)?;
            self.repository.children_of(id)
        })
    }

    fn ancestors_of(&self, id: i64) -> Result<Vec<Category>> {
        self.read_through("ancestors", &id, || self.repository.ancestors_of(id))
    }

    fn descendants_of(&self, id: i64) -> Result<Vec<Category>> {
        self.read_through("descendants", &id, || self.repository.descendants_of(id))
    }

    fn depth_of(&self, id: i64) -> Result<usize> {
        self.read_through("depth", &id, || self.repository.depth_of(id))
    }

    fn materialize_tree(&self) -> Result<Vec<CategoryTreeNode>> {
        self.read_through("tree", &(), || {
            Ok(build_forest(self.repository.list_categories()?))
        })
    }

    fn find_by_name(&self, name: &str, locale: Option<&str>) -> Result<Option<Category>> {
        let locale = self.resolve_locale(locale);
        let name = strip_tags(name).trim().to_string();
        if name.is_empty() {
            return Ok(None);
        }
        self.read_through("find_by_name", &(&name, &locale), || {
            self.repository.find_by_name(&name, &locale)
        })
    }

    fn verify_tree(&self) -> Result<TreeIntegrityReport> {
        let rows = self.repository.list_all_rows()?;
        let nodes: Vec<_> = rows.iter().map(|c| (c.id, c.parent_id, c.range())).collect();
        let report = check_integrity(&nodes);
        for violation in &report.violations {
            warn!("Category tree violation: {:?}", violation);
        }
        Ok(report)
    }

    async fn create_category(&self, category: NewCategory) -> Result<Category> {
        let name = self.normalize_name(category.name)?;
        let description = self.normalize_description(category.description)?;
        let slug = self.slug_request(category.slug.as_deref(), &name)?;
        if let Some(parent_id) = category.parent_id {
            self.require_live(parent_id)?;
        }
        debug!("Creating category with slug request {:?}", slug);

        let created = self
            .repository
            .create_category(CategoryInsert {
                parent_id: category.parent_id,
                name,
                description,
                slug,
            })
            .await?;
        self.invalidate();

        info!(
            "Created category {} ('{}') at [{}, {}]",
            created.id, created.slug, created.left, created.right
        );
        self.event_sink
            .emit(DomainEvent::category_created(created.id, created.parent_id));
        Ok(created)
    }

    async fn update_category(&self, id: i64, changes: CategoryUpdate) -> Result<Category> {
        self.require_live(id)?;
        let changes = CategoryUpdate {
            name: changes.name.map(|n| self.normalize_name(n)).transpose()?,
            description: match changes.description {
                // An empty map tells the repository to clear the column.
                Some(d) => Some(self.normalize_description(Some(d))?.unwrap_or_default()),
                None => None,
            },
            slug: changes
                .slug
                .as_deref()
                .map(|s| self.normalize_explicit_slug(s))
                .transpose()?,
        };

        let updated = self.repository.update_category(id, changes).await?;
        self.invalidate();
        self.event_sink.emit(DomainEvent::category_updated(id));
        Ok(updated)
    }

    async fn move_category(&self, id: i64, new_parent_id: Option<i64>) -> Result<Category> {
        let before = self.require_live(id)?;
        if let Some(parent_id) = new_parent_id {
            self.require_live(parent_id)?;
        }

        let moved = self.repository.move_category(id, new_parent_id).await?;
        self.invalidate();

        info!(
            "Moved category {} from {:?} to {:?}",
            id, before.parent_id, new_parent_id
        );
        self.event_sink.emit(DomainEvent::category_moved(
            id,
            before.parent_id,
            new_parent_id,
        ));
        Ok(moved)
    }

    async fn delete_category(&self, id: i64, cascade: bool) -> Result<Vec<i64>> {
        let removed = self.repository.delete_category(id, cascade).await?;
        self.invalidate();

        info!(
            "Deleted categories {:?} (cascade: {})",
            removed, cascade
        );
        self.event_sink
            .emit(DomainEvent::categories_deleted(removed.clone()));
        Ok(removed)
    }

    async fn trash_category(&self, id: i64) -> Result<Vec<i64>> {
        self.require_live(id)?;
        let trashed = self.repository.trash_category(id).await?;
        self.invalidate();
        self.event_sink
            .emit(DomainEvent::categories_trashed(trashed.clone()));
        Ok(trashed)
    }

    async fn restore_category(&self, id: i64) -> Result<Vec<i64>> {
        let restored = self.repository.restore_category(id).await?;
        self.invalidate();
        if !restored.is_empty() {
            self.event_sink
                .emit(DomainEvent::categories_restored(restored.clone()));
        }
        Ok(restored)
    }

    async fn find_by_name_or_create(&self, name: &str, locale: Option<&str>) -> Result<Category> {
        if let Some(existing) = self.find_by_name(name, locale)? {
            return Ok(existing);
        }
        let locale = self.resolve_locale(locale);
        self.create_category(NewCategory::named(locale, name)).await
    }

    async fn find_many_by_name_or_create(
        &self,
        names: &[String],
        locale: Option<&str>,
    ) -> Result<Vec<Category>> {
        let mut categories: Vec<Category> = Vec::with_capacity(names.len());
        for name in names {
            let category = self.find_by_name_or_create(name, locale).await?;
            if !categories.iter().any(|c| c.id == category.id) {
                categories.push(category);
            }
        }
        Ok(categories)
    }

    async fn fix_tree(&self) -> Result<usize> {
        let rewritten = self.repository.rebuild_tree().await?;
        self.invalidate();
        info!("Rebuilt category tree, {} rows renumbered", rewritten);
        Ok(rewritten)
    }
}
