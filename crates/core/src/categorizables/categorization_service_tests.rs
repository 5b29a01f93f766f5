#[cfg(test)]
mod tests {
    use crate::cache::InMemoryQueryCache;
    use crate::categories::{Category, CategoryError};
    use crate::categorizables::*;
    use crate::config::CategorizableConfig;
    use crate::errors::Result;
    use crate::events::{DomainEvent, MockDomainEventSink};
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    // --- Mock CategorizableRepository ---
    struct MockCategorizableRepository {
        live: HashSet<i64>,
        rows: Mutex<HashMap<EntityRef, Vec<i64>>>,
        reads: AtomicUsize,
        scope_calls: AtomicUsize,
    }

    impl MockCategorizableRepository {
        fn new(live: &[i64]) -> Arc<Self> {
            Arc::new(Self {
                live: live.iter().copied().collect(),
                rows: Mutex::new(HashMap::new()),
                reads: AtomicUsize::new(0),
                scope_calls: AtomicUsize::new(0),
            })
        }

        fn stored(&self, entity: &EntityRef) -> Vec<i64> {
            let mut ids = self
                .rows
                .lock()
                .unwrap()
                .get(entity)
                .cloned()
                .unwrap_or_default();
            ids.sort();
            ids
        }

        fn ensure_live(&self, ids: &[i64]) -> Result<()> {
            match ids.iter().find(|id| !self.live.contains(id)) {
                Some(id) => Err(CategoryError::not_found(*id).into()),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl CategorizableRepositoryTrait for MockCategorizableRepository {
        fn category_ids_of(&self, entity: &EntityRef) -> Result<Vec<i64>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .stored(entity)
                .into_iter()
                .filter(|id| self.live.contains(id))
                .collect())
        }

        fn categories_of(&self, _entity: &EntityRef) -> Result<Vec<Category>> {
            unimplemented!()
        }

        fn entities_in(&self, category_id: i64, entity_type: &str) -> Result<Vec<String>> {
            let rows = self.rows.lock().unwrap();
            let mut ids: Vec<String> = rows
                .iter()
                .filter(|(e, ids)| e.entity_type == entity_type && ids.contains(&category_id))
                .map(|(e, _)| e.id.clone())
                .collect();
            ids.sort();
            Ok(ids)
        }

        fn scope_entities(
            &self,
            entity_type: &str,
            candidates: &[String],
            filter: &CategorizableFilter,
        ) -> Result<Vec<String>> {
            self.scope_calls.fetch_add(1, Ordering::SeqCst);
            Ok(candidates
                .iter()
                .filter(|id| {
                    let attached: HashSet<i64> = self
                        .category_ids_of(&EntityRef::new(id.as_str(), entity_type))
                        .unwrap()
                        .into_iter()
                        .collect();
                    filter.matches(&attached)
                })
                .cloned()
                .collect())
        }

        async fn attach(&self, entity: &EntityRef, category_ids: &[i64]) -> Result<Vec<i64>> {
            self.ensure_live(category_ids)?;
            let mut rows = self.rows.lock().unwrap();
            let current = rows.entry(entity.clone()).or_default();
            let mut added = Vec::new();
            for id in category_ids {
                if !current.contains(id) {
                    current.push(*id);
                    added.push(*id);
                }
            }
            Ok(added)
        }

        async fn detach(
            &self,
            entity: &EntityRef,
            category_ids: Option<&[i64]>,
        ) -> Result<Vec<i64>> {
            let mut rows = self.rows.lock().unwrap();
            let current = rows.entry(entity.clone()).or_default();
            let removed: Vec<i64> = current
                .iter()
                .copied()
                .filter(|id| category_ids.map_or(true, |ids| ids.contains(id)))
                .collect();
            current.retain(|id| !removed.contains(id));
            Ok(removed)
        }

        async fn sync(
            &self,
            entity: &EntityRef,
            category_ids: &[i64],
            detaching: bool,
        ) -> Result<SyncDelta> {
            self.ensure_live(category_ids)?;
            let current = self.category_ids_of(entity)?;
            let delta = compute_sync_delta(&current, category_ids, detaching);
            let mut rows = self.rows.lock().unwrap();
            let stored = rows.entry(entity.clone()).or_default();
            stored.retain(|id| !delta.removed.contains(id));
            stored.extend(delta.added.iter().copied());
            Ok(delta)
        }
    }

    struct MockSlugLookup;

    impl SlugLookup for MockSlugLookup {
        fn find_ids_by_slugs(&self, slugs: &[String]) -> Result<Vec<(String, i64)>> {
            let known = [("electronics", 1), ("phones", 2), ("android", 3)];
            Ok(slugs
                .iter()
                .filter_map(|s| {
                    known
                        .iter()
                        .find(|(slug, _)| slug == s)
                        .map(|(slug, id)| (slug.to_string(), *id))
                })
                .collect())
        }
    }

    fn setup() -> (
        CategorizationService,
        Arc<MockCategorizableRepository>,
        Arc<MockDomainEventSink>,
    ) {
        let repo = MockCategorizableRepository::new(&[1, 2, 3, 4]);
        let sink = Arc::new(MockDomainEventSink::new());
        let service = CategorizationService::new(repo.clone(), Arc::new(MockSlugLookup))
            .with_event_sink(sink.clone());
        (service, repo, sink)
    }

    fn post(id: &str) -> EntityRef {
        EntityRef::new(id, "post")
    }

    #[tokio::test]
    async fn test_categorize_is_idempotent() {
        let (service, repo, _) = setup();
        let entity = post("p1");

        let first = service.categorize(&entity, &CategoryRef::ids([1, 2])).await.unwrap();
        assert_eq!(first.added, vec![1, 2]);
        let second = service.categorize(&entity, &CategoryRef::ids([1, 2])).await.unwrap();
        assert!(second.is_empty());
        assert_eq!(repo.stored(&entity), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_recategorize_reports_delta() {
        let (service, repo, sink) = setup();
        let entity = post("p1");
        service.categorize(&entity, &CategoryRef::ids([1, 2])).await.unwrap();
        sink.clear();

        let delta = service.recategorize(&entity, &CategoryRef::ids([2, 3])).await.unwrap();
        assert_eq!(delta.added, vec![3]);
        assert_eq!(delta.removed, vec![1]);
        assert_eq!(repo.stored(&entity), vec![2, 3]);

        assert_eq!(
            sink.events(),
            vec![
                DomainEvent::associating(entity.clone(), vec![2, 3]),
                DomainEvent::detaching(entity.clone(), Some(vec![1])),
                DomainEvent::associated(entity.clone(), vec![3]),
                DomainEvent::detached(entity.clone(), vec![1]),
            ]
        );
    }

    #[tokio::test]
    async fn test_recategorize_with_empty_reference_clears() {
        let (service, repo, sink) = setup();
        let entity = post("p1");
        service.categorize(&entity, &CategoryRef::ids([1, 2])).await.unwrap();
        sink.clear();

        let delta = service.recategorize(&entity, &CategoryRef::empty()).await.unwrap();
        assert_eq!(delta.removed, vec![1, 2]);
        assert!(repo.stored(&entity).is_empty());
        assert_eq!(
            sink.events()[1],
            DomainEvent::detaching(entity.clone(), Some(vec![1, 2]))
        );
        assert_eq!(
            sink.names(),
            vec![
                "categorizable.associating",
                "categorizable.detaching",
                "categorizable.associated",
                "categorizable.detached",
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_id_fails_without_writing() {
        let (service, repo, sink) = setup();
        let entity = post("p1");

        let err = service
            .categorize(&entity, &CategoryRef::ids([1, 99]))
            .await
            .unwrap_err();
        assert_eq!(err.as_category_error(), Some(&CategoryError::not_found(99)));
        assert!(repo.stored(&entity).is_empty());
        // Only the before-notification went out.
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn test_categorize_by_slugs_and_has_category() {
        let (service, _, _) = setup();
        let entity = post("p1");
        service
            .categorize(&entity, &vec!["phones", "android"].into())
            .await
            .unwrap();

        let both: CategoryRef = vec!["phones", "android"].into();
        assert!(service.has_category(&entity, &both, MatchMode::All).unwrap());
        assert!(service.has_category(&entity, &both, MatchMode::Exact).unwrap());

        let other = post("p2");
        service.categorize(&other, &CategoryRef::from("phones")).await.unwrap();
        assert!(!service.has_category(&other, &both, MatchMode::All).unwrap());
        assert!(service.has_category(&other, &both, MatchMode::Any).unwrap());
        assert!(!service.has_category(&other, &both, MatchMode::Exact).unwrap());
    }

    #[tokio::test]
    async fn test_unknown_slugs_are_dropped_unless_strict() {
        let (service, repo, _) = setup();
        let entity = post("p1");
        let delta = service
            .categorize(&entity, &vec!["phones", "missing"].into())
            .await
            .unwrap();
        assert_eq!(delta.added, vec![2]);

        let strict = CategorizationService::with_config(
            repo,
            Arc::new(MockSlugLookup),
            CategorizableConfig {
                strict_slug_resolution: true,
                ..Default::default()
            },
        );
        let err = strict
            .categorize(&entity, &vec!["phones", "missing"].into())
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_category_error(),
            Some(CategoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_mixed_reference_is_rejected() {
        let (service, _, sink) = setup();
        let mixed = CategoryRef::List(vec![CategoryRef::Id(1), CategoryRef::Slug("phones".into())]);
        let err = service.categorize(&post("p1"), &mixed).await.unwrap_err();
        assert!(matches!(
            err.as_category_error(),
            Some(CategoryError::InvalidReference(_))
        ));
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_uncategorize_and_uncategorize_all() {
        let (service, repo, sink) = setup();
        let entity = post("p1");
        service.categorize(&entity, &CategoryRef::ids([1, 2, 3])).await.unwrap();
        sink.clear();

        let removed = service.uncategorize(&entity, &CategoryRef::ids([2, 4])).await.unwrap();
        assert_eq!(removed, vec![2]);
        assert_eq!(repo.stored(&entity), vec![1, 3]);

        let removed = service.uncategorize_all(&entity).await.unwrap();
        assert_eq!(removed, vec![1, 3]);
        assert!(repo.stored(&entity).is_empty());

        assert_eq!(
            sink.events(),
            vec![
                DomainEvent::detaching(entity.clone(), Some(vec![2, 4])),
                DomainEvent::detached(entity.clone(), vec![2]),
                DomainEvent::detaching(entity.clone(), None),
                DomainEvent::detached(entity.clone(), vec![1, 3]),
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_categorize_is_a_no_op() {
        let (service, _, sink) = setup();
        let delta = service
            .categorize(&post("p1"), &CategoryRef::empty())
            .await
            .unwrap();
        assert!(delta.is_empty());
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_scope_helpers() {
        let (service, repo, _) = setup();
        service.categorize(&post("a"), &CategoryRef::ids([1, 2])).await.unwrap();
        service.categorize(&post("b"), &CategoryRef::ids([2])).await.unwrap();
        service.categorize(&EntityRef::new("c", "video"), &CategoryRef::ids([1])).await.unwrap();
        let candidates: Vec<String> = ["c", "b", "a", "d"].iter().map(|s| s.to_string()).collect();

        assert_eq!(
            service
                .with_all_categories("post", &candidates, &CategoryRef::ids([1, 2]))
                .unwrap(),
            vec!["a"]
        );
        assert_eq!(
            service
                .with_any_categories("post", &candidates, &CategoryRef::ids([1, 2]))
                .unwrap(),
            vec!["b", "a"]
        );
        assert_eq!(
            service
                .without_categories("post", &candidates, &CategoryRef::ids([1]))
                .unwrap(),
            vec!["c", "b", "d"]
        );
        assert_eq!(
            service.without_any_categories("post", &candidates).unwrap(),
            vec!["c", "d"]
        );

        let calls = repo.scope_calls.load(Ordering::SeqCst);
        assert_eq!(
            service
                .with_any_categories("post", &candidates, &CategoryRef::empty())
                .unwrap(),
            Vec::<String>::new()
        );
        assert_eq!(
            service
                .with_all_categories("post", &candidates, &CategoryRef::empty())
                .unwrap(),
            candidates
        );
        assert_eq!(repo.scope_calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test]
    async fn test_entities_in() {
        let (service, _, _) = setup();
        service.categorize(&post("a"), &CategoryRef::ids([1])).await.unwrap();
        service.categorize(&post("b"), &CategoryRef::ids([1, 2])).await.unwrap();
        service.categorize(&EntityRef::new("v", "video"), &CategoryRef::ids([1])).await.unwrap();

        assert_eq!(service.entities_in(1, "post").unwrap(), vec!["a", "b"]);
        assert_eq!(service.entities_in(2, "post").unwrap(), vec!["b"]);
        assert_eq!(service.entities_in(1, "video").unwrap(), vec!["v"]);
    }

    #[tokio::test]
    async fn test_association_reads_are_cached_until_a_write() {
        let repo = MockCategorizableRepository::new(&[1, 2, 3]);
        let service = CategorizationService::new(repo.clone(), Arc::new(MockSlugLookup))
            .with_cache(Arc::new(InMemoryQueryCache::new()));
        let entity = post("p1");
        service.categorize(&entity, &CategoryRef::ids([1])).await.unwrap();

        let reads = repo.reads.load(Ordering::SeqCst);
        assert_eq!(service.category_ids_of(&entity).unwrap(), vec![1]);
        assert_eq!(service.category_ids_of(&entity).unwrap(), vec![1]);
        assert_eq!(repo.reads.load(Ordering::SeqCst) - reads, 1);

        service.categorize(&entity, &CategoryRef::ids([2])).await.unwrap();
        assert_eq!(service.category_ids_of(&entity).unwrap(), vec![1, 2]);
    }
}
