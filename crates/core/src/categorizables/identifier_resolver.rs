//! Normalization of caller supplied category references into category ids.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::{debug, warn};

use crate::categories::CategoryError;
use crate::Result;

use super::CategoryRef;

/// Batched slug → id lookup against live categories.
pub trait SlugLookup: Send + Sync {
    /// Returns `(slug, id)` for every slug that names a live category.
    /// Slugs are passed lower-cased; unknown slugs are simply absent.
    fn find_ids_by_slugs(&self, slugs: &[String]) -> Result<Vec<(String, i64)>>;
}

/// Turns a [`CategoryRef`] into an ordered, duplicate-free list of ids.
///
/// Ids and models are taken verbatim. Slugs are resolved in one batched
/// lookup; unknown slugs are dropped unless the resolver is strict.
#[derive(Clone)]
pub struct IdentifierResolver {
    lookup: Arc<dyn SlugLookup>,
    strict: bool,
}

impl IdentifierResolver {
    pub fn new(lookup: Arc<dyn SlugLookup>) -> Self {
        Self {
            lookup,
            strict: false,
        }
    }

    /// Fail with `NotFound` on unknown slugs instead of dropping them.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn resolve(&self, reference: &CategoryRef) -> Result<Vec<i64>> {
        match reference {
            CategoryRef::Id(id) | CategoryRef::Model(id) => Ok(vec![*id]),
            CategoryRef::Slug(slug) => self.resolve_slugs(std::slice::from_ref(slug)),
            CategoryRef::List(items) => self.resolve_list(items),
        }
    }

    fn resolve_list(&self, items: &[CategoryRef]) -> Result<Vec<i64>> {
        let Some(first) = items.first() else {
            return Ok(Vec::new());
        };
        for item in items {
            if let CategoryRef::List(_) = item {
                return Err(CategoryError::InvalidReference(
                    "nested lists are not supported".to_string(),
                )
                .into());
            }
            if item.kind() != first.kind() {
                return Err(CategoryError::InvalidReference(format!(
                    "cannot mix {} and {} references in one list",
                    first.kind(),
                    item.kind()
                ))
                .into());
            }
        }

        if let CategoryRef::Slug(_) = first {
            let slugs: Vec<String> = items
                .iter()
                .filter_map(|item| match item {
                    CategoryRef::Slug(slug) => Some(slug.clone()),
                    _ => None,
                })
                .collect();
            return self.resolve_slugs(&slugs);
        }

        let mut seen = HashSet::new();
        Ok(items
            .iter()
            .filter_map(|item| match item {
                CategoryRef::Id(id) | CategoryRef::Model(id) => Some(*id),
                _ => None,
            })
            .filter(|id| seen.insert(*id))
            .collect())
    }

    fn resolve_slugs(&self, raw: &[String]) -> Result<Vec<i64>> {
        let mut seen_slugs = HashSet::new();
        let slugs: Vec<String> = raw
            .iter()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| seen_slugs.insert(s.clone()))
            .collect();

        let lookup_input: Vec<String> = slugs.iter().filter(|s| !s.is_empty()).cloned().collect();
        let found: HashMap<String, i64> = if lookup_input.is_empty() {
            HashMap::new()
        } else {
            self.lookup
                .find_ids_by_slugs(&lookup_input)?
                .into_iter()
                .map(|(slug, id)| (slug.to_lowercase(), id))
                .collect()
        };
        debug!("Resolved {} of {} slugs", found.len(), slugs.len());

        let mut seen_ids = HashSet::new();
        let mut ids = Vec::with_capacity(slugs.len());
        for slug in &slugs {
            match found.get(slug) {
                Some(id) => {
                    if seen_ids.insert(*id) {
                        ids.push(*id);
                    }
                }
                None if self.strict => {
                    return Err(CategoryError::NotFound(format!("slug '{}'", slug)).into());
                }
                None => warn!("Dropping unknown category slug '{}'", slug),
            }
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct MockSlugLookup {
        slugs: HashMap<String, i64>,
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl MockSlugLookup {
        fn new(pairs: &[(&str, i64)]) -> Arc<Self> {
            Arc::new(Self {
                slugs: pairs.iter().map(|(s, id)| (s.to_string(), *id)).collect(),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl SlugLookup for MockSlugLookup {
        fn find_ids_by_slugs(&self, slugs: &[String]) -> Result<Vec<(String, i64)>> {
            self.calls.lock().unwrap().push(slugs.to_vec());
            Ok(slugs
                .iter()
                .filter_map(|s| self.slugs.get(s).map(|id| (s.clone(), *id)))
                .collect())
        }
    }

    fn lookup() -> Arc<MockSlugLookup> {
        MockSlugLookup::new(&[("electronics", 1), ("phones", 2), ("android", 3)])
    }

    #[test]
    fn test_ids_and_models_pass_through() {
        let resolver = IdentifierResolver::new(lookup());
        assert_eq!(resolver.resolve(&CategoryRef::Id(42)).unwrap(), vec![42]);
        assert_eq!(resolver.resolve(&CategoryRef::Model(7)).unwrap(), vec![7]);
        assert_eq!(
            resolver.resolve(&CategoryRef::ids([3, 1, 3, 2])).unwrap(),
            vec![3, 1, 2]
        );
    }

    #[test]
    fn test_empty_input_resolves_to_nothing() {
        let source = lookup();
        let resolver = IdentifierResolver::new(source.clone());
        assert!(resolver.resolve(&CategoryRef::empty()).unwrap().is_empty());
        assert!(source.calls().is_empty());
    }

    #[test]
    fn test_slugs_use_one_batched_lookup() {
        let source = lookup();
        let resolver = IdentifierResolver::new(source.clone());
        let ids = resolver
            .resolve(&CategoryRef::slugs(["Android", "phones", " android ", "missing"]))
            .unwrap();
        assert_eq!(ids, vec![3, 2]);
        assert_eq!(
            source.calls(),
            vec![vec![
                "android".to_string(),
                "phones".to_string(),
                "missing".to_string()
            ]]
        );
    }

    #[test]
    fn test_strict_mode_rejects_unknown_slug() {
        let resolver = IdentifierResolver::new(lookup()).strict(true);
        let err = resolver
            .resolve(&CategoryRef::slugs(["phones", "missing"]))
            .unwrap_err();
        assert_eq!(
            err.as_category_error(),
            Some(&CategoryError::NotFound("slug 'missing'".to_string()))
        );
    }

    #[test]
    fn test_mixed_and_nested_lists_are_rejected() {
        let resolver = IdentifierResolver::new(lookup());
        let mixed = CategoryRef::List(vec![CategoryRef::Id(1), CategoryRef::Slug("phones".into())]);
        assert!(matches!(
            resolver.resolve(&mixed).unwrap_err().as_category_error(),
            Some(CategoryError::InvalidReference(_))
        ));

        let nested = CategoryRef::List(vec![CategoryRef::List(vec![CategoryRef::Id(1)])]);
        assert!(matches!(
            resolver.resolve(&nested).unwrap_err().as_category_error(),
            Some(CategoryError::InvalidReference(_))
        ));

        let ids_and_models =
            CategoryRef::List(vec![CategoryRef::Id(1), CategoryRef::Model(2)]);
        assert!(resolver.resolve(&ids_and_models).is_err());
    }
}
