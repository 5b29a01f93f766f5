//! Traits for the category tree repository and service.

use async_trait::async_trait;

use crate::Result;

use super::{
    Category, CategoryInsert, CategoryTreeNode, CategoryUpdate, NewCategory, TreeIntegrityReport,
};

/// Persistence of the nested-set table.
///
/// Reads only see live rows unless stated otherwise. Every mutation runs in
/// one serialized write transaction and leaves the table numbered `[1, 2N]`.
#[async_trait]
pub trait CategoryRepositoryTrait: Send + Sync {
    /// Any row, trashed or not.
    fn get_category(&self, id: i64) -> Result<Option<Category>>;
    fn get_category_by_slug(&self, slug: &str) -> Result<Option<Category>>;
    /// Live categories in `left` order.
    fn list_categories(&self) -> Result<Vec<Category>>;
    /// Every row including trashed ones, in `left` order.
    fn list_all_rows(&self) -> Result<Vec<Category>>;
    fn children_of(&self, id: i64) -> Result<Vec<Category>>;
    /// Root first, immediate parent last. `NotFound` if `id` is not live.
    fn ancestors_of(&self, id: i64) -> Result<Vec<Category>>;
    /// Pre-order. `NotFound` if `id` is not live.
    fn descendants_of(&self, id: i64) -> Result<Vec<Category>>;
    fn depth_of(&self, id: i64) -> Result<usize>;
    /// First live category whose name in `locale` equals `name`.
    fn find_by_name(&self, name: &str, locale: &str) -> Result<Option<Category>>;

    async fn create_category(&self, category: CategoryInsert) -> Result<Category>;
    async fn update_category(&self, id: i64, changes: CategoryUpdate) -> Result<Category>;
    async fn move_category(&self, id: i64, new_parent_id: Option<i64>) -> Result<Category>;
    /// Hard delete. Returns the removed ids.
    async fn delete_category(&self, id: i64, cascade: bool) -> Result<Vec<i64>>;
    /// Soft delete of the node and its live descendants. Returns the trashed ids.
    async fn trash_category(&self, id: i64) -> Result<Vec<i64>>;
    /// Returns the restored ids.
    async fn restore_category(&self, id: i64) -> Result<Vec<i64>>;
    /// Renumbers every range from the parent links. Returns the rows rewritten.
    async fn rebuild_tree(&self) -> Result<usize>;
}

/// Category tree operations.
#[async_trait]
pub trait CategoryServiceTrait: Send + Sync {
    /// Live category by id.
    fn get_category(&self, id: i64) -> Result<Option<Category>>;
    fn get_category_by_slug(&self, slug: &str) -> Result<Option<Category>>;
    fn list_categories(&self) -> Result<Vec<Category>>;
    fn children_of(&self, id: i64) -> Result<Vec<Category>>;
    fn ancestors_of(&self, id: i64) -> Result<Vec<Category>>;
    fn descendants_of(&self, id: i64) -> Result<Vec<Category>>;
    fn depth_of(&self, id: i64) -> Result<usize>;
    fn materialize_tree(&self) -> Result<Vec<CategoryTreeNode>>;
    /// `locale` defaults to the current locale.
    fn find_by_name(&self, name: &str, locale: Option<&str>) -> Result<Option<Category>>;
    fn verify_tree(&self) -> Result<TreeIntegrityReport>;

    async fn create_category(&self, category: NewCategory) -> Result<Category>;
    async fn update_category(&self, id: i64, changes: CategoryUpdate) -> Result<Category>;
    async fn move_category(&self, id: i64, new_parent_id: Option<i64>) -> Result<Category>;
    async fn delete_category(&self, id: i64, cascade: bool) -> Result<Vec<i64>>;
    async fn trash_category(&self, id: i64) -> Result<Vec<i64>>;
    async fn restore_category(&self, id: i64) -> Result<Vec<i64>>;
    async fn find_by_name_or_create(&self, name: &str, locale: Option<&str>) -> Result<Category>;
    async fn find_many_by_name_or_create(
        &self,
        names: &[String],
        locale: Option<&str>,
    ) -> Result<Vec<Category>>;
    async fn fix_tree(&self) -> Result<usize>;
}
