use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use diesel::dsl::{count_star, max, sql};
use diesel::prelude::*;
use diesel::sql_types::{Bool, Text};
use diesel::SqliteConnection;
use log::debug;

use categorizable_core::categories::nested_set::{self, MovePlan, NodeLink, NODE_WIDTH};
use categorizable_core::categories::slug_policy::{next_available_slug, slug_candidate_prefix};
use categorizable_core::categories::{
    Category, CategoryError, CategoryInsert, CategoryRepositoryTrait, CategoryUpdate, NodeRange,
    SlugRequest,
};
use categorizable_core::categorizables::SlugLookup;
use categorizable_core::Result;

use super::model::{encode_text, into_categories, CategoryChangesetDB, CategoryDB, NewCategoryDB};
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::schema::{categories, categorizables};
use crate::utils::chunk_for_sqlite;

pub struct CategoryRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl CategoryRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        CategoryRepository { pool, writer }
    }
}

fn row_range(row: &CategoryDB) -> NodeRange {
    NodeRange::new(row.lft, row.rgt)
}

fn find_row(conn: &mut SqliteConnection, category_id: i64) -> Result<Option<CategoryDB>> {
    Ok(categories::table
        .find(category_id)
        .select(CategoryDB::as_select())
        .first(conn)
        .optional()
        .map_err(StorageError::from)?)
}

fn require_row(conn: &mut SqliteConnection, category_id: i64) -> Result<CategoryDB> {
    find_row(conn, category_id)?.ok_or_else(|| CategoryError::not_found(category_id).into())
}

fn require_live(conn: &mut SqliteConnection, category_id: i64) -> Result<CategoryDB> {
    let row = require_row(conn, category_id)?;
    if row.deleted_at.is_some() {
        return Err(CategoryError::not_found(category_id).into());
    }
    Ok(row)
}

/// Largest placed right bound. Rows parked below zero during a move are ignored.
fn max_right(conn: &mut SqliteConnection) -> Result<Option<i64>> {
    Ok(categories::table
        .filter(categories::rgt.gt(0))
        .select(max(categories::rgt))
        .first::<Option<i64>>(conn)
        .map_err(StorageError::from)?)
}

/// Adds `delta` to every bound `>= from`. Parked (negative) bounds are never touched.
fn shift_bounds(conn: &mut SqliteConnection, from: i64, delta: i64) -> Result<()> {
    diesel::update(categories::table.filter(categories::lft.ge(from)))
        .set(categories::lft.eq(categories::lft + delta))
        .execute(conn)
        .map_err(StorageError::from)?;
    diesel::update(categories::table.filter(categories::rgt.ge(from)))
        .set(categories::rgt.eq(categories::rgt + delta))
        .execute(conn)
        .map_err(StorageError::from)?;
    Ok(())
}

/// Ids inside `range` (inclusive), in `lft` order.
fn subtree_ids(
    conn: &mut SqliteConnection,
    range: NodeRange,
    deleted_at: Option<Option<NaiveDateTime>>,
) -> Result<Vec<i64>> {
    let mut query = categories::table
        .select(categories::id)
        .filter(categories::lft.ge(range.left))
        .filter(categories::rgt.le(range.right))
        .into_boxed();
    match deleted_at {
        Some(None) => query = query.filter(categories::deleted_at.is_null()),
        Some(Some(stamp)) => query = query.filter(categories::deleted_at.eq(stamp)),
        None => {}
    }
    Ok(query
        .order(categories::lft.asc())
        .load::<i64>(conn)
        .map_err(StorageError::from)?)
}

fn slug_taken(conn: &mut SqliteConnection, slug: &str, except_id: Option<i64>) -> Result<bool> {
    let mut query = categories::table
        .select(count_star())
        .filter(categories::slug.eq(slug))
        .into_boxed();
    if let Some(except_id) = except_id {
        query = query.filter(categories::id.ne(except_id));
    }
    let count: i64 = query
        .get_result(conn)
        .map_err(StorageError::from)?;
    Ok(count > 0)
}

/// Slugs of trashed rows stay reserved.
fn claim_slug(conn: &mut SqliteConnection, request: &SlugRequest) -> Result<String> {
    match request {
        SlugRequest::Explicit(slug) => {
            if slug_taken(conn, slug, None)? {
                return Err(CategoryError::DuplicateSlug(slug.clone()).into());
            }
            Ok(slug.clone())
        }
        SlugRequest::Derived { base, max_length } => {
            let prefix = slug_candidate_prefix(base, *max_length);
            let taken: HashSet<String> = categories::table
                .select(categories::slug)
                .filter(categories::slug.like(format!("{}%", prefix)))
                .load::<String>(conn)
                .map_err(StorageError::from)?
                .into_iter()
                .map(|s| s.to_lowercase())
                .collect();
            Ok(next_available_slug(base, &taken, *max_length))
        }
    }
}

fn insert_node(conn: &mut SqliteConnection, insert: CategoryInsert) -> Result<Category> {
    let parent = insert
        .parent_id
        .map(|parent_id| require_live(conn, parent_id))
        .transpose()?;
    let slug = claim_slug(conn, &insert.slug)?;

    let max_right = max_right(conn)?;
    nested_set::ensure_capacity(max_right, NODE_WIDTH)?;
    let left = match &parent {
        Some(parent) => {
            let point = nested_set::child_insertion_point(&row_range(parent));
            shift_bounds(conn, point, NODE_WIDTH)?;
            point
        }
        None => nested_set::root_insertion_point(max_right)?,
    };

    let now = Utc::now().naive_utc();
    let new_row = NewCategoryDB {
        slug,
        name: encode_text(&insert.name)?,
        description: insert.description.as_ref().map(encode_text).transpose()?,
        lft: left,
        rgt: left + 1,
        parent_id: insert.parent_id,
        created_at: now,
        updated_at: now,
    };
    let created = diesel::insert_into(categories::table)
        .values(&new_row)
        .returning(CategoryDB::as_returning())
        .get_result(conn)
        .map_err(StorageError::from)?;
    Category::try_from(created)
}

fn update_node(
    conn: &mut SqliteConnection,
    category_id: i64,
    changes: CategoryUpdate,
) -> Result<Category> {
    require_live(conn, category_id)?;
    if let Some(slug) = &changes.slug {
        if slug_taken(conn, slug, Some(category_id))? {
            return Err(CategoryError::DuplicateSlug(slug.clone()).into());
        }
    }

    let changeset = CategoryChangesetDB {
        slug: changes.slug,
        name: changes.name.as_ref().map(encode_text).transpose()?,
        description: changes
            .description
            .map(|description| -> Result<Option<String>> {
                if description.is_empty() {
                    Ok(None)
                } else {
                    encode_text(&description).map(Some)
                }
            })
            .transpose()?,
        updated_at: Some(Utc::now().naive_utc()),
    };
    let updated = diesel::update(categories::table.find(category_id))
        .set(&changeset)
        .returning(CategoryDB::as_returning())
        .get_result(conn)
        .map_err(StorageError::from)?;
    Category::try_from(updated)
}

/// Relocates the subtree of `category_id` as the last child of
/// `new_parent_id`, or as the last root.
fn move_node(
    conn: &mut SqliteConnection,
    category_id: i64,
    new_parent_id: Option<i64>,
) -> Result<Category> {
    let node = require_live(conn, category_id)?;
    let source = row_range(&node);
    if let Some(target_id) = new_parent_id {
        let target = require_live(conn, target_id)?;
        nested_set::ensure_not_cycle(category_id, &source, target_id, &row_range(&target))?;
    }
    let plan = MovePlan::new(source)?;

    diesel::update(
        categories::table
            .filter(categories::lft.ge(source.left))
            .filter(categories::rgt.le(source.right)),
    )
    .set((
        categories::lft.eq(categories::lft - plan.park_offset),
        categories::rgt.eq(categories::rgt - plan.park_offset),
    ))
    .execute(conn)
    .map_err(StorageError::from)?;

    shift_bounds(conn, source.right + 1, -plan.width)?;

    let destination = match new_parent_id {
        Some(target_id) => nested_set::child_insertion_point(&row_range(&require_row(
            conn, target_id,
        )?)),
        None => nested_set::root_insertion_point(max_right(conn)?)?,
    };
    shift_bounds(conn, destination, plan.width)?;

    let offset = plan.reattach_offset(destination)?;
    diesel::update(categories::table.filter(categories::lft.lt(0)))
        .set((
            categories::lft.eq(categories::lft + offset),
            categories::rgt.eq(categories::rgt + offset),
        ))
        .execute(conn)
        .map_err(StorageError::from)?;

    let moved = diesel::update(categories::table.find(category_id))
        .set((
            categories::parent_id.eq(new_parent_id),
            categories::updated_at.eq(Utc::now().naive_utc()),
        ))
        .returning(CategoryDB::as_returning())
        .get_result(conn)
        .map_err(StorageError::from)?;
    Category::try_from(moved)
}

fn delete_node(conn: &mut SqliteConnection, category_id: i64, cascade: bool) -> Result<Vec<i64>> {
    let node = require_row(conn, category_id)?;
    let range = row_range(&node);

    let (removed, width) = if cascade {
        (subtree_ids(conn, range, None)?, range.width())
    } else {
        // Children take the node's place; their subtrees move one step left.
        diesel::update(categories::table.filter(categories::parent_id.eq(category_id)))
            .set(categories::parent_id.eq(node.parent_id))
            .execute(conn)
            .map_err(StorageError::from)?;
        diesel::update(
            categories::table
                .filter(categories::lft.gt(range.left))
                .filter(categories::rgt.lt(range.right)),
        )
        .set((
            categories::lft.eq(categories::lft - 1),
            categories::rgt.eq(categories::rgt - 1),
        ))
        .execute(conn)
        .map_err(StorageError::from)?;
        (vec![category_id], NODE_WIDTH)
    };

    for chunk in chunk_for_sqlite(&removed) {
        diesel::delete(categorizables::table.filter(categorizables::category_id.eq_any(chunk.to_vec())))
            .execute(conn)
            .map_err(StorageError::from)?;
        diesel::delete(categories::table.filter(categories::id.eq_any(chunk.to_vec())))
            .execute(conn)
            .map_err(StorageError::from)?;
    }
    shift_bounds(conn, range.right + 1, -width)?;

    Ok(removed)
}

fn trash_node(conn: &mut SqliteConnection, category_id: i64) -> Result<Vec<i64>> {
    let node = require_live(conn, category_id)?;
    let trashed = subtree_ids(conn, row_range(&node), Some(None))?;
    let stamp = Utc::now().naive_utc();
    for chunk in chunk_for_sqlite(&trashed) {
        diesel::update(categories::table.filter(categories::id.eq_any(chunk.to_vec())))
            .set(categories::deleted_at.eq(Some(stamp)))
            .execute(conn)
            .map_err(StorageError::from)?;
    }
    Ok(trashed)
}

/// Restores the rows trashed together with `category_id`. Descendants
/// trashed on their own earlier stay trashed.
fn restore_node(conn: &mut SqliteConnection, category_id: i64) -> Result<Vec<i64>> {
    let node = require_row(conn, category_id)?;
    let Some(stamp) = node.deleted_at else {
        return Ok(Vec::new());
    };
    if let Some(parent_id) = node.parent_id {
        if require_row(conn, parent_id)?.deleted_at.is_some() {
            return Err(CategoryError::ParentDeleted(category_id).into());
        }
    }

    let restored = subtree_ids(conn, row_range(&node), Some(Some(stamp)))?;
    for chunk in chunk_for_sqlite(&restored) {
        diesel::update(categories::table.filter(categories::id.eq_any(chunk.to_vec())))
            .set(categories::deleted_at.eq(None::<NaiveDateTime>))
            .execute(conn)
            .map_err(StorageError::from)?;
    }
    Ok(restored)
}

fn rebuild(conn: &mut SqliteConnection) -> Result<usize> {
    let rows: Vec<(i64, Option<i64>, i64, i64)> = categories::table
        .select((
            categories::id,
            categories::parent_id,
            categories::lft,
            categories::rgt,
        ))
        .order((categories::lft.asc(), categories::id.asc()))
        .load(conn)
        .map_err(StorageError::from)?;

    let links: Vec<NodeLink> = rows
        .iter()
        .map(|&(id, parent_id, left, _)| NodeLink {
            id,
            parent_id,
            left,
        })
        .collect();
    let numbered = nested_set::renumber_from_links(&links)?;

    let current: HashMap<i64, (Option<i64>, i64, i64)> = rows
        .into_iter()
        .map(|(id, parent_id, left, right)| (id, (parent_id, left, right)))
        .collect();

    let mut rewritten = 0;
    for node in numbered {
        let wanted = (node.parent_id, node.range.left, node.range.right);
        if current.get(&node.id) == Some(&wanted) {
            continue;
        }
        diesel::update(categories::table.find(node.id))
            .set((
                categories::parent_id.eq(node.parent_id),
                categories::lft.eq(node.range.left),
                categories::rgt.eq(node.range.right),
            ))
            .execute(conn)
            .map_err(StorageError::from)?;
        rewritten += 1;
    }
    debug!("Tree rebuild rewrote {} rows", rewritten);
    Ok(rewritten)
}

#[async_trait]
impl CategoryRepositoryTrait for CategoryRepository {
    fn get_category(&self, category_id: i64) -> Result<Option<Category>> {
        let mut conn = get_connection(&self.pool)?;
        find_row(&mut conn, category_id)?
            .map(Category::try_from)
            .transpose()
    }

    fn get_category_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        let mut conn = get_connection(&self.pool)?;
        categories::table
            .select(CategoryDB::as_select())
            .filter(categories::slug.eq(slug))
            .filter(categories::deleted_at.is_null())
            .first(&mut conn)
            .optional()
            .map_err(StorageError::from)?
            .map(Category::try_from)
            .transpose()
    }

    fn list_categories(&self) -> Result<Vec<Category>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = categories::table
            .select(CategoryDB::as_select())
            .filter(categories::deleted_at.is_null())
            .order(categories::lft.asc())
            .load(&mut conn)
            .map_err(StorageError::from)?;
        into_categories(rows)
    }

    fn list_all_rows(&self) -> Result<Vec<Category>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = categories::table
            .select(CategoryDB::as_select())
            .order(categories::lft.asc())
            .load(&mut conn)
            .map_err(StorageError::from)?;
        into_categories(rows)
    }

    fn children_of(&self, category_id: i64) -> Result<Vec<Category>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = categories::table
            .select(CategoryDB::as_select())
            .filter(categories::parent_id.eq(category_id))
            .filter(categories::deleted_at.is_null())
            .order(categories::lft.asc())
            .load(&mut conn)
            .map_err(StorageError::from)?;
        into_categories(rows)
    }

    fn ancestors_of(&self, category_id: i64) -> Result<Vec<Category>> {
        let mut conn = get_connection(&self.pool)?;
        let node = require_live(&mut conn, category_id)?;
        let rows = categories::table
            .select(CategoryDB::as_select())
            .filter(categories::lft.lt(node.lft))
            .filter(categories::rgt.gt(node.rgt))
            .filter(categories::deleted_at.is_null())
            .order(categories::lft.asc())
            .load(&mut conn)
            .map_err(StorageError::from)?;
        into_categories(rows)
    }

    fn descendants_of(&self, category_id: i64) -> Result<Vec<Category>> {
        let mut conn = get_connection(&self.pool)?;
        let node = require_live(&mut conn, category_id)?;
        let rows = categories::table
            .select(CategoryDB::as_select())
            .filter(categories::lft.gt(node.lft))
            .filter(categories::rgt.lt(node.rgt))
            .filter(categories::deleted_at.is_null())
            .order(categories::lft.asc())
            .load(&mut conn)
            .map_err(StorageError::from)?;
        into_categories(rows)
    }

    fn depth_of(&self, category_id: i64) -> Result<usize> {
        let mut conn = get_connection(&self.pool)?;
        let node = require_live(&mut conn, category_id)?;
        let depth: i64 = categories::table
            .filter(categories::lft.lt(node.lft))
            .filter(categories::rgt.gt(node.rgt))
            .filter(categories::deleted_at.is_null())
            .count()
            .get_result(&mut conn)
            .map_err(StorageError::from)?;
        Ok(depth as usize)
    }

    fn find_by_name(&self, name: &str, locale: &str) -> Result<Option<Category>> {
        let mut conn = get_connection(&self.pool)?;
        let path = format!("$.\"{}\"", locale.replace('"', ""));
        categories::table
            .select(CategoryDB::as_select())
            .filter(categories::deleted_at.is_null())
            .filter(
                sql::<Bool>("json_extract(name, ")
                    .bind::<Text, _>(path)
                    .sql(") = ")
                    .bind::<Text, _>(name),
            )
            .order(categories::lft.asc())
            .first(&mut conn)
            .optional()
            .map_err(StorageError::from)?
            .map(Category::try_from)
            .transpose()
    }

    async fn create_category(&self, category: CategoryInsert) -> Result<Category> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<Category> {
                insert_node(conn, category)
            })
            .await
    }

    async fn update_category(&self, category_id: i64, changes: CategoryUpdate) -> Result<Category> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<Category> {
                update_node(conn, category_id, changes)
            })
            .await
    }

    async fn move_category(&self, category_id: i64, new_parent_id: Option<i64>) -> Result<Category> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<Category> {
                move_node(conn, category_id, new_parent_id)
            })
            .await
    }

    async fn delete_category(&self, category_id: i64, cascade: bool) -> Result<Vec<i64>> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<Vec<i64>> {
                delete_node(conn, category_id, cascade)
            })
            .await
    }

    async fn trash_category(&self, category_id: i64) -> Result<Vec<i64>> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<Vec<i64>> {
                trash_node(conn, category_id)
            })
            .await
    }

    async fn restore_category(&self, category_id: i64) -> Result<Vec<i64>> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<Vec<i64>> {
                restore_node(conn, category_id)
            })
            .await
    }

    async fn rebuild_tree(&self) -> Result<usize> {
        self.writer.exec(rebuild).await
    }
}

impl SlugLookup for CategoryRepository {
    fn find_ids_by_slugs(&self, slugs: &[String]) -> Result<Vec<(String, i64)>> {
        let mut conn = get_connection(&self.pool)?;
        let mut found = Vec::with_capacity(slugs.len());
        for chunk in chunk_for_sqlite(slugs) {
            let rows: Vec<(String, i64)> = categories::table
                .select((categories::slug, categories::id))
                .filter(categories::slug.eq_any(chunk.to_vec()))
                .filter(categories::deleted_at.is_null())
                .load(&mut conn)
                .map_err(StorageError::from)?;
            found.extend(rows.into_iter().map(|(slug, id)| (slug.to_lowercase(), id)));
        }
        Ok(found)
    }
}
