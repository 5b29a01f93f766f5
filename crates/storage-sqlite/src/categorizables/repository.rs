use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::query_builder::{BoxedSqlQuery, SqlQuery};
use diesel::sql_query;
use diesel::sql_types::Text;
use diesel::sqlite::Sqlite;
use diesel::SqliteConnection;

use categorizable_core::categories::{Category, CategoryError};
use categorizable_core::categorizables::{
    compute_sync_delta, CategorizableFilter, CategorizableRepositoryTrait, EntityRef, SyncDelta,
};
use categorizable_core::Result;

use super::model::{CategorizableDB, NewCategorizableDB, ScopedEntityDB};
use crate::categories::{into_categories, CategoryDB};
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::schema::{categories, categorizables};
use crate::utils::{chunk_for_sqlite, rows_per_insert};

/// Columns bound per inserted association row.
const ASSOCIATION_COLUMNS: usize = 5;

pub struct CategorizableRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl CategorizableRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        CategorizableRepository { pool, writer }
    }
}

/// Category ids attached to `entity` in tree order, optionally hiding trashed categories.
fn attached_ids(conn: &mut SqliteConnection, entity: &EntityRef, live_only: bool) -> Result<Vec<i64>> {
    let mut query = categorizables::table
        .inner_join(categories::table)
        .select(categorizables::category_id)
        .filter(categorizables::categorizable_type.eq(entity.entity_type.as_str()))
        .filter(categorizables::categorizable_id.eq(entity.id.as_str()))
        .into_boxed();
    if live_only {
        query = query.filter(categories::deleted_at.is_null());
    }
    Ok(query
        .order(categories::lft.asc())
        .load::<i64>(conn)
        .map_err(StorageError::from)?)
}

/// Fails with `NotFound` on the first id that is not a live category.
fn ensure_live_categories(conn: &mut SqliteConnection, category_ids: &[i64]) -> Result<()> {
    let mut live = HashSet::with_capacity(category_ids.len());
    for chunk in chunk_for_sqlite(category_ids) {
        let found: Vec<i64> = categories::table
            .select(categories::id)
            .filter(categories::id.eq_any(chunk.to_vec()))
            .filter(categories::deleted_at.is_null())
            .load(conn)
            .map_err(StorageError::from)?;
        live.extend(found);
    }
    match category_ids.iter().find(|id| !live.contains(*id)) {
        Some(missing) => Err(CategoryError::not_found(*missing).into()),
        None => Ok(()),
    }
}

fn insert_rows(conn: &mut SqliteConnection, entity: &EntityRef, category_ids: &[i64]) -> Result<()> {
    let now = Utc::now().naive_utc();
    for chunk in category_ids.chunks(rows_per_insert(ASSOCIATION_COLUMNS)) {
        let rows: Vec<NewCategorizableDB> = chunk
            .iter()
            .map(|category_id| NewCategorizableDB::new(entity, *category_id, now))
            .collect();
        diesel::insert_into(categorizables::table)
            .values(&rows)
            .execute(conn)
            .map_err(StorageError::from)?;
    }
    Ok(())
}

fn delete_rows(conn: &mut SqliteConnection, entity: &EntityRef, category_ids: &[i64]) -> Result<()> {
    for chunk in chunk_for_sqlite(category_ids) {
        diesel::delete(
            categorizables::table
                .filter(categorizables::categorizable_type.eq(entity.entity_type.as_str()))
                .filter(categorizables::categorizable_id.eq(entity.id.as_str()))
                .filter(categorizables::category_id.eq_any(chunk.to_vec())),
        )
        .execute(conn)
        .map_err(StorageError::from)?;
    }
    Ok(())
}

fn attach_rows(conn: &mut SqliteConnection, entity: &EntityRef, category_ids: &[i64]) -> Result<Vec<i64>> {
    ensure_live_categories(conn, category_ids)?;
    // Rows pointing at trashed categories count as present.
    let existing: HashSet<i64> = attached_ids(conn, entity, false)?.into_iter().collect();
    let mut seen = HashSet::new();
    let added: Vec<i64> = category_ids
        .iter()
        .copied()
        .filter(|id| !existing.contains(id) && seen.insert(*id))
        .collect();
    insert_rows(conn, entity, &added)?;
    Ok(added)
}

fn detach_rows(
    conn: &mut SqliteConnection,
    entity: &EntityRef,
    category_ids: Option<&[i64]>,
) -> Result<Vec<i64>> {
    let attached = attached_ids(conn, entity, false)?;
    let removed: Vec<i64> = match category_ids {
        None => attached,
        Some(requested) => {
            let attached: HashSet<i64> = attached.into_iter().collect();
            let mut seen = HashSet::new();
            requested
                .iter()
                .copied()
                .filter(|id| attached.contains(id) && seen.insert(*id))
                .collect()
        }
    };
    delete_rows(conn, entity, &removed)?;
    Ok(removed)
}

fn sync_rows(
    conn: &mut SqliteConnection,
    entity: &EntityRef,
    category_ids: &[i64],
    detaching: bool,
) -> Result<SyncDelta> {
    ensure_live_categories(conn, category_ids)?;
    let current = attached_ids(conn, entity, true)?;
    let delta = compute_sync_delta(&current, category_ids, detaching);
    insert_rows(conn, entity, &delta.added)?;
    delete_rows(conn, entity, &delta.removed)?;
    Ok(delta)
}

/// Correlated sub-query matching a live association of `candidate.value`.
const LIVE_ASSOCIATION: &str = "SELECT 1 FROM categorizables a \
     JOIN categories c ON c.id = a.category_id \
     WHERE a.categorizable_type = ? AND a.categorizable_id = candidate.value \
     AND c.deleted_at IS NULL";

/// Builds the EXISTS / NOT EXISTS query that keeps the matching candidates.
///
/// Candidates and category ids travel as JSON arrays expanded by `json_each`,
/// so the parameter count does not grow with the input and candidate order
/// is kept through the array index.
fn scope_query(
    entity_type: &str,
    candidates: &[String],
    filter: &CategorizableFilter,
) -> Result<BoxedSqlQuery<'static, Sqlite, SqlQuery>> {
    let candidates_json = serde_json::to_string(candidates).map_err(StorageError::from)?;
    let ids_json = serde_json::to_string(filter.category_ids()).map_err(StorageError::from)?;

    let predicate = match filter {
        CategorizableFilter::WithAll(_) => format!(
            "NOT EXISTS (SELECT 1 FROM json_each(?) wanted WHERE NOT EXISTS ({} AND a.category_id = wanted.value))",
            LIVE_ASSOCIATION
        ),
        CategorizableFilter::WithAny(_) => format!(
            "EXISTS ({} AND a.category_id IN (SELECT value FROM json_each(?)))",
            LIVE_ASSOCIATION
        ),
        CategorizableFilter::Without(_) => format!(
            "NOT EXISTS ({} AND a.category_id IN (SELECT value FROM json_each(?)))",
            LIVE_ASSOCIATION
        ),
        CategorizableFilter::WithoutAny => format!("NOT EXISTS ({})", LIVE_ASSOCIATION),
    };
    let sql = format!(
        "SELECT candidate.value AS entity_id FROM json_each(?) candidate WHERE {} ORDER BY candidate.key",
        predicate
    );

    let query = sql_query(sql)
        .into_boxed::<Sqlite>()
        .bind::<Text, _>(candidates_json);
    let entity_type = entity_type.to_string();
    Ok(match filter {
        CategorizableFilter::WithAll(_) => query
            .bind::<Text, _>(ids_json)
            .bind::<Text, _>(entity_type),
        CategorizableFilter::WithAny(_) | CategorizableFilter::Without(_) => query
            .bind::<Text, _>(entity_type)
            .bind::<Text, _>(ids_json),
        CategorizableFilter::WithoutAny => query.bind::<Text, _>(entity_type),
    })
}

#[async_trait]
impl CategorizableRepositoryTrait for CategorizableRepository {
    fn category_ids_of(&self, entity: &EntityRef) -> Result<Vec<i64>> {
        let mut conn = get_connection(&self.pool)?;
        attached_ids(&mut conn, entity, true)
    }

    fn categories_of(&self, entity: &EntityRef) -> Result<Vec<Category>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = categorizables::table
            .inner_join(categories::table)
            .select(CategoryDB::as_select())
            .filter(categorizables::categorizable_type.eq(entity.entity_type.as_str()))
            .filter(categorizables::categorizable_id.eq(entity.id.as_str()))
            .filter(categories::deleted_at.is_null())
            .order(categories::lft.asc())
            .load(&mut conn)
            .map_err(StorageError::from)?;
        into_categories(rows)
    }

    fn entities_in(&self, category_id: i64, entity_type: &str) -> Result<Vec<String>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = categorizables::table
            .inner_join(categories::table)
            .select(CategorizableDB::as_select())
            .filter(categorizables::category_id.eq(category_id))
            .filter(categorizables::categorizable_type.eq(entity_type))
            .filter(categories::deleted_at.is_null())
            .order((
                categorizables::created_at.asc(),
                categorizables::categorizable_id.asc(),
            ))
            .load::<CategorizableDB>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|row| row.categorizable_id).collect())
    }

    fn scope_entities(
        &self,
        entity_type: &str,
        candidates: &[String],
        filter: &CategorizableFilter,
    ) -> Result<Vec<String>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = scope_query(entity_type, candidates, filter)?
            .load::<ScopedEntityDB>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|row| row.entity_id).collect())
    }

    async fn attach(&self, entity: &EntityRef, category_ids: &[i64]) -> Result<Vec<i64>> {
        let entity = entity.clone();
        let category_ids = category_ids.to_vec();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<Vec<i64>> {
                attach_rows(conn, &entity, &category_ids)
            })
            .await
    }

    async fn detach(&self, entity: &EntityRef, category_ids: Option<&[i64]>) -> Result<Vec<i64>> {
        let entity = entity.clone();
        let category_ids = category_ids.map(<[i64]>::to_vec);
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<Vec<i64>> {
                detach_rows(conn, &entity, category_ids.as_deref())
            })
            .await
    }

    async fn sync(
        &self,
        entity: &EntityRef,
        category_ids: &[i64],
        detaching: bool,
    ) -> Result<SyncDelta> {
        let entity = entity.clone();
        let category_ids = category_ids.to_vec();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<SyncDelta> {
                sync_rows(conn, &entity, &category_ids, detaching)
            })
            .await
    }
}
