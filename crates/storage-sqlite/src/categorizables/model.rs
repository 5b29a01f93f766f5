//! Database models for the categorizables join table.

use chrono::NaiveDateTime;
use diesel::prelude::*;

use categorizable_core::categorizables::EntityRef;

use crate::categories::CategoryDB;

/// One category ↔ entity association.
#[derive(Queryable, Selectable, Associations, PartialEq, Debug, Clone)]
#[diesel(belongs_to(CategoryDB, foreign_key = category_id))]
#[diesel(table_name = crate::schema::categorizables)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CategorizableDB {
    pub category_id: i64,
    pub categorizable_id: String,
    pub categorizable_type: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::categorizables)]
pub struct NewCategorizableDB {
    pub category_id: i64,
    pub categorizable_id: String,
    pub categorizable_type: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl NewCategorizableDB {
    pub fn new(entity: &EntityRef, category_id: i64, now: NaiveDateTime) -> Self {
        Self {
            category_id,
            categorizable_id: entity.id.clone(),
            categorizable_type: entity.entity_type.clone(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Entity id returned by the scope query.
#[derive(QueryableByName, Debug, Clone)]
pub struct ScopedEntityDB {
    #[diesel(sql_type = diesel::sql_types::Text)]
    pub entity_id: String,
}
