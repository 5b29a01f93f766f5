//! Database models for categories.

use chrono::NaiveDateTime;
use diesel::prelude::*;
use log::error;

use categorizable_core::categories::{Category, LocalizedText};
use categorizable_core::errors::{DatabaseError, Error, Result};

/// Database model for a category row.
///
/// `name` and `description` hold JSON objects keyed by locale.
#[derive(Queryable, Identifiable, Selectable, PartialEq, Debug, Clone)]
#[diesel(table_name = crate::schema::categories)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CategoryDB {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub lft: i64,
    pub rgt: i64,
    pub parent_id: Option<i64>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub deleted_at: Option<NaiveDateTime>,
}

/// Database model for inserting a category.
#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::categories)]
pub struct NewCategoryDB {
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub lft: i64,
    pub rgt: i64,
    pub parent_id: Option<i64>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Column changes for a rename. `None` leaves the column untouched;
/// `Some(None)` clears the description.
#[derive(AsChangeset, Debug, Clone, Default)]
#[diesel(table_name = crate::schema::categories)]
pub struct CategoryChangesetDB {
    pub slug: Option<String>,
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub updated_at: Option<NaiveDateTime>,
}

pub(crate) fn encode_text(text: &LocalizedText) -> Result<String> {
    serde_json::to_string(text).map_err(Error::from)
}

fn decode_text(id: i64, column: &str, raw: &str) -> Result<LocalizedText> {
    serde_json::from_str(raw).map_err(|e| {
        error!("Category {} has an unreadable {} column: {}", id, column, e);
        Error::Database(DatabaseError::Internal(format!(
            "Category {} has a malformed {} column: {}",
            id, column, e
        )))
    })
}

impl TryFrom<CategoryDB> for Category {
    type Error = Error;

    fn try_from(db: CategoryDB) -> Result<Self> {
        let name = decode_text(db.id, "name", &db.name)?;
        let description = db
            .description
            .as_deref()
            .map(|raw| decode_text(db.id, "description", raw))
            .transpose()?;
        Ok(Self {
            id: db.id,
            slug: db.slug,
            name,
            description,
            left: db.lft,
            right: db.rgt,
            parent_id: db.parent_id,
            created_at: db.created_at,
            updated_at: db.updated_at,
            deleted_at: db.deleted_at,
        })
    }
}

/// Converts a batch of rows, failing on the first malformed one.
pub(crate) fn into_categories(rows: Vec<CategoryDB>) -> Result<Vec<Category>> {
    rows.into_iter().map(Category::try_from).collect()
}
