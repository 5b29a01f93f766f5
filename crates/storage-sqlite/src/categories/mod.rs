//! SQLite storage implementation for the category tree.

mod model;
mod repository;

pub use model::{CategoryChangesetDB, CategoryDB, NewCategoryDB};
pub(crate) use model::into_categories;
pub use repository::CategoryRepository;
