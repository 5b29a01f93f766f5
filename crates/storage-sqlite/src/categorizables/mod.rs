//! SQLite storage implementation for category associations.

mod model;
mod repository;

pub use model::{CategorizableDB, NewCategorizableDB, ScopedEntityDB};
pub use repository::CategorizableRepository;
