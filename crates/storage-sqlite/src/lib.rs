//! SQLite storage implementation for categorizable.
//!
//! This crate provides all database-related functionality using Diesel ORM with SQLite.
//! It implements the repository traits defined in `categorizable-core` and contains:
//! - Database connection pooling and management
//! - Diesel migrations
//! - The nested-set category repository and the association repository
//! - Database-specific model types (with Diesel derives)
//!
//! # Architecture
//!
//! This crate is the only place where Diesel dependencies exist. `core` is
//! database-agnostic and works with traits.
//!
//! ```text
//!        core (domain, services)
//!                  │
//!                  ▼
//!          storage-sqlite (this crate)
//!                  │
//!                  ▼
//!              SQLite DB
//! ```
//!
//! Every mutation goes through the single writer actor ([`WriteHandle`]), so
//! structural rewrites of the tree never interleave.

pub mod db;
pub mod errors;
pub mod schema;
pub mod utils;

// Repository implementations
pub mod categories;
pub mod categorizables;

// Re-export database utilities
pub use db::{
    create_pool, get_connection, get_db_path, init, run_migrations, spawn_writer, DbConnection,
    DbPool, WriteHandle,
};

pub use categories::CategoryRepository;
pub use categorizables::CategorizableRepository;

// Re-export storage errors
pub use errors::StorageError;

// Re-export from categorizable-core for convenience
pub use categorizable_core::errors::{DatabaseError, Error, Result};
