//! Categorizable Core - Domain entities, services, and traits.
//!
//! This crate holds the nested-set category tree and the polymorphic
//! categorization logic. It is database-agnostic and defines traits that
//! are implemented by the `storage-sqlite` crate.

pub mod cache;
pub mod categories;
pub mod categorizables;
pub mod config;
pub mod constants;
pub mod errors;
pub mod events;

pub use config::CategorizableConfig;

// Re-export error types
pub use errors::Error;
pub use errors::Result;
