//! Category tree module - nested-set nodes, tree operations and integrity checks.

mod categories_errors;
mod categories_model;
mod categories_service;
mod categories_traits;
mod locale;
pub mod nested_set;
pub mod slug_policy;


pub use categories_errors::*;
pub use categories_model::*;
pub use categories_service::*;
pub use categories_traits::*;
pub use locale::*;
pub use nested_set::{NodeRange, TreeIntegrityReport, TreeViolation};
pub use slug_policy::{DefaultSlugPolicy, SlugPolicy};
