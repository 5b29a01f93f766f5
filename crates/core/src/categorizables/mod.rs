//! Categorizables module - polymorphic entity ↔ category associations.
//!
//! Provides reference resolution, the association store traits and the
//! categorization service.

mod categorizables_model;
mod categorizables_traits;
mod categorization_service;
mod identifier_resolver;

#[cfg(test)]
mod categorization_service_tests;

pub use categorizables_model::*;
pub use categorizables_traits::*;
pub use categorization_service::CategorizationService;
pub use identifier_resolver::{IdentifierResolver, SlugLookup};
