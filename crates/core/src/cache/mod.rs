//! Read-through query cache.
//!
//! Reads of the services are keyed by a SHA-256 fingerprint of
//! `(namespace, operation, arguments)`. Mutations drop whole namespaces.

mod query_cache;

pub use query_cache::*;
