//! Helpers for staying under SQLite's bound-parameter limit.

/// Upper bound on parameters bound by a single `IN (...)` list or multi-row insert.
pub const SQLITE_MAX_PARAMS_CHUNK: usize = 500;

/// Splits `items` into slices of at most [`SQLITE_MAX_PARAMS_CHUNK`] elements.
pub fn chunk_for_sqlite<T>(items: &[T]) -> impl Iterator<Item = &[T]> {
    items.chunks(SQLITE_MAX_PARAMS_CHUNK)
}

/// Rows per multi-row INSERT when every row binds `columns` parameters.
pub fn rows_per_insert(columns: usize) -> usize {
    (SQLITE_MAX_PARAMS_CHUNK / columns.max(1)).max(1)
}
