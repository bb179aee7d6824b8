//! Utility functions for SQLite storage operations.
//!
//! Chunking helpers that keep statements under SQLite's parameter limits.

/// Rows or ids per statement.
pub const SQLITE_MAX_PARAMS_CHUNK: usize = 500;

/// Split a slice into pieces of at most `SQLITE_MAX_PARAMS_CHUNK` items.
///
/// Used for multi-row inserts and `IN (...)` lists alike:
///
/// ```ignore
/// for chunk in chunk_for_sqlite(&rows) {
///     inserted += diesel::insert_or_ignore_into(table).values(chunk).execute(conn)?;
/// }
/// ```
pub fn chunk_for_sqlite<T>(items: &[T]) -> impl Iterator<Item = &[T]> {
    items.chunks(SQLITE_MAX_PARAMS_CHUNK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_for_sqlite_empty() {
        let items: Vec<i32> = vec![];
        let chunks: Vec<_> = chunk_for_sqlite(&items).collect();
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_chunk_for_sqlite_under_limit() {
        let items: Vec<i32> = (0..100).collect();
        let chunks: Vec<_> = chunk_for_sqlite(&items).collect();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 100);
    }

    #[test]
    fn test_chunk_for_sqlite_over_limit() {
        let items: Vec<i32> = (0..1200).collect();
        let chunks: Vec<_> = chunk_for_sqlite(&items).collect();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), SQLITE_MAX_PARAMS_CHUNK);
        assert_eq!(chunks[2].len(), 200);
    }
}
