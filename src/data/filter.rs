//! Substring filtering across every field of a row.
//!
//! A query is split on whitespace. A row survives when every token is a
//! case-insensitive substring of at least one of its field values.

use crate::data::row::Row;

/// Lowercased query tokens, empty for a blank query
pub fn tokenize(query: &str) -> Vec<String> {
    query.split_whitespace().map(str::to_lowercase).collect()
}

/// Whether a single row matches all tokens
pub fn row_matches(row: &Row, tokens: &[String]) -> bool {
    if tokens.is_empty() {
        return true;
    }

    let haystack: Vec<String> = row
        .values()
        .filter(|v| !v.is_null())
        .map(|v| v.to_string().to_lowercase())
        .collect();

    tokens
        .iter()
        .all(|token| haystack.iter().any(|field| field.contains(token.as_str())))
}

/// Indices of the rows that match `query`, in their original order.
/// A blank query keeps every row.
pub fn matching_indices(rows: &[Row], query: &str) -> Vec<usize> {
    let tokens = tokenize(query);
    if tokens.is_empty() {
        return (0..rows.len()).collect();
    }

    rows.iter()
        .enumerate()
        .filter(|(_, row)| row_matches(row, &tokens))
        .map(|(idx, _)| idx)
        .collect()
}

/// Borrowing form of the filter: the matching rows in original order
pub fn filter<'a>(rows: &'a [Row], query: &str) -> Vec<&'a Row> {
    matching_indices(rows, query)
        .into_iter()
        .map(|idx| &rows[idx])
        .collect()
}
