//! Query modules, one per resource
//!
//! Every function takes the pool (or an executor inside a transaction) and
//! returns `tenx_common::Result`. Rows are mapped by hand; UUIDs and
//! timestamps are TEXT columns.

pub mod card_features;
pub mod import_jobs;
pub mod projects;
pub mod stats;
pub mod templates;
pub mod users;
pub mod videos;

/// `LIKE` pattern matching `search` as a literal substring (use with `ESCAPE '\'`)
pub fn like_pattern(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len() + 2);
    escaped.push('%');
    for c in search.trim().to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Decode a JSON TEXT column
pub(crate) fn from_json_column<T: serde::de::DeserializeOwned>(
    column: &str,
    value: &str,
) -> tenx_common::Result<T> {
    serde_json::from_str(value)
        .map_err(|e| tenx_common::Error::Internal(format!("Invalid stored {}: {}", column, e)))
}
