//! Product-level value propagation across variant rows.
//!
//! A product export repeats product attributes (title, description, vendor)
//! only on the first row of a handle; variant rows leave them blank. For
//! per-product fields the first non-blank value of each handle is recorded
//! here and emitted on every row of that handle.

use std::collections::HashMap;

use crate::parser::Table;
use crate::transform::images::HANDLE_COLUMN;

/// Prefix of the synthetic handle given to rows of a table without a handle
/// column; each such row is its own group.
pub const SYNTHETIC_HANDLE_PREFIX: &str = "__row__";

/// Group handle of every row, in row order.
///
/// Handles are trimmed. Without a handle column each row gets
/// `__row__<index>`.
pub fn row_handles(table: &Table) -> Vec<String> {
    match table.resolve(HANDLE_COLUMN) {
        Some(col) => table
            .rows()
            .iter()
            .map(|row| row[col].trim().to_string())
            .collect(),
        None => (0..table.len())
            .map(|i| format!("{}{}", SYNTHETIC_HANDLE_PREFIX, i))
            .collect(),
    }
}

/// Field key → handle → first non-blank trimmed value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductValues(HashMap<String, HashMap<String, String>>);

impl ProductValues {
    /// Record the first non-blank value per handle for one field.
    pub fn insert_field(&mut self, table: &Table, handles: &[String], key: &str, col: usize) {
        let values = self.0.entry(key.to_string()).or_default();

        for (row, handle) in table.rows().iter().zip(handles) {
            let value = row[col].trim();
            if value.is_empty() {
                continue;
            }
            values
                .entry(handle.clone())
                .or_insert_with(|| value.to_string());
        }
    }

    /// Propagated value of `key` for `handle`.
    pub fn get(&self, key: &str, handle: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(|by_handle| by_handle.get(handle))
            .map(String::as_str)
    }

    /// Number of fields with propagated values.
    pub fn field_count(&self) -> usize {
        self.0.len()
    }
}
