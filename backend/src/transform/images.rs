//! Positional image collection.
//!
//! Shopify-style exports list product images on extra rows of a handle
//! (`Image Src` + `Image Position`). Templates instead expose fixed image
//! columns, so each (handle, position) pair is resolved up front.

use std::collections::HashMap;

use crate::parser::Table;

pub const HANDLE_COLUMN: &str = "Handle";
pub const IMAGE_SRC_COLUMN: &str = "Image Src";
pub const IMAGE_POSITION_COLUMN: &str = "Image Position";

/// Highest image position a template can bind to.
pub const MAX_IMAGE_POSITION: i64 = 5;

/// Handle → {position → image URL}, first occurrence wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageSlots(HashMap<String, HashMap<i64, String>>);

impl ImageSlots {
    /// Scan the table once.
    ///
    /// Returns an empty map when the handle, image or position column is
    /// missing; auto-image fields then resolve to empty strings.
    pub fn collect(table: &Table) -> Self {
        let mut slots = Self::default();

        let (Some(h), Some(s), Some(p)) = (
            table.resolve(HANDLE_COLUMN),
            table.resolve(IMAGE_SRC_COLUMN),
            table.resolve(IMAGE_POSITION_COLUMN),
        ) else {
            return slots;
        };

        for row in table.rows() {
            let handle = row[h].trim();
            let url = row[s].trim();
            let position = row[p].trim();
            if handle.is_empty() || url.is_empty() || position.is_empty() {
                continue;
            }

            let Some(position) = parse_position(position) else {
                continue;
            };
            if !(1..=MAX_IMAGE_POSITION).contains(&position) {
                continue;
            }

            slots
                .0
                .entry(handle.to_string())
                .or_default()
                .entry(position)
                .or_insert_with(|| url.to_string());
        }

        slots
    }

    /// URL for (handle, position), if any row supplied one.
    pub fn get(&self, handle: &str, position: i64) -> Option<&str> {
        self.0
            .get(handle)
            .and_then(|positions| positions.get(&position))
            .map(String::as_str)
    }

    /// Number of handles with at least one image.
    pub fn handle_count(&self) -> usize {
        self.0.len()
    }

    /// Total number of filled slots.
    pub fn slot_count(&self) -> usize {
        self.0.values().map(HashMap::len).sum()
    }
}

/// Parse a position cell, accepting decimal forms such as `"2.0"`.
///
/// The number is truncated toward zero; non-finite or non-numeric input
/// yields `None`.
fn parse_position(raw: &str) -> Option<i64> {
    let value: f64 = raw.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(value.trunc() as i64)
}
